//! Chainable DSP effect modules.

use std::any::Any;

pub mod biquad;
mod chain;
pub mod crossfade;
pub mod equalizer;
pub mod level;
pub mod limiter;
pub mod replay_gain;

pub use biquad::{BiquadCoefficients, BiquadFilter};
pub use chain::EffectChain;
pub use crossfade::{CrossfadeCurve, Crossfader};
pub use equalizer::{Equalizer, EqualizerBand};
pub use limiter::{Limiter, LimiterSettings};
pub use replay_gain::{ReplayGain, ReplayGainMode};

/// Shared context for preparing and running DSP effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectContext {
    pub sample_rate: u32,
    pub channels: usize,
}

impl EffectContext {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
        }
    }
}

impl Default for EffectContext {
    fn default() -> Self {
        Self::new(
            crate::constants::SAMPLE_RATE,
            crate::constants::OUTPUT_CHANNELS as usize,
        )
    }
}

/// An in-place audio transform.
///
/// `process` receives interleaved samples laid out with the channel count
/// from the most recent [`Effect::configure`] call; with a single channel it
/// is the plain mono path. Effects own all of their state.
pub trait Effect: Send {
    /// Stable identifier used for lookup and removal in an [`EffectChain`].
    fn name(&self) -> &str;

    /// Adopt a new sample rate or channel layout.
    fn configure(&mut self, context: &EffectContext);

    fn process(&mut self, samples: &mut [f32]);

    fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]);

    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Clear runtime state so the next buffer starts from silence.
    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
