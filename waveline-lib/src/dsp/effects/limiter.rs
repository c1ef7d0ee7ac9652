//! Peak limiter driven by an attack/release envelope follower.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{Effect, EffectContext};

pub const NAME: &str = "Limiter";

const DEFAULT_THRESHOLD: f64 = 0.95;
const DEFAULT_RATIO: f64 = 10.0;
const DEFAULT_ATTACK_MS: f64 = 1.0;
const DEFAULT_RELEASE_MS: f64 = 50.0;

/// Serialized limiter parameters. The threshold is a linear amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    pub threshold: f64,
    pub ratio: f64,
    #[serde(alias = "attack")]
    pub attack_ms: f64,
    #[serde(alias = "release")]
    pub release_ms: f64,
}

impl LimiterSettings {
    pub fn new(threshold: f64, ratio: f64, attack_ms: f64, release_ms: f64) -> Self {
        Self {
            threshold,
            ratio,
            attack_ms,
            release_ms,
        }
    }

    fn sanitized(&self) -> Self {
        Self {
            threshold: sanitize(self.threshold, DEFAULT_THRESHOLD).clamp(0.0, 1.0),
            ratio: sanitize(self.ratio, DEFAULT_RATIO).max(1.0),
            attack_ms: sanitize(self.attack_ms, DEFAULT_ATTACK_MS).max(0.0),
            release_ms: sanitize(self.release_ms, DEFAULT_RELEASE_MS).max(0.0),
        }
    }
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self::new(
            DEFAULT_THRESHOLD,
            DEFAULT_RATIO,
            DEFAULT_ATTACK_MS,
            DEFAULT_RELEASE_MS,
        )
    }
}

/// Limiter whose envelope tracks how far the signal sits above the threshold.
///
/// All channels of a frame share one envelope so the stereo image does not
/// shift under gain reduction.
#[derive(Debug, Clone)]
pub struct Limiter {
    settings: LimiterSettings,
    context: EffectContext,
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
    enabled: bool,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(EffectContext::default())
    }
}

impl Limiter {
    pub fn new(context: EffectContext) -> Self {
        Self::with_settings(context, LimiterSettings::default())
    }

    pub fn with_settings(context: EffectContext, settings: LimiterSettings) -> Self {
        let mut limiter = Self {
            settings: settings.sanitized(),
            context,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            enabled: true,
        };
        limiter.update_coefficients();
        limiter
    }

    pub fn settings(&self) -> LimiterSettings {
        self.settings
    }

    /// Replace the parameters. The envelope carries over.
    pub fn set_settings(&mut self, settings: LimiterSettings) {
        self.settings = settings.sanitized();
        self.update_coefficients();
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.set_settings(LimiterSettings {
            threshold,
            ..self.settings
        });
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.set_settings(LimiterSettings {
            ratio,
            ..self.settings
        });
    }

    pub fn set_attack_ms(&mut self, attack_ms: f64) {
        self.set_settings(LimiterSettings {
            attack_ms,
            ..self.settings
        });
    }

    pub fn set_release_ms(&mut self, release_ms: f64) {
        self.set_settings(LimiterSettings {
            release_ms,
            ..self.settings
        });
    }

    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    fn update_coefficients(&mut self) {
        let sr = self.context.sample_rate.max(1) as f64;
        self.attack_coeff = time_coefficient(self.settings.attack_ms, sr);
        self.release_coeff = time_coefficient(self.settings.release_ms, sr);
    }

    /// Advance the envelope with the frame peak and return the frame gain.
    #[inline]
    fn next_gain(&mut self, frame_peak: f64) -> f32 {
        let target = (frame_peak - self.settings.threshold).max(0.0);
        let coeff = if target > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = target + (self.envelope - target) * coeff;
        if self.envelope > 0.0 {
            (1.0 - self.envelope * (1.0 - 1.0 / self.settings.ratio)) as f32
        } else {
            1.0
        }
    }
}

impl Effect for Limiter {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&mut self, context: &EffectContext) {
        self.context = *context;
        self.update_coefficients();
    }

    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let channels = self.context.channels.max(1);
        for frame in samples.chunks_mut(channels) {
            let peak = frame.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
            let gain = self.next_gain(peak as f64);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = self.next_gain(l.abs().max(r.abs()) as f64);
            *l *= gain;
            *r *= gain;
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn time_coefficient(time_ms: f64, sample_rate: f64) -> f64 {
    let seconds = time_ms / 1000.0;
    if seconds <= 0.0 {
        return 0.0;
    }
    (-1.0 / (seconds * sample_rate)).exp()
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::approx_eq;

    fn limiter(channels: usize) -> Limiter {
        Limiter::new(EffectContext::new(48_000, channels))
    }

    #[test]
    fn quiet_signal_passes_untouched() {
        let mut limiter = limiter(2);
        let input = vec![0.5_f32, -0.5, 0.9, -0.9];
        let mut output = input.clone();
        limiter.process(&mut output);
        assert_eq!(output, input);
        assert_eq!(limiter.envelope(), 0.0);
    }

    #[test]
    fn sustained_peak_converges_to_ratio_target() {
        let mut limiter = limiter(1);
        // 200 ms of full-scale DC, far beyond the 1 ms attack.
        let mut samples = vec![1.0_f32; 9_600];
        limiter.process(&mut samples);

        let settings = limiter.settings();
        let expected = settings.threshold + (1.0 - settings.threshold) / settings.ratio;
        let last = *samples.last().unwrap();
        assert!(approx_eq(last, expected as f32, 1e-4), "last {}", last);
    }

    #[test]
    fn linked_channels_share_gain() {
        let mut limiter = limiter(2);
        let mut samples: Vec<f32> = (0..4_800).flat_map(|_| [1.0_f32, 0.2]).collect();
        limiter.process(&mut samples);
        let (l, r) = (samples[samples.len() - 2], samples[samples.len() - 1]);
        assert!(approx_eq(r / 0.2, l, 1e-4));
    }

    #[test]
    fn stereo_path_matches_interleaved_path() {
        let mut a = limiter(2);
        let mut b = limiter(2);
        let left: Vec<f32> = (0..512).map(|i| if i % 3 == 0 { 1.2 } else { 0.4 }).collect();
        let right: Vec<f32> = (0..512).map(|i| if i % 5 == 0 { -1.1 } else { 0.1 }).collect();

        let mut interleaved: Vec<f32> = left
            .iter()
            .zip(right.iter())
            .flat_map(|(l, r)| [*l, *r])
            .collect();
        a.process(&mut interleaved);

        let (mut l, mut r) = (left, right);
        b.process_stereo(&mut l, &mut r);
        for i in 0..512 {
            assert!(approx_eq(interleaved[i * 2], l[i], 1e-6));
            assert!(approx_eq(interleaved[i * 2 + 1], r[i], 1e-6));
        }
    }

    #[test]
    fn release_recovers_and_reset_clears() {
        let mut limiter = limiter(1);
        let mut hot = vec![1.0_f32; 2_000];
        limiter.process(&mut hot);
        assert!(limiter.envelope() > 0.0);

        let mut quiet = vec![0.1_f32; 48_000];
        limiter.process(&mut quiet);
        assert!(limiter.envelope() < 1e-6);

        limiter.process(&mut hot);
        limiter.reset();
        assert_eq!(limiter.envelope(), 0.0);
    }

    #[test]
    fn settings_are_sanitized() {
        let limiter = Limiter::with_settings(
            EffectContext::new(44_100, 2),
            LimiterSettings::new(f64::NAN, 0.2, -5.0, f64::INFINITY),
        );
        let settings = limiter.settings();
        assert_eq!(settings.threshold, 0.95);
        assert_eq!(settings.ratio, 1.0);
        assert_eq!(settings.attack_ms, 0.0);
        assert_eq!(settings.release_ms, 50.0);
    }
}
