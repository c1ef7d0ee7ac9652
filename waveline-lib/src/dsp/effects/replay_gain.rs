//! ReplayGain loudness normalization.

use std::any::Any;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::level::db_to_linear;
use super::{Effect, EffectContext};
use crate::decoder::ReplayGainInfo;
use crate::dsp::DspError;

pub const NAME: &str = "ReplayGain";

/// Which stored gain/peak pair drives normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayGainMode {
    #[default]
    Track,
    Album,
    Off,
}

impl FromStr for ReplayGainMode {
    type Err = DspError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "off" | "none" => Ok(Self::Off),
            other => Err(DspError::InvalidParameter(format!(
                "unknown replay gain mode \"{}\"",
                other
            ))),
        }
    }
}

/// Scales the signal to a reference loudness, never letting the stored peak
/// exceed full scale, then hard clips to `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct ReplayGain {
    track_gain: f64,
    track_peak: f64,
    album_gain: f64,
    album_peak: f64,
    mode: ReplayGainMode,
    preamp_db: f64,
    enabled: bool,
}

impl Default for ReplayGain {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayGain {
    pub fn new() -> Self {
        Self {
            track_gain: 0.0,
            track_peak: 0.0,
            album_gain: 0.0,
            album_peak: 0.0,
            mode: ReplayGainMode::Track,
            preamp_db: 0.0,
            enabled: true,
        }
    }

    pub fn set_track(&mut self, gain_db: f64, peak: f64) {
        self.track_gain = finite_or_zero(gain_db);
        self.track_peak = finite_or_zero(peak).max(0.0);
    }

    pub fn set_album(&mut self, gain_db: f64, peak: f64) {
        self.album_gain = finite_or_zero(gain_db);
        self.album_peak = finite_or_zero(peak).max(0.0);
    }

    pub fn set_mode(&mut self, mode: ReplayGainMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ReplayGainMode {
        self.mode
    }

    pub fn set_preamp(&mut self, preamp_db: f64) {
        self.preamp_db = finite_or_zero(preamp_db);
    }

    pub fn preamp(&self) -> f64 {
        self.preamp_db
    }

    /// Load gains from decoder tags.
    ///
    /// Missing album values fall back to the track values so album mode
    /// still normalizes singles. Missing tags leave a unity gain.
    pub fn apply_info(&mut self, info: &ReplayGainInfo) {
        let track_gain = info.track_gain.unwrap_or(0.0);
        let track_peak = info.track_peak.unwrap_or(0.0);
        self.set_track(track_gain, track_peak);
        self.set_album(
            info.album_gain.unwrap_or(track_gain),
            info.album_peak.unwrap_or(track_peak),
        );
    }

    /// Linear gain for the current mode after peak protection.
    pub fn total_gain(&self) -> f64 {
        let (gain, peak) = match self.mode {
            ReplayGainMode::Track => (self.track_gain, self.track_peak),
            ReplayGainMode::Album => (self.album_gain, self.album_peak),
            ReplayGainMode::Off => return 1.0,
        };
        let mut total = db_to_linear(gain + self.preamp_db);
        if peak > 0.0 && total * peak > 1.0 {
            total = 1.0 / peak;
        }
        total
    }

    fn apply(&self, samples: &mut [f32]) {
        let gain = self.total_gain() as f32;
        for sample in samples.iter_mut() {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }

    fn is_passthrough(&self) -> bool {
        !self.enabled || self.mode == ReplayGainMode::Off
    }
}

impl Effect for ReplayGain {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&mut self, _context: &EffectContext) {}

    fn process(&mut self, samples: &mut [f32]) {
        if self.is_passthrough() {
            return;
        }
        self.apply(samples);
    }

    fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.is_passthrough() {
            return;
        }
        self.apply(left);
        self.apply(right);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Forget the loaded gains; mode and preamp survive.
    fn reset(&mut self) {
        self.track_gain = 0.0;
        self.track_peak = 0.0;
        self.album_gain = 0.0;
        self.album_peak = 0.0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
