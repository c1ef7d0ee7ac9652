use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_BUFFER_FRAMES;
use crate::dsp::effects::CrossfadeCurve;

use super::Player;

/// Construction-time player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Frames decoded per worker iteration.
    pub buffer_size: usize,
    /// Overlap between consecutive tracks. `0` keeps plain gapless handoff.
    pub crossfade_ms: f32,
    pub crossfade_curve: CrossfadeCurve,
    pub gapless: bool,
    pub fade_on_pause: bool,
    pub fade_ms: f32,
    pub initial_volume: f32,
    /// Queue depth handed to the output device.
    pub output_buffer_ms: u64,
    /// Audio decoded ahead from the next track when gapless is on.
    pub prebuffer_ms: u64,
    pub position_interval_ms: u64,
    /// Consecutive failed writes tolerated before entering the error state.
    pub max_output_failures: u32,
    /// Per-listener event queue length.
    pub event_queue_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_FRAMES,
            crossfade_ms: 0.0,
            crossfade_curve: CrossfadeCurve::EqualPower,
            gapless: true,
            fade_on_pause: true,
            fade_ms: 200.0,
            initial_volume: 0.8,
            output_buffer_ms: 250,
            prebuffer_ms: 500,
            position_interval_ms: 10,
            max_output_failures: 50,
            event_queue_capacity: 256,
        }
    }
}

impl PlayerConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    /// Clamp values into ranges the worker can run with.
    pub fn sanitized(mut self) -> Self {
        self.buffer_size = self.buffer_size.clamp(64, 65_536);
        self.crossfade_ms = non_negative(self.crossfade_ms);
        self.fade_ms = non_negative(self.fade_ms);
        self.initial_volume = if self.initial_volume.is_finite() {
            self.initial_volume.clamp(0.0, 1.0)
        } else {
            Self::default().initial_volume
        };
        self.output_buffer_ms = self.output_buffer_ms.max(20);
        self.position_interval_ms = self.position_interval_ms.max(1);
        self.max_output_failures = self.max_output_failures.max(1);
        self.event_queue_capacity = self.event_queue_capacity.max(1);
        self
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

impl Player {
    /// Configure the fade-out applied before pausing (ms).
    pub fn set_fade_ms(&self, ms: f32) {
        self.shared.settings.write().unwrap().fade_ms = non_negative(ms);
    }

    pub fn set_fade_on_pause(&self, enabled: bool) {
        self.shared.settings.write().unwrap().fade_on_pause = enabled;
    }

    /// Configure the overlap between consecutive tracks (ms). `0` disables
    /// crossfading.
    pub fn set_crossfade_ms(&self, ms: f32) {
        self.shared.settings.write().unwrap().crossfade_ms = non_negative(ms);
    }

    pub fn set_crossfade_curve(&self, curve: CrossfadeCurve) {
        self.shared.settings.write().unwrap().crossfade_curve = curve;
    }

    /// Enable or disable pre-buffering of the next track.
    pub fn set_gapless(&self, enabled: bool) {
        self.shared.settings.write().unwrap().gapless = enabled;
    }

    /// Configure how much of the next track is decoded ahead (ms).
    pub fn set_prebuffer_ms(&self, ms: u64) {
        self.shared.settings.write().unwrap().prebuffer_ms = ms;
    }

    /// Current runtime configuration.
    pub fn config(&self) -> PlayerConfig {
        self.shared.settings.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = PlayerConfig::from_json(r#"{ "crossfade_ms": 1500, "gapless": false }"#)
            .unwrap();
        assert_eq!(config.crossfade_ms, 1500.0);
        assert!(!config.gapless);
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.initial_volume, 0.8);
        assert_eq!(config.crossfade_curve, CrossfadeCurve::EqualPower);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = PlayerConfig::from_json(
            r#"{ "fade_ms": -20, "initial_volume": 3.0, "buffer_size": 1, "crossfade_curve": "linear" }"#,
        )
        .unwrap();
        assert_eq!(config.fade_ms, 0.0);
        assert_eq!(config.initial_volume, 1.0);
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.crossfade_curve, CrossfadeCurve::Linear);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(PlayerConfig::from_json("42").is_err());
        assert!(PlayerConfig::from_json(r#"{ "gapless": 3 }"#).is_err());
        assert!(PlayerConfig::from_json(r#"{ "crossfade_curve": "s_curve" }"#).is_err());
    }
}
