//! Format and tag metadata reported by decoders.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// PCM layout produced by an open decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bit depth of the source material, `0` when the codec does not report one.
    pub bit_depth: u16,
    pub is_float: bool,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bit_depth: 0,
            is_float: true,
        }
    }

    /// Convert a frame count to a duration at this format's sample rate.
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let secs = frames / self.sample_rate as u64;
        let rem = frames % self.sample_rate as u64;
        Duration::from_secs(secs)
            + Duration::from_nanos(rem * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Convert a duration to the nearest frame boundary at this sample rate.
    pub fn duration_to_frames(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as u64
    }

    /// Number of interleaved samples in `duration`.
    pub fn samples_for(&self, duration: Duration) -> usize {
        self.duration_to_frames(duration) as usize * self.channels as usize
    }
}

/// Embedded cover art.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artwork {
    pub mime_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Loudness normalization values read from ReplayGain tags.
///
/// Gains are in dB, peaks are linear sample amplitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayGainInfo {
    pub track_gain: Option<f64>,
    pub track_peak: Option<f64>,
    pub album_gain: Option<f64>,
    pub album_peak: Option<f64>,
}

impl ReplayGainInfo {
    pub fn is_empty(&self) -> bool {
        self.track_gain.is_none() && self.album_gain.is_none()
    }
}

/// Descriptive tags and stream properties captured when a decoder opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub comment: Option<String>,
    pub duration: Duration,
    /// Average bitrate in bits per second when known.
    pub bitrate: Option<u32>,
    pub variable_bitrate: bool,
    pub artwork: Option<Artwork>,
    pub replay_gain: ReplayGainInfo,
}

/// Parse a ReplayGain tag value such as `"-6.54 dB"` or `"0.988553"`.
pub(crate) fn parse_replay_gain_value(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let number = trimmed
        .strip_suffix("dB")
        .or_else(|| trimmed.strip_suffix("db"))
        .or_else(|| trimmed.strip_suffix("DB"))
        .unwrap_or(trimmed);
    number.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the leading number of tags like `"3/12"` or `"2004-05-01"`.
pub(crate) fn parse_leading_number(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
