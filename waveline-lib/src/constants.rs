//! Shared constants for DSP and playback defaults.

/// Fallback sample rate (Hz) for components configured before a track is open.
pub const SAMPLE_RATE: u32 = 44_100;

/// Channel count delivered by every decoder.
///
/// Mono sources are duplicated to both channels and wider layouts keep their
/// first two channels, so the DSP chain only ever sees stereo frames.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Decode chunk size in frames used when no configuration overrides it.
pub const DEFAULT_BUFFER_FRAMES: usize = 2048;
