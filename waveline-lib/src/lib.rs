//! # Waveline Audio Library
//!
//! Real-time playback engine: pluggable decoders feed an ordered DSP chain
//! whose output is pushed to an output device, driven by a dedicated worker
//! thread with gapless track transitions.
//!
//! The usual entry point is [`playback::player::Player`].

pub mod audio;
pub mod constants;
pub mod decoder;
pub mod dsp;
pub mod output;
pub mod playback;
mod tools;

#[cfg(test)]
pub(crate) mod test_data;
