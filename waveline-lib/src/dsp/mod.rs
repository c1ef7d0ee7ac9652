//! Effect chain, equalizer, crossfading, loudness normalization and limiting.

pub mod effects;
mod error;
pub mod settings;

pub use error::DspError;
pub use settings::DspSettings;
