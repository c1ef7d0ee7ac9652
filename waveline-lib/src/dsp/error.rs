use std::fmt::{Display, Formatter};

/// Error type for DSP configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum DspError {
    InvalidBand(usize),
    UnknownPreset(String),
    EffectNotFound(String),
    InvalidParameter(String),
}

impl Display for DspError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBand(band) => write!(f, "equalizer band {} does not exist", band),
            Self::UnknownPreset(name) => write!(f, "unknown equalizer preset: {}", name),
            Self::EffectNotFound(name) => write!(f, "effect not found: {}", name),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for DspError {}
