use std::fmt::{Display, Formatter};

use waveline_lib::decoder::DecodeError;
use waveline_lib::dsp::DspError;
use waveline_lib::playback::PlayerError;

/// Failures surfaced to the command line as a non-zero exit.
#[derive(Debug)]
pub enum CliError {
    Usage(String),
    Config(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Decode(DecodeError),
    Dsp(DspError),
    Player(PlayerError),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{}", message),
            Self::Config(message) => write!(f, "invalid config: {}", message),
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Json(err) => write!(f, "json error: {}", err),
            Self::Decode(err) => write!(f, "{}", err),
            Self::Dsp(err) => write!(f, "{}", err),
            Self::Player(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Dsp(err) => Some(err),
            Self::Player(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<DecodeError> for CliError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<DspError> for CliError {
    fn from(value: DspError) -> Self {
        Self::Dsp(value)
    }
}

impl From<PlayerError> for CliError {
    fn from(value: PlayerError) -> Self {
        Self::Player(value)
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
