use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Error type for opening, decoding and seeking audio sources.
#[derive(Debug)]
pub enum DecodeError {
    UnsupportedFormat(String),
    InvalidData(String),
    SeekNotSupported,
    SeekOutOfRange { requested: Duration, duration: Duration },
    Io(std::io::Error),
    Closed,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat(format) => write!(f, "unsupported format: {}", format),
            Self::InvalidData(err) => write!(f, "invalid audio data: {}", err),
            Self::SeekNotSupported => write!(f, "source does not support seeking"),
            Self::SeekOutOfRange {
                requested,
                duration,
            } => write!(
                f,
                "seek target {:.3}s is outside 0..={:.3}s",
                requested.as_secs_f64(),
                duration.as_secs_f64()
            ),
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Closed => write!(f, "decoder is closed"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(value: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;

        match value {
            Error::IoError(err) => Self::Io(err),
            Error::DecodeError(msg) => Self::InvalidData(msg.to_string()),
            Error::Unsupported(what) => Self::UnsupportedFormat(what.to_string()),
            Error::SeekError(_) => Self::SeekNotSupported,
            Error::LimitError(msg) => Self::InvalidData(msg.to_string()),
            Error::ResetRequired => Self::InvalidData("decoder reset required".to_string()),
        }
    }
}
