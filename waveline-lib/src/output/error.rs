use std::fmt::{Display, Formatter};

/// Error type for audio output devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// `write` or a transport call before `open`.
    NotOpen,
    Device(String),
    Closed,
}

impl Display for OutputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "output is not open"),
            Self::Device(msg) => write!(f, "output device error: {}", msg),
            Self::Closed => write!(f, "output is closed"),
        }
    }
}

impl std::error::Error for OutputError {}

impl From<rodio::StreamError> for OutputError {
    fn from(value: rodio::StreamError) -> Self {
        Self::Device(value.to_string())
    }
}
