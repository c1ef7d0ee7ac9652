use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::decoder::DecodeError;
use crate::output::OutputError;

/// Error type for player commands.
///
/// Validation errors are returned before any state changes.
#[derive(Debug)]
pub enum PlayerError {
    NoTrackLoaded,
    AlreadyPlaying,
    NotPlaying,
    /// The player is in the error state; load a track to recover.
    InErrorState,
    InvalidVolume(f32),
    InvalidSpeed(f32),
    /// Seek target in seconds, which may be negative or past the end.
    InvalidSeek { requested: f64, duration: Duration },
    Decode(DecodeError),
    Output(OutputError),
    /// The player has been closed.
    Closed,
}

impl Display for PlayerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTrackLoaded => write!(f, "no track loaded"),
            Self::AlreadyPlaying => write!(f, "already playing"),
            Self::NotPlaying => write!(f, "not playing"),
            Self::InErrorState => write!(f, "player is in the error state"),
            Self::InvalidVolume(v) => write!(f, "volume {} is outside 0.0..=1.0", v),
            Self::InvalidSpeed(s) => write!(f, "speed {} is outside 0.5..=2.0", s),
            Self::InvalidSeek {
                requested,
                duration,
            } => write!(
                f,
                "seek target {:.3}s is outside 0..={:.3}s",
                requested,
                duration.as_secs_f64()
            ),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Output(err) => write!(f, "output error: {}", err),
            Self::Closed => write!(f, "player is closed"),
        }
    }
}

impl std::error::Error for PlayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Output(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for PlayerError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<OutputError> for PlayerError {
    fn from(value: OutputError) -> Self {
        Self::Output(value)
    }
}
