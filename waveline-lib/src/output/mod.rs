//! Audio output sinks.
//!
//! The player talks to an [`AudioOutput`] and never to a device directly,
//! so the same worker loop drives the rodio device ([`RodioOutput`]) and the
//! in-memory capture used by tests ([`MemoryOutput`]).

use std::time::Duration;

use crate::decoder::AudioFormat;

mod device;
mod error;
mod memory;

pub use device::RodioOutput;
pub use error::OutputError;
pub use memory::{MemoryOutput, MemoryOutputHandle};

/// Destination for processed interleaved `f32` samples.
pub trait AudioOutput: Send {
    /// Prepare the device for `format`. Opening again with a different
    /// format switches later writes to it without dropping queued audio;
    /// with the same format it is a no-op.
    fn open(&mut self, format: AudioFormat) -> Result<(), OutputError>;

    /// Queue samples for playback.
    ///
    /// Returns how many samples were accepted, which may be fewer than
    /// submitted (including zero) when the device queue is full. The caller
    /// resubmits the rest.
    fn write(&mut self, samples: &[f32]) -> Result<usize, OutputError>;

    fn pause(&mut self) -> Result<(), OutputError>;

    fn resume(&mut self) -> Result<(), OutputError>;

    /// Drop everything queued and reset position bookkeeping.
    fn flush(&mut self) -> Result<(), OutputError>;

    fn close(&mut self) -> Result<(), OutputError>;

    /// Final linear gain in `[0, 1]`.
    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    /// Audio queued but not yet heard.
    fn latency(&self) -> Duration;

    /// Audio heard since the last `open` or `flush`.
    fn position(&self) -> Duration;

    fn format(&self) -> Option<AudioFormat>;
}

/// Creates the output a player renders into.
pub trait OutputFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioOutput>, OutputError>;
}

impl<F> OutputFactory for F
where
    F: Fn() -> Result<Box<dyn AudioOutput>, OutputError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn AudioOutput>, OutputError> {
        self()
    }
}

/// Factory for the default system device.
#[derive(Debug, Clone, Copy)]
pub struct RodioOutputFactory {
    pub buffer: Duration,
}

impl OutputFactory for RodioOutputFactory {
    fn create(&self) -> Result<Box<dyn AudioOutput>, OutputError> {
        Ok(Box::new(RodioOutput::new(self.buffer)))
    }
}

/// Convert an interleaved sample count to a duration at `format`.
pub(crate) fn samples_to_duration(format: &AudioFormat, samples: usize) -> Duration {
    let channels = format.channels.max(1) as u64;
    format.frames_to_duration(samples as u64 / channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_factories() {
        let factory = || -> Result<Box<dyn AudioOutput>, OutputError> {
            Ok(Box::new(MemoryOutput::new()))
        };
        let mut output = factory.create().unwrap();
        output.open(AudioFormat::new(8_000, 2)).unwrap();
        assert_eq!(output.write(&[0.1, 0.2]).unwrap(), 2);
    }

    #[test]
    fn sample_counts_convert_per_frame() {
        let format = AudioFormat::new(48_000, 2);
        assert_eq!(samples_to_duration(&format, 96_000), Duration::from_secs(1));
        assert_eq!(samples_to_duration(&format, 0), Duration::ZERO);
    }
}
