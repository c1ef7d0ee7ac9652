//! Decoder abstraction.
//!
//! Every decoder produces interleaved, normalized `f32` PCM and reports its
//! format and tags up front. Concrete decoders are selected through a
//! [`DecoderRegistry`] value rather than global state.

mod error;
mod info;
mod media;
mod memory;
mod registry;

use std::time::Duration;

use crate::audio::samples::f32_to_i16;

pub use error::DecodeError;
pub use info::{Artwork, AudioFormat, Metadata, ReplayGainInfo};
pub use media::SymphoniaDecoder;
pub use memory::MemoryDecoder;
pub use registry::{DecoderFactory, DecoderRegistry, SymphoniaFactory};

/// Outcome of a single [`Decoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// This many interleaved samples were written to the front of the buffer.
    Decoded(usize),
    /// No samples remain. Not a failure.
    EndOfStream,
}

/// Common contract for all audio decoders.
///
/// Sample counts in `decode` are interleaved samples; positions passed to
/// `seek_sample` and returned by `sample_count`/`current_sample` are frames.
pub trait Decoder: Send {
    /// Decode into `buf`, returning how many samples were produced.
    ///
    /// Buffers of any length are accepted. The final call before the end of
    /// the stream may return fewer samples than requested; the call after
    /// that returns [`DecodeStatus::EndOfStream`].
    fn decode(&mut self, buf: &mut [f32]) -> Result<DecodeStatus, DecodeError>;

    /// Decode into 16-bit PCM for low-memory consumers.
    fn decode_i16(&mut self, buf: &mut [i16]) -> Result<DecodeStatus, DecodeError> {
        let mut scratch = vec![0.0_f32; buf.len()];
        let status = self.decode(&mut scratch)?;
        if let DecodeStatus::Decoded(count) = status {
            for (out, &sample) in buf.iter_mut().zip(&scratch[..count]) {
                *out = f32_to_i16(sample);
            }
        }
        Ok(status)
    }

    /// Seek to a time offset from the start of the stream.
    ///
    /// Targets past [`Decoder::duration`] are rejected with
    /// [`DecodeError::SeekOutOfRange`] when the length is exact; otherwise
    /// the source decides.
    fn seek(&mut self, position: Duration) -> Result<(), DecodeError> {
        let frame = self.format().duration_to_frames(position);
        if !self.length_is_exact() {
            return self.seek_sample(frame);
        }
        let duration = self.duration();
        if position > duration {
            return Err(DecodeError::SeekOutOfRange {
                requested: position,
                duration,
            });
        }
        self.seek_sample(frame.min(self.sample_count()))
    }

    /// Seek to an exact frame index.
    fn seek_sample(&mut self, frame: u64) -> Result<(), DecodeError>;

    fn format(&self) -> AudioFormat;

    fn metadata(&self) -> &Metadata;

    /// Total stream length.
    fn duration(&self) -> Duration {
        self.format().frames_to_duration(self.sample_count())
    }

    /// Time of the next frame to be decoded.
    fn position(&self) -> Duration {
        self.format().frames_to_duration(self.current_sample())
    }

    /// Total number of frames in the stream.
    fn sample_count(&self) -> u64;

    /// Index of the next frame to be decoded.
    fn current_sample(&self) -> u64;

    /// False while `sample_count` is only an estimate, or `0` because the
    /// container does not say. It becomes exact once the end is reached.
    fn length_is_exact(&self) -> bool {
        true
    }

    /// Release the underlying source. Later decodes report end of stream.
    fn close(&mut self);
}
