//! Decoder over PCM that is already in memory.

use super::{AudioFormat, DecodeError, DecodeStatus, Decoder, Metadata};

/// Serves interleaved samples from an owned buffer.
///
/// Useful for synthesized material and for exercising the player without
/// touching the filesystem.
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    format: AudioFormat,
    samples: Vec<f32>,
    cursor: usize,
    metadata: Metadata,
    closed: bool,
}

impl MemoryDecoder {
    /// Wrap `samples`, which must be interleaved in `format.channels`.
    ///
    /// A trailing partial frame is discarded.
    pub fn new(format: AudioFormat, mut samples: Vec<f32>) -> Self {
        let channels = format.channels.max(1) as usize;
        samples.truncate(samples.len() - samples.len() % channels);
        let frames = (samples.len() / channels) as u64;
        let metadata = Metadata {
            duration: format.frames_to_duration(frames),
            ..Metadata::default()
        };
        Self {
            format,
            samples,
            cursor: 0,
            metadata,
            closed: false,
        }
    }

    /// Attach descriptive metadata. The duration field is kept in sync with
    /// the sample buffer.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        let duration = self.metadata.duration;
        self.metadata = Metadata {
            duration,
            ..metadata
        };
        self
    }

    fn channels(&self) -> usize {
        self.format.channels.max(1) as usize
    }
}

impl Decoder for MemoryDecoder {
    fn decode(&mut self, buf: &mut [f32]) -> Result<DecodeStatus, DecodeError> {
        if self.closed {
            return Ok(DecodeStatus::EndOfStream);
        }
        if buf.is_empty() {
            return Ok(DecodeStatus::Decoded(0));
        }

        let remaining = self.samples.len() - self.cursor;
        if remaining == 0 {
            return Ok(DecodeStatus::EndOfStream);
        }

        let count = remaining.min(buf.len());
        buf[..count].copy_from_slice(&self.samples[self.cursor..self.cursor + count]);
        self.cursor += count;
        Ok(DecodeStatus::Decoded(count))
    }

    fn seek_sample(&mut self, frame: u64) -> Result<(), DecodeError> {
        if self.closed {
            return Err(DecodeError::Closed);
        }
        let total = self.sample_count();
        if frame > total {
            return Err(DecodeError::SeekOutOfRange {
                requested: self.format.frames_to_duration(frame),
                duration: self.format.frames_to_duration(total),
            });
        }
        self.cursor = frame as usize * self.channels();
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn sample_count(&self) -> u64 {
        (self.samples.len() / self.channels()) as u64
    }

    fn current_sample(&self) -> u64 {
        (self.cursor / self.channels()) as u64
    }

    fn close(&mut self) {
        self.closed = true;
        self.samples = Vec::new();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_buffer_sizes_yield_partial_final_read() {
        let format = AudioFormat::new(10, 2);
        let mut decoder = MemoryDecoder::new(format, (0..10).map(|i| i as f32).collect());
        let mut buf = [0.0; 3];

        let mut collected = Vec::new();
        loop {
            match decoder.decode(&mut buf).unwrap() {
                DecodeStatus::Decoded(n) => collected.extend_from_slice(&buf[..n]),
                DecodeStatus::EndOfStream => break,
            }
        }

        assert_eq!(collected.len(), 10);
        assert_eq!(collected[9], 9.0);
        assert_eq!(decoder.current_sample(), 5);
    }

    #[test]
    fn closed_decoder_reports_end_of_stream() {
        let mut decoder = MemoryDecoder::new(AudioFormat::new(10, 1), vec![0.1; 4]);
        decoder.close();
        let mut buf = [0.0; 4];
        assert_eq!(decoder.decode(&mut buf).unwrap(), DecodeStatus::EndOfStream);
        assert!(matches!(decoder.seek_sample(0), Err(DecodeError::Closed)));
    }

    #[test]
    fn seek_sample_lands_on_frame_boundary() {
        let mut decoder =
            MemoryDecoder::new(AudioFormat::new(4, 2), (0..16).map(|i| i as f32).collect());
        decoder.seek_sample(3).unwrap();
        let mut buf = [0.0; 2];
        decoder.decode(&mut buf).unwrap();
        assert_eq!(buf, [6.0, 7.0]);
        assert!(decoder.seek_sample(9).is_err());
    }
}
