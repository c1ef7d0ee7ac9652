//! Decoder wrapper that serves audio decoded ahead of time.

use std::time::Duration;

use log::debug;

use crate::audio::buffer::SampleRing;
use crate::decoder::{AudioFormat, DecodeError, DecodeStatus, Decoder, Metadata};

/// Serves a ring of already-decoded samples before continuing with the
/// wrapped decoder, so the first block after a track change needs no I/O.
pub(crate) struct Prebuffered {
    ring: SampleRing,
    inner: Box<dyn Decoder>,
}

impl Prebuffered {
    /// Decode up to `ahead` of audio from `inner` into the ring.
    pub(crate) fn fill(mut inner: Box<dyn Decoder>, ahead: Duration) -> Result<Self, DecodeError> {
        let format = inner.format();
        let channels = format.channels.max(1) as usize;
        let target = format.samples_for(ahead).max(channels);
        let mut ring = SampleRing::with_capacity(target);
        let mut scratch = vec![0.0_f32; (4_096 * channels).min(target)];

        while ring.remaining_space() > 0 {
            let want = ring.remaining_space().min(scratch.len());
            match inner.decode(&mut scratch[..want])? {
                DecodeStatus::Decoded(0) => break,
                DecodeStatus::Decoded(count) => {
                    ring.push_slice(&scratch[..count]);
                }
                DecodeStatus::EndOfStream => break,
            }
        }
        debug!(
            "prebuffered {} samples ({} ms requested)",
            ring.len(),
            ahead.as_millis()
        );
        Ok(Self { ring, inner })
    }

    pub(crate) fn buffered(&self) -> usize {
        self.ring.len()
    }

    fn channels(&self) -> u64 {
        self.inner.format().channels.max(1) as u64
    }
}

impl Decoder for Prebuffered {
    fn decode(&mut self, buf: &mut [f32]) -> Result<DecodeStatus, DecodeError> {
        if buf.is_empty() {
            return Ok(DecodeStatus::Decoded(0));
        }
        let from_ring = self.ring.drain_into(buf);
        if from_ring == buf.len() {
            return Ok(DecodeStatus::Decoded(from_ring));
        }
        match self.inner.decode(&mut buf[from_ring..])? {
            DecodeStatus::Decoded(count) => Ok(DecodeStatus::Decoded(from_ring + count)),
            DecodeStatus::EndOfStream if from_ring > 0 => Ok(DecodeStatus::Decoded(from_ring)),
            DecodeStatus::EndOfStream => Ok(DecodeStatus::EndOfStream),
        }
    }

    fn seek_sample(&mut self, frame: u64) -> Result<(), DecodeError> {
        self.inner.seek_sample(frame)?;
        self.ring.clear();
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }

    fn sample_count(&self) -> u64 {
        self.inner.sample_count()
    }

    fn current_sample(&self) -> u64 {
        let buffered = self.ring.len() as u64 / self.channels();
        self.inner.current_sample().saturating_sub(buffered)
    }

    fn length_is_exact(&self) -> bool {
        self.inner.length_is_exact()
    }

    fn close(&mut self) {
        self.ring.clear();
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::MemoryDecoder;

    fn source(frames: usize) -> Box<dyn Decoder> {
        let samples: Vec<f32> = (0..frames * 2).map(|i| i as f32).collect();
        Box::new(MemoryDecoder::new(AudioFormat::new(1_000, 2), samples))
    }

    #[test]
    fn serves_ring_then_inner_without_gaps() {
        let mut decoder = Prebuffered::fill(source(500), Duration::from_millis(100)).unwrap();
        assert_eq!(decoder.buffered(), 200);
        assert_eq!(decoder.current_sample(), 0);

        let mut out = Vec::new();
        let mut buf = [0.0_f32; 64];
        while let DecodeStatus::Decoded(count) = decoder.decode(&mut buf).unwrap() {
            out.extend_from_slice(&buf[..count]);
        }
        let expected: Vec<f32> = (0..1_000).map(|i| i as f32).collect();
        assert_eq!(out, expected);
        assert_eq!(decoder.current_sample(), 500);
    }

    #[test]
    fn short_source_fills_partially() {
        let decoder = Prebuffered::fill(source(30), Duration::from_millis(500)).unwrap();
        assert_eq!(decoder.buffered(), 60);
        assert_eq!(decoder.duration(), Duration::from_millis(30));
    }

    #[test]
    fn seek_discards_ring() {
        let mut decoder = Prebuffered::fill(source(500), Duration::from_millis(100)).unwrap();
        decoder.seek(Duration::from_millis(250)).unwrap();
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.current_sample(), 250);
        let mut buf = [0.0_f32; 2];
        decoder.decode(&mut buf).unwrap();
        assert_eq!(buf, [500.0, 501.0]);
    }
}
