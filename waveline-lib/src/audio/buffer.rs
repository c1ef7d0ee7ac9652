//! Bounded ring buffer used to stage decoded samples ahead of playback.

use dasp_ring_buffer::Bounded;

/// Fixed-capacity FIFO of interleaved samples.
///
/// The gapless path fills one of these from the next track's decoder while
/// the current track is still playing, then drains it first after the swap.
pub struct SampleRing {
    ring: Bounded<Vec<f32>>,
}

impl SampleRing {
    /// Create an empty ring that holds at most `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Bounded::from(vec![0.0; capacity.max(1)]),
        }
    }

    /// Number of samples currently queued.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Maximum number of samples the ring can hold.
    pub fn capacity(&self) -> usize {
        self.ring.max_len()
    }

    /// Free space left before the ring is full.
    pub fn remaining_space(&self) -> usize {
        self.ring.max_len().saturating_sub(self.ring.len())
    }

    /// Queue as many samples from `samples` as fit.
    ///
    /// Returns the number of samples accepted. Samples never overwrite
    /// queued data.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        let accepted = samples.len().min(self.remaining_space());
        for &sample in &samples[..accepted] {
            self.ring.push(sample);
        }
        accepted
    }

    /// Move queued samples into `out`, oldest first.
    ///
    /// Returns the number of samples written.
    pub fn drain_into(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;
        for slot in out.iter_mut() {
            match self.ring.pop() {
                Some(sample) => {
                    *slot = sample;
                    written += 1;
                }
                None => break,
            }
        }
        written
    }

    /// Drop all queued samples.
    pub fn clear(&mut self) {
        while self.ring.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_is_bounded_and_fifo() {
        let mut ring = SampleRing::with_capacity(4);
        assert_eq!(ring.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]), 4);
        assert_eq!(ring.remaining_space(), 0);

        let mut out = [0.0; 3];
        assert_eq!(ring.drain_into(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(ring.push_slice(&[6.0, 7.0]), 2);

        let mut rest = [0.0; 8];
        assert_eq!(ring.drain_into(&mut rest), 3);
        assert_eq!(&rest[..3], &[4.0, 6.0, 7.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut ring = SampleRing::with_capacity(8);
        ring.push_slice(&[0.5; 6]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.remaining_space(), 8);
    }
}
