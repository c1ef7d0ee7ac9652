//! Variable playback speed by nearest-sample frame selection.
//!
//! Pitch moves with speed. The read phase carries across calls, so a stream
//! split into blocks resamples the same as one long buffer.

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

#[derive(Debug, Clone)]
pub(crate) struct SpeedResampler {
    speed: f64,
    /// Read position in frames relative to the start of the next block.
    phase: f64,
}

impl Default for SpeedResampler {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SpeedResampler {
    pub(crate) fn new(speed: f32) -> Self {
        Self {
            speed: speed.clamp(MIN_SPEED, MAX_SPEED) as f64,
            phase: 0.0,
        }
    }

    pub(crate) fn set_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED) as f64;
    }

    pub(crate) fn speed(&self) -> f32 {
        self.speed as f32
    }

    pub(crate) fn is_unity(&self) -> bool {
        self.speed == 1.0
    }

    /// Forget the carried phase, e.g. after a seek.
    pub(crate) fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Append the resampled frames of `input` to `output`.
    pub(crate) fn process(&mut self, input: &[f32], channels: usize, output: &mut Vec<f32>) {
        let channels = channels.max(1);
        let frames = input.len() / channels;
        if self.is_unity() && self.phase == 0.0 {
            output.extend_from_slice(&input[..frames * channels]);
            return;
        }

        output.reserve(((frames as f64 / self.speed) as usize + 1) * channels);
        while (self.phase as usize) < frames {
            let start = self.phase as usize * channels;
            output.extend_from_slice(&input[start..start + channels]);
            self.phase += self.speed;
        }
        self.phase -= frames as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|f| std::iter::repeat(f as f32).take(channels))
            .collect()
    }

    #[test]
    fn unity_is_passthrough() {
        let input = ramp(100, 2);
        let mut output = Vec::new();
        SpeedResampler::new(1.0).process(&input, 2, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn output_length_tracks_speed() {
        for speed in [0.5_f32, 0.75, 1.25, 1.5, 2.0] {
            let frames = 10_000;
            let input = ramp(frames, 2);
            let mut resampler = SpeedResampler::new(speed);
            let mut output = Vec::new();
            for block in input.chunks(2 * 333) {
                resampler.process(block, 2, &mut output);
            }
            let expected = (frames as f64 / speed as f64).floor() as i64;
            let produced = (output.len() / 2) as i64;
            assert!((produced - expected).abs() <= 1, "speed {}: {}", speed, produced);
        }
    }

    #[test]
    fn faster_speed_never_yields_more_frames() {
        let input = ramp(4_096, 1);
        let mut previous = usize::MAX;
        for step in 0..=15 {
            let speed = 0.5 + step as f32 * 0.1;
            let mut output = Vec::new();
            SpeedResampler::new(speed).process(&input, 1, &mut output);
            assert!(output.len() <= previous);
            previous = output.len();
        }
    }

    #[test]
    fn frames_stay_intact_and_ordered() {
        let input = ramp(1_000, 2);
        let mut output = Vec::new();
        SpeedResampler::new(1.7).process(&input, 2, &mut output);
        for frame in output.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(output.chunks(2).map(|f| f[0]).collect::<Vec<_>>().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(SpeedResampler::new(9.0).speed(), MAX_SPEED);
    }
}
