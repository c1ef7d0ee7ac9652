//! Second-order IIR filter shared by the equalizer bands.

use std::f64::consts::PI;

/// Normalized biquad coefficients (`a0` already divided out).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Coefficients that pass the input through unchanged.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Peaking EQ coefficients from the bilinear-transformed analog prototype.
    ///
    /// Bands centred at or above Nyquist cannot be realised and fall back to
    /// [`BiquadCoefficients::IDENTITY`], as does a gain of exactly 0 dB.
    pub fn peaking(freq_hz: f64, q: f64, gain_db: f64, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f64 / 2.0;
        if gain_db == 0.0 || freq_hz <= 0.0 || freq_hz >= nyquist || q <= 0.0 {
            return Self::IDENTITY;
        }

        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq_hz / sample_rate as f64;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter with independent history per interleaved channel.
#[derive(Clone, Debug)]
pub struct BiquadFilter {
    coeffs: BiquadCoefficients,
    x_n1: Vec<f64>,
    x_n2: Vec<f64>,
    y_n1: Vec<f64>,
    y_n2: Vec<f64>,
}

impl BiquadFilter {
    pub fn new(channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            coeffs: BiquadCoefficients::IDENTITY,
            x_n1: vec![0.0; channels],
            x_n2: vec![0.0; channels],
            y_n1: vec![0.0; channels],
            y_n2: vec![0.0; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.x_n1.len()
    }

    /// Replace the coefficients. Filter history is kept.
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    /// Change the channel count. History is cleared only if the count changes.
    pub fn set_channels(&mut self, channels: usize) {
        let channels = channels.max(1);
        if channels == self.channels() {
            return;
        }
        self.x_n1 = vec![0.0; channels];
        self.x_n2 = vec![0.0; channels];
        self.y_n1 = vec![0.0; channels];
        self.y_n2 = vec![0.0; channels];
    }

    #[inline]
    pub fn process_sample(&mut self, ch: usize, sample: f32) -> f32 {
        let x = sample as f64;
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x_n1[ch] + c.b2 * self.x_n2[ch]
            - c.a1 * self.y_n1[ch]
            - c.a2 * self.y_n2[ch];

        self.x_n2[ch] = self.x_n1[ch];
        self.x_n1[ch] = x;
        self.y_n2[ch] = self.y_n1[ch];
        self.y_n1[ch] = y;

        y as f32
    }

    /// Filter interleaved samples in place. Chunks must hold whole frames.
    pub fn process(&mut self, samples: &mut [f32]) {
        let channels = self.channels();
        for (idx, sample) in samples.iter_mut().enumerate() {
            *sample = self.process_sample(idx % channels, *sample);
        }
    }

    /// Filter separate left/right buffers in place using channels 0 and 1.
    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.set_channels(self.channels().max(2));
        for sample in left.iter_mut() {
            *sample = self.process_sample(0, *sample);
        }
        for sample in right.iter_mut() {
            *sample = self.process_sample(1, *sample);
        }
    }

    pub fn reset(&mut self) {
        self.x_n1.fill(0.0);
        self.x_n2.fill(0.0);
        self.y_n1.fill(0.0);
        self.y_n2.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{approx_eq, sine_wave};

    #[test]
    fn chunked_processing_matches_single_pass() {
        let input = sine_wave(997.0, 48_000, 2, 2_048, 0.6);
        let coeffs = BiquadCoefficients::peaking(1_000.0, 0.7, 9.0, 48_000);

        let mut whole = BiquadFilter::new(2);
        whole.set_coefficients(coeffs);
        let mut single = input.clone();
        whole.process(&mut single);

        let mut split = BiquadFilter::new(2);
        split.set_coefficients(coeffs);
        let mut chunked = input.clone();
        let (head, tail) = chunked.split_at_mut(1_002);
        split.process(head);
        split.process(tail);

        assert!(single
            .iter()
            .zip(chunked.iter())
            .all(|(a, b)| approx_eq(*a, *b, 1e-6)));
    }

    #[test]
    fn stereo_path_matches_interleaved_path() {
        let coeffs = BiquadCoefficients::peaking(250.0, 0.7, -6.0, 44_100);
        let left: Vec<f32> = (0..256).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let right: Vec<f32> = (0..256).map(|i| ((i * 5) % 11) as f32 / 11.0 - 0.5).collect();

        let mut interleaved: Vec<f32> = left
            .iter()
            .zip(right.iter())
            .flat_map(|(l, r)| [*l, *r])
            .collect();
        let mut a = BiquadFilter::new(2);
        a.set_coefficients(coeffs);
        a.process(&mut interleaved);

        let (mut l, mut r) = (left.clone(), right.clone());
        let mut b = BiquadFilter::new(2);
        b.set_coefficients(coeffs);
        b.process_stereo(&mut l, &mut r);

        for i in 0..256 {
            assert!(approx_eq(interleaved[i * 2], l[i], 1e-6));
            assert!(approx_eq(interleaved[i * 2 + 1], r[i], 1e-6));
        }
    }

    #[test]
    fn extreme_gain_stays_bounded() {
        for gain in [-12.0, 12.0] {
            for freq in [31.25, 1_000.0, 16_000.0] {
                let mut filter = BiquadFilter::new(1);
                filter.set_coefficients(BiquadCoefficients::peaking(freq, 0.7, gain, 44_100));
                let mut signal = sine_wave(freq as f32, 44_100, 1, 44_100, 1.0);
                filter.process(&mut signal);
                assert!(signal.iter().all(|s| s.is_finite() && s.abs() < 8.0));
            }
        }
    }

    #[test]
    fn unrealisable_band_is_identity() {
        assert_eq!(
            BiquadCoefficients::peaking(16_000.0, 0.7, 6.0, 22_050),
            BiquadCoefficients::IDENTITY
        );
    }

    #[test]
    fn channel_change_clears_history() {
        let mut filter = BiquadFilter::new(2);
        filter.set_coefficients(BiquadCoefficients::peaking(100.0, 0.7, 6.0, 8_000));
        let mut samples = vec![0.5; 16];
        filter.process(&mut samples);
        filter.set_channels(2);
        assert!(filter.y_n1.iter().any(|v| *v != 0.0));
        filter.set_channels(1);
        assert!(filter.y_n1.iter().all(|v| *v == 0.0));
    }
}
