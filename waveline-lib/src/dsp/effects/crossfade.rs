//! Two-source crossfade mixing.

use std::f64::consts::FRAC_PI_2;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::DspError;

/// Gain curve used while crossfading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeCurve {
    Linear,
    /// Constant perceived loudness: `gain_a² + gain_b² = 1`.
    #[default]
    EqualPower,
    /// Two-segment quadratic ramp; the incoming source reaches full level at
    /// the midpoint and the outgoing one only starts to fall there.
    Logarithmic,
}

impl CrossfadeCurve {
    /// `(gain_a, gain_b)` at `position`, which is clamped to `[0, 1]`.
    pub fn gains(self, position: f64) -> (f64, f64) {
        let p = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
        match self {
            Self::Linear => (1.0 - p, p),
            Self::EqualPower => ((p * FRAC_PI_2).cos(), (p * FRAC_PI_2).sin()),
            Self::Logarithmic => {
                if p < 0.5 {
                    (1.0, (2.0 * p).powi(2) / 2.0)
                } else {
                    ((2.0 * (1.0 - p)).powi(2) / 2.0, 1.0)
                }
            }
        }
    }
}

impl FromStr for CrossfadeCurve {
    type Err = DspError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "linear" => Ok(Self::Linear),
            "equal_power" => Ok(Self::EqualPower),
            "logarithmic" | "log" => Ok(Self::Logarithmic),
            other => Err(DspError::InvalidParameter(format!(
                "unknown crossfade curve \"{}\"",
                other
            ))),
        }
    }
}

/// Mixes an outgoing source A with an incoming source B.
#[derive(Debug, Clone)]
pub struct Crossfader {
    position: f64,
    curve: CrossfadeCurve,
    enabled: bool,
}

impl Default for Crossfader {
    fn default() -> Self {
        Self::new(CrossfadeCurve::default())
    }
}

impl Crossfader {
    pub fn new(curve: CrossfadeCurve) -> Self {
        Self {
            position: 0.0,
            curve,
            enabled: false,
        }
    }

    /// Set the mix position: `0.0` is all A, `1.0` is all B.
    pub fn set_position(&mut self, position: f64) {
        self.position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn set_curve(&mut self, curve: CrossfadeCurve) {
        self.curve = curve;
    }

    pub fn curve(&self) -> CrossfadeCurve {
        self.curve
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current `(gain_a, gain_b)`.
    pub fn gains(&self) -> (f64, f64) {
        self.curve.gains(self.position)
    }

    /// Write `a[i] * gain_a + b[i] * gain_b` into `out`.
    ///
    /// Samples missing from the shorter input count as silence.
    pub fn mix(&self, a: &[f32], b: &[f32], out: &mut [f32]) {
        let (gain_a, gain_b) = self.gains();
        let (gain_a, gain_b) = (gain_a as f32, gain_b as f32);
        for (i, slot) in out.iter_mut().enumerate() {
            let sa = a.get(i).copied().unwrap_or(0.0);
            let sb = b.get(i).copied().unwrap_or(0.0);
            *slot = sa * gain_a + sb * gain_b;
        }
    }

    /// Mix with the position ramping linearly from `start` to `end` across
    /// the buffer, one step per frame.
    pub fn mix_ramp(
        &mut self,
        a: &[f32],
        b: &[f32],
        out: &mut [f32],
        channels: usize,
        start: f64,
        end: f64,
    ) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        if frames == 0 {
            return;
        }
        for frame in 0..frames {
            let t = frame as f64 / frames as f64;
            self.set_position(start + (end - start) * t);
            let (gain_a, gain_b) = self.gains();
            for ch in 0..channels {
                let i = frame * channels + ch;
                let sa = a.get(i).copied().unwrap_or(0.0);
                let sb = b.get(i).copied().unwrap_or(0.0);
                out[i] = sa * gain_a as f32 + sb * gain_b as f32;
            }
        }
        self.set_position(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_power_keeps_unit_energy() {
        for step in 0..=1_000 {
            let p = step as f64 / 1_000.0;
            let (a, b) = CrossfadeCurve::EqualPower.gains(p);
            assert!((a * a + b * b - 1.0).abs() < 1e-12, "p={}", p);
        }
    }

    #[test]
    fn endpoints_select_one_source() {
        let a = [0.25_f32, -0.5, 0.75];
        let b = [0.9_f32, 0.1, -0.3];
        let mut out = [0.0; 3];

        for curve in [
            CrossfadeCurve::Linear,
            CrossfadeCurve::EqualPower,
            CrossfadeCurve::Logarithmic,
        ] {
            let mut fader = Crossfader::new(curve);
            fader.set_position(0.0);
            fader.mix(&a, &b, &mut out);
            assert!(out.iter().zip(a.iter()).all(|(o, s)| (o - s).abs() < 1e-6));

            fader.set_position(1.0);
            fader.mix(&a, &b, &mut out);
            assert!(out.iter().zip(b.iter()).all(|(o, s)| (o - s).abs() < 1e-6));
        }
    }

    #[test]
    fn logarithmic_curve_segments() {
        assert_eq!(CrossfadeCurve::Logarithmic.gains(0.25), (1.0, 0.125));
        assert_eq!(CrossfadeCurve::Logarithmic.gains(0.75), (0.125, 1.0));
        assert_eq!(CrossfadeCurve::Linear.gains(0.25), (0.75, 0.25));
    }

    #[test]
    fn mismatched_lengths_are_index_safe() {
        let mut fader = Crossfader::new(CrossfadeCurve::Linear);
        fader.set_position(0.5);
        let mut out = [1.0; 4];
        fader.mix(&[1.0, 1.0], &[1.0, 1.0, 1.0], &mut out);
        assert_eq!(out, [1.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn position_is_clamped() {
        let mut fader = Crossfader::default();
        fader.set_position(3.0);
        assert_eq!(fader.position(), 1.0);
        fader.set_position(-1.0);
        assert_eq!(fader.position(), 0.0);
        assert_eq!(
            "equal-power".parse::<CrossfadeCurve>().unwrap(),
            CrossfadeCurve::EqualPower
        );
        assert!("s-curve".parse::<CrossfadeCurve>().is_err());
    }

    #[test]
    fn ramp_moves_from_a_to_b() {
        let mut fader = Crossfader::new(CrossfadeCurve::Linear);
        let a = vec![1.0_f32; 8];
        let b = vec![0.0_f32; 8];
        let mut out = vec![0.0; 8];
        fader.mix_ramp(&a, &b, &mut out, 2, 0.0, 1.0);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 1.0);
        assert!(out.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(fader.position(), 1.0);
    }
}
