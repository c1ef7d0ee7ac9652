//! Ten-band graphic equalizer built from peaking biquads.
//!
//! Band centres are fixed; only gains move. Coefficients are recomputed for
//! a band only when its gain changes (or when the sample rate does), never
//! per sample.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::biquad::{BiquadCoefficients, BiquadFilter};
use super::{Effect, EffectContext};
use crate::dsp::DspError;

pub const BAND_COUNT: usize = 10;
pub const BAND_FREQUENCIES_HZ: [f64; BAND_COUNT] = [
    31.25, 62.5, 125.0, 250.0, 500.0, 1_000.0, 2_000.0, 4_000.0, 8_000.0, 16_000.0,
];
pub const DEFAULT_Q: f64 = 0.7;
pub const MIN_GAIN_DB: f64 = -12.0;
pub const MAX_GAIN_DB: f64 = 12.0;

pub const NAME: &str = "Equalizer";

const PRESETS: [(&str, [f64; BAND_COUNT]); 10] = [
    ("flat", [0.0; BAND_COUNT]),
    ("rock", [5.0, 4.0, 3.0, 1.0, -1.0, -1.0, 1.0, 3.0, 4.0, 5.0]),
    ("pop", [-2.0, -1.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -2.0]),
    ("jazz", [0.0, 0.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, 0.0, 0.0]),
    ("classical", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0, -2.0, -2.0, -3.0]),
    ("dance", [6.0, 5.0, 2.0, 0.0, 0.0, -2.0, -2.0, -2.0, 0.0, 0.0]),
    ("bass_boost", [8.0, 6.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("treble_boost", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 8.0]),
    ("vocal", [-2.0, -3.0, -3.0, 1.0, 4.0, 4.0, 3.0, 1.0, 0.0, -1.0]),
    ("powerful", [6.0, 5.0, 0.0, -2.0, 1.0, 3.0, 5.0, 6.0, 4.0, 0.0]),
];

/// Named presets in display order.
pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

/// Band gains for a named preset.
pub fn preset(name: &str) -> Option<[f64; BAND_COUNT]> {
    let name = normalize_preset_name(name);
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, gains)| *gains)
}

/// One equalizer band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerBand {
    pub frequency_hz: f64,
    pub gain_db: f64,
    pub q: f64,
}

/// Ten-band peaking equalizer.
pub struct Equalizer {
    bands: [EqualizerBand; BAND_COUNT],
    filters: Vec<BiquadFilter>,
    context: EffectContext,
    preset: Option<String>,
    enabled: bool,
}

impl std::fmt::Debug for Equalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Equalizer")
            .field("enabled", &self.enabled)
            .field("gains", &self.gains())
            .field("preset", &self.preset)
            .finish()
    }
}

impl Equalizer {
    /// Create a flat, enabled equalizer.
    pub fn new(context: EffectContext) -> Self {
        let bands = BAND_FREQUENCIES_HZ.map(|frequency_hz| EqualizerBand {
            frequency_hz,
            gain_db: 0.0,
            q: DEFAULT_Q,
        });
        Self {
            bands,
            filters: (0..BAND_COUNT)
                .map(|_| BiquadFilter::new(context.channels))
                .collect(),
            context,
            preset: Some("flat".to_string()),
            enabled: true,
        }
    }

    pub fn bands(&self) -> &[EqualizerBand; BAND_COUNT] {
        &self.bands
    }

    /// Set one band's gain, clamped to ±12 dB. Returns the gain applied.
    pub fn set_band_gain(&mut self, band: usize, gain_db: f64) -> Result<f64, DspError> {
        if band >= BAND_COUNT {
            return Err(DspError::InvalidBand(band));
        }
        let gain_db = clamp_gain(gain_db);
        self.preset = None;
        if self.bands[band].gain_db != gain_db {
            self.bands[band].gain_db = gain_db;
            self.update_filter(band);
        }
        Ok(gain_db)
    }

    pub fn band_gain(&self, band: usize) -> Option<f64> {
        self.bands.get(band).map(|b| b.gain_db)
    }

    /// Set all ten gains at once, each clamped to ±12 dB.
    pub fn set_gains(&mut self, gains: [f64; BAND_COUNT]) {
        for (band, gain) in gains.into_iter().enumerate() {
            let gain = clamp_gain(gain);
            if self.bands[band].gain_db != gain {
                self.bands[band].gain_db = gain;
                self.update_filter(band);
            }
        }
        self.preset = None;
    }

    pub fn gains(&self) -> [f64; BAND_COUNT] {
        self.bands.map(|b| b.gain_db)
    }

    /// Apply a named preset to all bands.
    pub fn load_preset(&mut self, name: &str) -> Result<(), DspError> {
        let gains = preset(name).ok_or_else(|| DspError::UnknownPreset(name.to_string()))?;
        self.set_gains(gains);
        self.preset = Some(normalize_preset_name(name));
        Ok(())
    }

    /// Name of the preset the current gains came from, if unchanged since.
    pub fn current_preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    /// Return every band to 0 dB.
    pub fn flatten(&mut self) {
        self.set_gains([0.0; BAND_COUNT]);
        self.preset = Some("flat".to_string());
    }

    fn update_filter(&mut self, band: usize) {
        let b = self.bands[band];
        self.filters[band].set_coefficients(BiquadCoefficients::peaking(
            b.frequency_hz,
            b.q,
            b.gain_db,
            self.context.sample_rate,
        ));
    }
}

impl Effect for Equalizer {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&mut self, context: &EffectContext) {
        let rate_changed = context.sample_rate != self.context.sample_rate;
        self.context = *context;
        for filter in &mut self.filters {
            filter.set_channels(context.channels);
        }
        if rate_changed {
            for band in 0..BAND_COUNT {
                self.update_filter(band);
            }
        }
    }

    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for filter in &mut self.filters {
            filter.process(samples);
        }
    }

    fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for filter in &mut self.filters {
            filter.process_stereo(left, right);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn normalize_preset_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

fn clamp_gain(gain_db: f64) -> f64 {
    if gain_db.is_nan() {
        return 0.0;
    }
    gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use realfft::RealFftPlanner;

    use super::*;
    use crate::test_data::{approx_eq, sine_wave};

    fn eq() -> Equalizer {
        Equalizer::new(EffectContext::new(48_000, 2))
    }

    #[test]
    fn flat_equalizer_is_identity() {
        let mut eq = eq();
        let mut rng = rand::thread_rng();
        let input: Vec<f32> = (0..4_096).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut output = input.clone();
        eq.process(&mut output);
        assert!(input
            .iter()
            .zip(output.iter())
            .all(|(a, b)| approx_eq(*a, *b, 1e-6)));
    }

    #[test]
    fn band_gain_is_clamped() {
        let mut eq = eq();
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let requested: f64 = rng.gen_range(-40.0..40.0);
            let band = rng.gen_range(0..BAND_COUNT);
            let applied = eq.set_band_gain(band, requested).unwrap();
            assert_eq!(applied, requested.clamp(-12.0, 12.0));
            assert_eq!(eq.band_gain(band), Some(applied));
        }
        assert_eq!(eq.set_band_gain(10, 3.0), Err(DspError::InvalidBand(10)));
        assert_eq!(eq.band_gain(10), None);
    }

    #[test]
    fn only_changed_band_gets_new_coefficients() {
        let mut eq = eq();
        eq.load_preset("rock").unwrap();
        let before: Vec<_> = eq.filters.iter().map(|f| f.coefficients()).collect();
        eq.set_band_gain(3, -4.0).unwrap();
        for (band, filter) in eq.filters.iter().enumerate() {
            if band == 3 {
                assert_ne!(filter.coefficients(), before[band]);
            } else {
                assert_eq!(filter.coefficients(), before[band]);
            }
        }
    }

    #[test]
    fn presets_apply_atomically_and_unknown_is_rejected() {
        let mut eq = eq();
        eq.load_preset("bass_boost").unwrap();
        assert_eq!(eq.gains(), preset("bass_boost").unwrap());
        assert_eq!(eq.current_preset(), Some("bass_boost"));

        let err = eq.load_preset("metal").unwrap_err();
        assert_eq!(err, DspError::UnknownPreset("metal".to_string()));
        assert_eq!(eq.gains(), preset("bass_boost").unwrap());

        eq.set_band_gain(0, 1.0).unwrap();
        assert_eq!(eq.current_preset(), None);
        eq.flatten();
        assert_eq!(eq.gains(), [0.0; BAND_COUNT]);
        assert_eq!(preset_names().len(), 10);
    }

    #[test]
    fn boosted_band_raises_its_frequency() {
        let sample_rate = 48_000;
        let mut eq = Equalizer::new(EffectContext::new(sample_rate, 1));
        eq.set_band_gain(5, 12.0).unwrap();

        let len = 8_192;
        let bin_hz = sample_rate as f32 / len as f32;
        let probe_hz = 168.0 * bin_hz;
        let mut signal = sine_wave(probe_hz, sample_rate, 1, len * 2, 0.1);
        eq.process(&mut signal);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(len);
        let mut input = signal[len..].to_vec();
        let mut spectrum = fft.make_output_vec();
        fft.process(&mut input, &mut spectrum).unwrap();
        let magnitude = spectrum[168].norm() * 2.0 / len as f32;

        // ~1 kHz probe through a +12 dB peak at 1 kHz.
        assert!(magnitude > 0.1 * 3.5, "magnitude {}", magnitude);
        assert!(magnitude < 0.1 * 4.1, "magnitude {}", magnitude);
    }

    #[test]
    fn reset_clears_history_but_keeps_gains() {
        let mut eq = eq();
        eq.load_preset("vocal").unwrap();
        let mut samples = sine_wave(500.0, 48_000, 2, 256, 0.5);
        eq.process(&mut samples);
        eq.reset();
        assert_eq!(eq.gains(), preset("vocal").unwrap());

        let mut silence = vec![0.0; 64];
        eq.process(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));
    }
}
