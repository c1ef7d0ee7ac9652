//! Serializable snapshot of the DSP chain configuration.

use serde::{Deserialize, Serialize};

use super::effects::equalizer::BAND_COUNT;
use super::effects::level::deserialize_db;
use super::effects::{
    CrossfadeCurve, Effect, EffectChain, Equalizer, Limiter, LimiterSettings, ReplayGain,
    ReplayGainMode,
};
use super::DspError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerSettings {
    pub enabled: bool,
    /// Named preset, applied before `gains`.
    pub preset: Option<String>,
    #[serde(alias = "bands")]
    pub gains: Option<[f64; BAND_COUNT]>,
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: None,
            gains: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayGainSettings {
    pub enabled: bool,
    pub mode: ReplayGainMode,
    #[serde(alias = "preamp", deserialize_with = "deserialize_db")]
    pub preamp_db: f64,
}

impl Default for ReplayGainSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ReplayGainMode::Track,
            preamp_db: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterBlock {
    pub enabled: bool,
    #[serde(flatten)]
    pub settings: LimiterSettings,
}

impl Default for LimiterBlock {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: LimiterSettings::default(),
        }
    }
}

/// DSP configuration as read from a JSON config file.
///
/// ```json
/// {
///   "equalizer": { "preset": "rock" },
///   "replay_gain": { "mode": "album", "preamp": "-2db" },
///   "limiter": { "threshold": 0.9, "ratio": 8 },
///   "crossfade_curve": "equal_power"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DspSettings {
    pub enabled: bool,
    pub equalizer: EqualizerSettings,
    pub replay_gain: ReplayGainSettings,
    pub limiter: LimiterBlock,
    /// Overrides the player's crossfade curve when present.
    pub crossfade_curve: Option<CrossfadeCurve>,
}

impl Default for DspSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            equalizer: EqualizerSettings::default(),
            replay_gain: ReplayGainSettings::default(),
            limiter: LimiterBlock::default(),
            crossfade_curve: None,
        }
    }
}

impl DspSettings {
    /// Push these settings into the effects of `chain` that exist.
    ///
    /// An unknown preset fails before anything is changed.
    pub fn apply(&self, chain: &mut EffectChain) -> Result<(), DspError> {
        if let Some(name) = &self.equalizer.preset {
            if super::effects::equalizer::preset(name).is_none() {
                return Err(DspError::UnknownPreset(name.clone()));
            }
        }

        chain.set_enabled(self.enabled);

        if let Some(eq) = chain.get_mut::<Equalizer>() {
            eq.set_enabled(self.equalizer.enabled);
            if let Some(name) = &self.equalizer.preset {
                eq.load_preset(name)?;
            }
            if let Some(gains) = self.equalizer.gains {
                eq.set_gains(gains);
            }
        }

        if let Some(rg) = chain.get_mut::<ReplayGain>() {
            rg.set_enabled(self.replay_gain.enabled);
            rg.set_mode(self.replay_gain.mode);
            rg.set_preamp(self.replay_gain.preamp_db);
        }

        if let Some(limiter) = chain.get_mut::<Limiter>() {
            limiter.set_enabled(self.limiter.enabled);
            limiter.set_settings(self.limiter.settings);
        }

        Ok(())
    }

    /// Capture the current configuration of `chain`.
    pub fn from_chain(chain: &EffectChain) -> Self {
        let mut settings = Self {
            enabled: chain.is_enabled(),
            ..Self::default()
        };
        if let Some(eq) = chain.get::<Equalizer>() {
            settings.equalizer = EqualizerSettings {
                enabled: eq.is_enabled(),
                preset: eq.current_preset().map(str::to_string),
                gains: Some(eq.gains()),
            };
        }
        if let Some(rg) = chain.get::<ReplayGain>() {
            settings.replay_gain = ReplayGainSettings {
                enabled: rg.is_enabled(),
                mode: rg.mode(),
                preamp_db: rg.preamp(),
            };
        }
        if let Some(limiter) = chain.get::<Limiter>() {
            settings.limiter = LimiterBlock {
                enabled: limiter.is_enabled(),
                settings: limiter.settings(),
            };
        }
        settings
    }
}
