//! Settings file plus command-line overrides for `wave play`.

use std::fs;
use std::path::Path;

use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use waveline_lib::dsp::DspSettings;
use waveline_lib::playback::PlayerConfig;

use crate::error::{CliError, Result};

/// Contents of a `--config` file. Both sections are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub player: PlayerConfig,
    pub dsp: DspSettings,
}

/// Values that only exist on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub volume: Option<f32>,
    pub speed: Option<f32>,
}

impl CliConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(json).map_err(|err| CliError::Config(err.to_string()))?;
        config.player = config.player.sanitized();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build the effective configuration for a `play` invocation.
    pub fn resolve(args: &ArgMatches) -> Result<(Self, Overrides)> {
        let mut config = match args.get_one::<std::path::PathBuf>("config") {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(ms) = args.get_one::<f32>("crossfade-ms") {
            config.player.crossfade_ms = ms.max(0.0);
        }
        if args.get_flag("no-gapless") {
            config.player.gapless = false;
        }
        if let Some(name) = args.get_one::<String>("preset") {
            config.dsp.equalizer.preset = Some(name.clone());
            config.dsp.equalizer.enabled = true;
        }
        if let Some(curve) = config.dsp.crossfade_curve {
            config.player.crossfade_curve = curve;
        }

        let overrides = Overrides {
            volume: args.get_one::<f32>("volume").copied(),
            speed: args.get_one::<f32>("speed").copied(),
        };
        if let Some(volume) = overrides.volume {
            config.player.initial_volume = volume.clamp(0.0, 1.0);
        }
        Ok((config, overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;
    use waveline_lib::dsp::effects::CrossfadeCurve;

    #[test]
    fn sections_are_optional() {
        let config = CliConfig::from_json(r#"{ "player": { "gapless": false } }"#).unwrap();
        assert!(!config.player.gapless);
        assert_eq!(config.dsp, DspSettings::default());
        assert_eq!(CliConfig::from_json("{}").unwrap(), CliConfig::default());
        assert!(matches!(
            CliConfig::from_json("{ \"player\": 3 }"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn command_line_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wave.json");
        fs::write(
            &path,
            r#"{ "player": { "crossfade_ms": 500 }, "dsp": { "crossfade_curve": "linear" } }"#,
        )
        .unwrap();

        let matches = build_cli()
            .try_get_matches_from([
                "wave",
                "play",
                "a.mp3",
                "--config",
                path.to_str().unwrap(),
                "--crossfade-ms",
                "1500",
                "--preset",
                "rock",
                "--volume",
                "0.3",
            ])
            .unwrap();
        let (_, play) = matches.subcommand().unwrap();
        let (config, overrides) = CliConfig::resolve(play).unwrap();
        assert_eq!(config.player.crossfade_ms, 1500.0);
        assert_eq!(config.player.crossfade_curve, CrossfadeCurve::Linear);
        assert_eq!(config.player.initial_volume, 0.3);
        assert_eq!(config.dsp.equalizer.preset.as_deref(), Some("rock"));
        assert_eq!(overrides.volume, Some(0.3));
        assert_eq!(overrides.speed, None);
    }
}
