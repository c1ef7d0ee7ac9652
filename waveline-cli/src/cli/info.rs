//! Non-playback commands: `probe`, `presets` and `formats`.

use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use serde::Serialize;
use waveline_lib::decoder::{AudioFormat, DecoderRegistry, Metadata};
use waveline_lib::dsp::effects::equalizer::{preset, preset_names, BAND_FREQUENCIES_HZ};

use crate::error::Result;

#[derive(Debug, Serialize)]
struct ProbeReport<'a> {
    path: String,
    format: AudioFormat,
    duration_seconds: f64,
    frames: u64,
    metadata: &'a Metadata,
}

#[derive(Debug, Serialize)]
struct PresetReport {
    bands_hz: Vec<f64>,
    presets: BTreeMap<String, Vec<f64>>,
}

/// Open `path` and print what the decoder reports.
pub fn run_probe(registry: &DecoderRegistry, path: &Path) -> Result<i32> {
    let mut decoder = registry.open_path(path)?;
    let metadata = decoder.metadata().clone();
    let report = ProbeReport {
        path: path.display().to_string(),
        format: decoder.format(),
        duration_seconds: decoder.duration().as_secs_f64(),
        frames: decoder.sample_count(),
        metadata: &metadata,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    decoder.close();
    info!("probed {}", path.display());
    Ok(0)
}

pub fn run_presets() -> Result<i32> {
    println!("{}", presets_json()?);
    Ok(0)
}

pub fn presets_json() -> Result<String> {
    let presets = preset_names()
        .into_iter()
        .filter_map(|name| preset(name).map(|gains| (name.to_string(), gains.to_vec())))
        .collect();
    let report = PresetReport {
        bands_hz: BAND_FREQUENCIES_HZ.to_vec(),
        presets,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn run_formats(registry: &DecoderRegistry) -> Result<i32> {
    for extension in registry.supported_formats() {
        println!("{}", extension);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_json_lists_every_preset() {
        let json: serde_json::Value = serde_json::from_str(&presets_json().unwrap()).unwrap();
        let presets = json["presets"].as_object().unwrap();
        assert_eq!(presets.len(), preset_names().len());
        assert_eq!(presets["flat"].as_array().unwrap().len(), 10);
        assert_eq!(json["bands_hz"][5], 1000.0);
    }
}
