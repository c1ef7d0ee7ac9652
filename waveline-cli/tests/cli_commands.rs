use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn wave() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("wave"))
}

/// One second of 16-bit stereo silence at 8 kHz.
fn silent_wav() -> Vec<u8> {
    let sample_rate: u32 = 8_000;
    let channels: u16 = 2;
    let data_len: u32 = sample_rate * channels as u32 * 2;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    bytes.extend_from_slice(&(channels * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);
    bytes
}

#[test]
fn presets_prints_json() {
    wave()
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("bands_hz"))
        .stdout(predicate::str::contains("bass_boost"));
}

#[test]
fn formats_lists_extensions() {
    wave()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("mp3"))
        .stdout(predicate::str::contains("wav"));
}

#[test]
fn probe_reports_format() {
    let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    file.write_all(&silent_wav()).unwrap();
    file.flush().unwrap();

    wave()
        .arg("probe")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sample_rate\": 8000"))
        .stdout(predicate::str::contains("\"channels\": 2"));
}

#[test]
fn probe_rejects_unknown_extension() {
    let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
    wave()
        .arg("probe")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn missing_command_prints_help() {
    wave().assert().failure();
}
