use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::json;
use voice_volume::AppConfig;

fn run_cli(args: &[&str], config: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_voice_volume"))
        .args(args)
        .arg("--config")
        .arg(config)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run voice_volume")
}

#[test]
fn simulate_prints_level_lines() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("voice_volume.json");

    let output = run_cli(&["simulate", "--seconds", "1", "--pattern", "tone"], &config);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|line| line.starts_with("Intensity:"))
        .unwrap_or_else(|| panic!("no level line in {stdout:?}"));
    assert!(line.contains(" dB, Volume: "));
    assert!(line.ends_with('%'));
    // simulate never writes the config
    assert!(!config.exists());
}

#[test]
fn synthetic_calibration_saves_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("voice_volume.json");
    let seed = json!({
        "calibration": { "duration_secs": 1.0, "required_samples": 5 },
        "mapping": { "sensitivity": 1.5 },
        "logging": { "ansi": false }
    });
    fs::write(&config, seed.to_string()).unwrap();

    let output = run_cli(&["calibrate", "--source", "synthetic"], &config);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Calibrating: "));
    assert!(stdout.contains("Noise floor"));

    let saved = AppConfig::try_load(&config).unwrap();
    assert_eq!(saved.mapping.sensitivity, 1.5);
    assert_eq!(saved.calibration.required_samples, 5);
    assert!(saved.mapping.noise_floor > 0.0);
    assert!(saved.mapping.noise_floor <= saved.mapping.min_intensity);
    assert!(saved.mapping.min_intensity <= saved.mapping.max_intensity);
}

#[test]
fn unknown_subcommand_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_cli(&["dance"], &dir.path().join("unused.json"));
    assert!(!output.status.success());
}
