//! Configuration loading tests.
//!
//! Loads complete driver configurations from disk and checks defaults,
//! per-instance overrides and rejection of malformed input.

use pru_common::config::{ConfigError, PruConfig};
use pru_common::pins::{Connector, LogicalPin, PinKind};
use pru_common::unit::PruUnit;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("pru.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn full_example_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
prefix = "hpg"
firmware = "pru_generic.bin"
period_ns = 10000
pru = 1
event = 2
disabled = false
wait_gate = true
num_stepgens = 2
num_pwmgens = 1
num_encoders = 1

[[stepgen]]
step_pin = "P8.43"
dir_pin = "P8.44"
position_scale = 200.0

[[pwmgen]]
outputs = ["P8.45", "P8.46"]
period_ns = 1000000

[[encoder]]
channels = [{ a = "P8.39", b = "P8.40", index = "pru-in:P8.41" }]

[gpio]
inputs = ["P8.11", "P9.91"]
outputs = ["P8.12"]
"#,
    );

    let config = PruConfig::from_file(&path).unwrap();
    assert_eq!(config.prefix, "hpg");
    assert_eq!(config.pru, PruUnit::Pru1);
    assert_eq!(config.stepgen_count(), 2);
    assert_eq!(config.stepgen_config(0).position_scale, Some(200.0));
    assert_eq!(config.stepgen_config(1).step_pin, None);
    assert_eq!(config.pwmgen_config(0).period_ns, Some(1_000_000));

    let chan = &config.encoder_config(0).channels[0];
    assert_eq!(
        chan.index,
        Some(LogicalPin::header(PinKind::PruIn, Connector::P8, 41))
    );
    assert_eq!(
        config.gpio.inputs[1],
        LogicalPin::header(PinKind::Gpio, Connector::P9, 91)
    );
}

#[test]
fn empty_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let config = PruConfig::from_file(&path).unwrap();
    assert_eq!(config, PruConfig::default());
    assert!(!config.wait_gate);
    assert_eq!(config.event, None);
}

#[test]
fn unit_out_of_range_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pru = 2\n");

    assert!(matches!(
        PruConfig::from_file(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn undecodable_legacy_pin_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[[stepgen]]\nstep_pin = 555\n");

    assert!(matches!(
        PruConfig::from_file(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn too_many_instances_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "num_stepgens = 1000\n");

    assert!(matches!(
        PruConfig::from_file(&path),
        Err(ConfigError::ValidationError(_))
    ));
}
