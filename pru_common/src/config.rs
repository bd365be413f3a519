//! Configuration loading traits and types.
//!
//! The driver is configured once at bring-up from a TOML file, optionally
//! overridden from the command line.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pru_common::config::{ConfigError, PruConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = PruConfig::from_file(Path::new("pru.toml"))?;
//!     println!("{} step generators", config.stepgen_count());
//!     Ok(())
//! }
//! ```
//!
//! # TOML Example
//!
//! ```toml
//! prefix = "hpg"
//! period_ns = 10000
//! pru = 1
//! num_stepgens = 2
//!
//! [[stepgen]]
//! step_pin = "P8.43"
//! dir_pin = "P8.44"
//!
//! [[encoder]]
//! channels = [{ a = "P8.39", b = "P8.40" }]
//!
//! [gpio]
//! inputs = ["P8.11", "P9.91"]
//! ```

use crate::consts::{
    DEFAULT_FIRMWARE, DEFAULT_PERIOD_NS, DEFAULT_PREFIX, DEFAULT_SERVO_PERIOD_NS,
    MAX_ENCODER_CHANNELS, MAX_EVENT, MAX_INSTANCES, MAX_PWM_OUTPUTS,
};
use crate::pins::LogicalPin;
use crate::unit::PruUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Step generator instance overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepgenConfig {
    /// Step output pin. Unset uses the internal default pin.
    pub step_pin: Option<LogicalPin>,
    /// Direction output pin. Unset uses the internal default pin.
    pub dir_pin: Option<LogicalPin>,
    /// Initial steps per position unit.
    pub position_scale: Option<f64>,
    /// Initial velocity limit in position units per second (0 = none).
    pub maxvel: Option<f64>,
    /// Initial acceleration limit in position units per second squared.
    pub maxaccel: Option<f64>,
    /// Initial step pulse length in ns.
    pub steplen_ns: Option<u32>,
    /// Initial minimum step space in ns.
    pub stepspace_ns: Option<u32>,
    /// Initial direction setup time in ns.
    pub dirsetup_ns: Option<u32>,
    /// Initial direction hold time in ns.
    pub dirhold_ns: Option<u32>,
}

/// PWM generator instance overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PwmgenConfig {
    /// Number of outputs; defaults to the number of listed pins, at least 1.
    pub num_outputs: Option<usize>,
    /// Output pins in order. Outputs past the end use the default pin.
    pub outputs: Vec<LogicalPin>,
    /// Initial PWM period in ns.
    pub period_ns: Option<u32>,
}

impl PwmgenConfig {
    /// Effective output count.
    pub fn output_count(&self) -> usize {
        self.num_outputs.unwrap_or(self.outputs.len().max(1))
    }
}

/// Delta-sigma modulator instance overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeltasigConfig {
    /// Output 1 pin. Unset uses the internal default pin.
    pub pin1: Option<LogicalPin>,
    /// Output 2 pin. Unset uses the internal default pin.
    pub pin2: Option<LogicalPin>,
}

/// One encoder channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderChannelConfig {
    /// A phase input.
    pub a: Option<LogicalPin>,
    /// B phase input.
    pub b: Option<LogicalPin>,
    /// Index input.
    pub index: Option<LogicalPin>,
    /// Initial counts per position unit.
    pub scale: Option<f64>,
}

/// Encoder instance overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Number of channels; defaults to the number of listed channels, at least 1.
    pub num_channels: Option<usize>,
    /// Channel pins in order.
    pub channels: Vec<EncoderChannelConfig>,
}

impl EncoderConfig {
    /// Effective channel count.
    pub fn channel_count(&self) -> usize {
        self.num_channels.unwrap_or(self.channels.len().max(1))
    }
}

/// Header pins exported as plain GPIO signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    /// Input pins.
    pub inputs: Vec<LogicalPin>,
    /// Output pins.
    pub outputs: Vec<LogicalPin>,
}

impl GpioConfig {
    /// True when no GPIO pin is configured.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PruConfig {
    /// Logging verbosity level.
    pub log_level: LogLevel,
    /// Prefix of every exported signal and function name.
    pub prefix: String,
    /// Firmware image; searched in the fallback directory when not found.
    pub firmware: PathBuf,
    /// Control period in ns, written to the statics block.
    pub period_ns: u32,
    /// Period of the host capture/update cycle in ns.
    pub servo_period_ns: u32,
    /// PRU core to run on.
    pub pru: PruUnit,
    /// UIO event channel to listen on. Unset disables the listener.
    pub event: Option<u8>,
    /// Lay out memory but leave the PRU halted.
    pub disabled: bool,
    /// Append a busy-wait gate after all other tasks.
    pub wait_gate: bool,
    /// Busy indicator pin of the wait gate.
    pub busy_pin: Option<LogicalPin>,
    /// Number of step generators; defaults to the `[[stepgen]]` entry count.
    pub num_stepgens: Option<usize>,
    /// Number of PWM generators; defaults to the `[[pwmgen]]` entry count.
    pub num_pwmgens: Option<usize>,
    /// Number of encoders; defaults to the `[[encoder]]` entry count.
    pub num_encoders: Option<usize>,
    /// Number of delta-sigma modulators; defaults to the `[[deltasig]]`
    /// entry count.
    pub num_deltasigs: Option<usize>,
    /// Step generator overrides, by instance.
    pub stepgen: Vec<StepgenConfig>,
    /// PWM generator overrides, by instance.
    pub pwmgen: Vec<PwmgenConfig>,
    /// Encoder overrides, by instance.
    pub encoder: Vec<EncoderConfig>,
    /// Delta-sigma modulator overrides, by instance.
    pub deltasig: Vec<DeltasigConfig>,
    /// Plain GPIO pins.
    pub gpio: GpioConfig,
}

impl Default for PruConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            firmware: PathBuf::from(DEFAULT_FIRMWARE),
            period_ns: DEFAULT_PERIOD_NS,
            servo_period_ns: DEFAULT_SERVO_PERIOD_NS,
            pru: PruUnit::default(),
            event: None,
            disabled: false,
            wait_gate: false,
            busy_pin: None,
            num_stepgens: None,
            num_pwmgens: None,
            num_encoders: None,
            num_deltasigs: None,
            stepgen: Vec::new(),
            pwmgen: Vec::new(),
            encoder: Vec::new(),
            deltasig: Vec::new(),
            gpio: GpioConfig::default(),
        }
    }
}

impl PruConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Any loading error, or `ConfigError::ValidationError`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective number of step generators.
    pub fn stepgen_count(&self) -> usize {
        self.num_stepgens.unwrap_or(self.stepgen.len())
    }

    /// Effective number of PWM generators.
    pub fn pwmgen_count(&self) -> usize {
        self.num_pwmgens.unwrap_or(self.pwmgen.len())
    }

    /// Effective number of encoders.
    pub fn encoder_count(&self) -> usize {
        self.num_encoders.unwrap_or(self.encoder.len())
    }

    /// Effective number of delta-sigma modulators.
    pub fn deltasig_count(&self) -> usize {
        self.num_deltasigs.unwrap_or(self.deltasig.len())
    }

    /// Overrides for step generator `index`.
    pub fn stepgen_config(&self, index: usize) -> StepgenConfig {
        self.stepgen.get(index).cloned().unwrap_or_default()
    }

    /// Overrides for PWM generator `index`.
    pub fn pwmgen_config(&self, index: usize) -> PwmgenConfig {
        self.pwmgen.get(index).cloned().unwrap_or_default()
    }

    /// Overrides for encoder `index`.
    pub fn encoder_config(&self, index: usize) -> EncoderConfig {
        self.encoder.get(index).cloned().unwrap_or_default()
    }

    /// Overrides for delta-sigma modulator `index`.
    pub fn deltasig_config(&self, index: usize) -> DeltasigConfig {
        self.deltasig.get(index).cloned().unwrap_or_default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `prefix` is empty or contains whitespace
    /// - `firmware` is empty
    /// - `period_ns` or `servo_period_ns` is zero
    /// - `event` is above the highest routed channel
    /// - an instance count exceeds its limit or its override list
    /// - a PWM generator or encoder has zero or too many outputs/channels
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() || self.prefix.chars().any(char::is_whitespace) {
            return Err(validation(format!(
                "prefix '{}' must be non-empty and without whitespace",
                self.prefix
            )));
        }
        if self.firmware.as_os_str().is_empty() {
            return Err(validation("firmware cannot be empty".to_string()));
        }
        if self.period_ns == 0 || self.servo_period_ns == 0 {
            return Err(validation(
                "period_ns and servo_period_ns must be positive".to_string(),
            ));
        }
        if let Some(event) = self.event.filter(|e| *e > MAX_EVENT) {
            return Err(validation(format!(
                "event {event} out of range 0..={MAX_EVENT}"
            )));
        }

        check_count("stepgen", self.stepgen_count(), self.stepgen.len())?;
        check_count("pwmgen", self.pwmgen_count(), self.pwmgen.len())?;
        check_count("encoder", self.encoder_count(), self.encoder.len())?;
        check_count("deltasig", self.deltasig_count(), self.deltasig.len())?;

        for (i, pwm) in self.pwmgen.iter().enumerate() {
            let n = pwm.output_count();
            if n == 0 || n > MAX_PWM_OUTPUTS {
                return Err(validation(format!(
                    "pwmgen {i}: output count {n} out of range 1..={MAX_PWM_OUTPUTS}"
                )));
            }
            if pwm.outputs.len() > n {
                return Err(validation(format!(
                    "pwmgen {i}: {} pins listed for {n} outputs",
                    pwm.outputs.len()
                )));
            }
            if pwm.period_ns == Some(0) {
                return Err(validation(format!("pwmgen {i}: period_ns must be positive")));
            }
        }
        for (i, enc) in self.encoder.iter().enumerate() {
            let n = enc.channel_count();
            if n == 0 || n > MAX_ENCODER_CHANNELS {
                return Err(validation(format!(
                    "encoder {i}: channel count {n} out of range 1..={MAX_ENCODER_CHANNELS}"
                )));
            }
            if enc.channels.len() > n {
                return Err(validation(format!(
                    "encoder {i}: {} channels listed for {n} channels",
                    enc.channels.len()
                )));
            }
        }
        Ok(())
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}

fn check_count(kind: &str, count: usize, listed: usize) -> Result<(), ConfigError> {
    if count > MAX_INSTANCES {
        return Err(validation(format!(
            "{kind} count {count} exceeds limit {MAX_INSTANCES}"
        )));
    }
    if listed > count {
        return Err(validation(format!(
            "{listed} [[{kind}]] entries listed for {count} instances"
        )));
    }
    Ok(())
}
