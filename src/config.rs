// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the generator.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. cest-mrf.yaml file
//! 3. Environment variables (CESTMRF_*)
//! 4. CLI arguments

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Gyromagnetic ratio of 1H in Hz/uT.
pub const GAMMA_1H_HZ_PER_UT: f64 = 42.5764;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scan constants used when the definition set omits them
    #[serde(default)]
    pub scan: ScanConfig,

    /// Fixed pulse timings of the spin-lock and readout blocks
    #[serde(default)]
    pub pulses: PulseTimingConfig,

    /// Generation behaviour switches
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["cest-mrf.yaml", "cest-mrf.yml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("CESTMRF_GAMMA_HZ") {
            if let Ok(gamma) = val.parse() {
                self.scan.gamma_hz = gamma;
            }
        }
        if let Ok(val) = env::var("CESTMRF_ECHO_TIME") {
            if let Ok(te) = val.parse() {
                self.scan.echo_time_s = te;
            }
        }
        if let Ok(val) = env::var("CESTMRF_RECOVERY_INDEXING") {
            if let Ok(indexing) = val.parse() {
                self.generation.recovery_indexing = indexing;
            }
        }
        if let Ok(val) = env::var("CESTMRF_AUTO_SL_TIP") {
            self.generation.auto_spin_lock_tip = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("CESTMRF_OUTPUT_FORMAT") {
            if let Ok(format) = val.parse() {
                self.output.format = format;
            }
        }
        if let Ok(val) = env::var("CESTMRF_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("CESTMRF_LOG_FORMAT") {
            self.logging.format = val;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.scan.gamma_hz.is_finite() && self.scan.gamma_hz > 0.0) {
            return Err(Error::Config(format!(
                "scan.gamma_hz must be positive, got {}",
                self.scan.gamma_hz
            )));
        }
        if !(self.scan.echo_time_s.is_finite() && self.scan.echo_time_s >= 0.0) {
            return Err(Error::Config(format!(
                "scan.echo_time_s must be non-negative, got {}",
                self.scan.echo_time_s
            )));
        }

        let durations = [
            ("pulses.spin_lock_prep_duration_s", self.pulses.spin_lock_prep_duration_s),
            ("pulses.refocusing_duration_s", self.pulses.refocusing_duration_s),
            ("pulses.excitation_duration_s", self.pulses.excitation_duration_s),
            ("pulses.acquisition_duration_s", self.pulses.acquisition_duration_s),
            ("output.block_raster_s", self.output.block_raster_s),
            ("output.rf_raster_s", self.output.rf_raster_s),
            ("output.gradient_raster_s", self.output.gradient_raster_s),
            ("output.adc_raster_s", self.output.adc_raster_s),
        ];
        for (name, value) in durations {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if self.pulses.acquisition_samples == 0 {
            return Err(Error::Config(
                "pulses.acquisition_samples cannot be 0".into(),
            ));
        }
        if self.pulses.on_resonance_tolerance_hz < 0.0 {
            return Err(Error::Config(format!(
                "pulses.on_resonance_tolerance_hz must be non-negative, got {}",
                self.pulses.on_resonance_tolerance_hz
            )));
        }
        if self.generation.recovery_indexing == RecoveryIndexing::Current {
            tracing::warn!(
                "Recovery delays use the current measurement's Trec. Protocols written \
                 by earlier tooling paired each recovery with the previous Trec entry."
            );
        }
        Ok(())
    }
}

/// Scan constants with sensible 1H defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Gyromagnetic ratio in Hz/uT
    #[serde(default = "default_gamma_hz")]
    pub gamma_hz: f64,

    /// Echo time (readout placeholder duration) in seconds
    #[serde(default = "default_echo_time")]
    pub echo_time_s: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            gamma_hz: default_gamma_hz(),
            echo_time_s: default_echo_time(),
        }
    }
}

fn default_gamma_hz() -> f64 {
    GAMMA_1H_HZ_PER_UT
}

fn default_echo_time() -> f64 {
    20e-3
}

/// Fixed durations of the non-saturation pulses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseTimingConfig {
    /// Pre/post spin-lock tip pulse width in seconds
    #[serde(default = "default_prep_duration")]
    pub spin_lock_prep_duration_s: f64,

    /// Balanced spin-lock refocusing pulse width in seconds
    #[serde(default = "default_refocusing_duration")]
    pub refocusing_duration_s: f64,

    /// Excitation (imaging) pulse width in seconds
    #[serde(default = "default_excitation_duration")]
    pub excitation_duration_s: f64,

    /// Acquisition marker duration in seconds
    #[serde(default = "default_acquisition_duration")]
    pub acquisition_duration_s: f64,

    /// Samples in the acquisition marker
    #[serde(default = "default_acquisition_samples")]
    pub acquisition_samples: u32,

    /// Offsets with magnitude below this (Hz) count as on resonance
    #[serde(default = "default_on_resonance_tolerance")]
    pub on_resonance_tolerance_hz: f64,
}

impl Default for PulseTimingConfig {
    fn default() -> Self {
        Self {
            spin_lock_prep_duration_s: default_prep_duration(),
            refocusing_duration_s: default_refocusing_duration(),
            excitation_duration_s: default_excitation_duration(),
            acquisition_duration_s: default_acquisition_duration(),
            acquisition_samples: default_acquisition_samples(),
            on_resonance_tolerance_hz: default_on_resonance_tolerance(),
        }
    }
}

fn default_prep_duration() -> f64 {
    0.1e-3
}

fn default_refocusing_duration() -> f64 {
    0.2e-3
}

fn default_excitation_duration() -> f64 {
    2.1e-3
}

fn default_acquisition_duration() -> f64 {
    1e-3
}

fn default_acquisition_samples() -> u32 {
    1
}

fn default_on_resonance_tolerance() -> f64 {
    1e-3
}

/// Which recovery time entry precedes measurement `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryIndexing {
    /// `Trec[i - 1]`, as established protocols were written
    #[default]
    Previous,
    /// `Trec[i]`
    Current,
}

impl FromStr for RecoveryIndexing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "previous" => Ok(RecoveryIndexing::Previous),
            "current" => Ok(RecoveryIndexing::Current),
            other => Err(Error::Config(format!(
                "unknown recovery indexing '{other}' (expected previous or current)"
            ))),
        }
    }
}

/// Generation behaviour switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Recovery time indexing
    #[serde(default)]
    pub recovery_indexing: RecoveryIndexing,

    /// Derive spin-lock tip angles left at 0 in schedule files from B1 and offset
    #[serde(default)]
    pub auto_spin_lock_tip: bool,
}

/// Persisted protocol format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pulseq text format (.seq)
    #[default]
    Pulseq,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pulseq => "seq",
            OutputFormat::Json => "json",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "seq" => Some(OutputFormat::Pulseq),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pulseq => write!(f, "pulseq"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pulseq" | "seq" => Ok(OutputFormat::Pulseq),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Config(format!(
                "unknown output format '{other}' (expected pulseq or json)"
            ))),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format when the file extension does not decide it
    #[serde(default)]
    pub format: OutputFormat,

    /// Block duration raster in seconds
    #[serde(default = "default_block_raster")]
    pub block_raster_s: f64,

    /// RF raster in seconds
    #[serde(default = "default_rf_raster")]
    pub rf_raster_s: f64,

    /// Gradient raster in seconds
    #[serde(default = "default_gradient_raster")]
    pub gradient_raster_s: f64,

    /// ADC raster in seconds
    #[serde(default = "default_adc_raster")]
    pub adc_raster_s: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            block_raster_s: default_block_raster(),
            rf_raster_s: default_rf_raster(),
            gradient_raster_s: default_gradient_raster(),
            adc_raster_s: default_adc_raster(),
        }
    }
}

fn default_block_raster() -> f64 {
    10e-6
}

fn default_rf_raster() -> f64 {
    1e-6
}

fn default_gradient_raster() -> f64 {
    10e-6
}

fn default_adc_raster() -> f64 {
    100e-9
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
