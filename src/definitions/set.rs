// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! The definition set as it arrives from an external loader.
//!
//! Field names follow the keys used by the acquisition tooling (`excFA`,
//! `B1pa`, `Trec`, ...). Every field is optional here; presence and length
//! are enforced when the set is turned into [`SequenceDefinitions`].
//!
//! [`SequenceDefinitions`]: super::SequenceDefinitions

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata echoed into the persisted protocol, keyed by definition name.
pub type Metadata = BTreeMap<String, DefinitionValue>;

/// A single echoed definition value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefinitionValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Flags(Vec<bool>),
    Numbers(Vec<f64>),
}

impl fmt::Display for DefinitionValue {
    /// Space-separated rendering used by the Pulseq `[DEFINITIONS]` section.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            DefinitionValue::Integer(i) => write!(f, "{i}"),
            DefinitionValue::Number(x) => write!(f, "{x}"),
            DefinitionValue::Text(s) => write!(f, "{s}"),
            DefinitionValue::Flags(flags) => {
                let parts: Vec<String> = flags.iter().map(|b| u8::from(*b).to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            DefinitionValue::Numbers(values) => {
                let parts: Vec<String> = values.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

/// Spin-lock flag as stored by loaders: either a boolean or 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
}

impl FlagValue {
    pub fn is_set(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Number(x) => *x != 0.0,
        }
    }
}

/// Inter-pulse delay: one value for the whole run or one per measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterPulseDelay {
    Uniform(f64),
    PerMeasurement(Vec<f64>),
}

impl InterPulseDelay {
    /// Delay used for measurement `index`.
    ///
    /// Callers check the per-measurement length beforehand.
    pub fn at(&self, index: usize) -> f64 {
        match self {
            InterPulseDelay::Uniform(td) => *td,
            InterPulseDelay::PerMeasurement(values) => values[index],
        }
    }
}

/// Raw sequence definitions, one array entry per measurement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceDefinitionSet {
    /// Number of measurements
    pub num_meas: Option<usize>,

    /// Excitation flip angles in degrees
    #[serde(rename = "excFA")]
    pub exc_fa: Option<Vec<f64>>,

    /// Saturation / spin-lock B1 amplitudes in uT
    #[serde(rename = "B1pa")]
    pub b1_pa: Option<Vec<f64>>,

    /// Frequency offsets in ppm
    pub offsets_ppm: Option<Vec<f64>>,

    /// Saturation pulse durations in seconds
    pub tp: Option<Vec<f64>>,

    /// Recovery times in seconds
    #[serde(rename = "Trec")]
    pub trec: Option<Vec<f64>>,

    /// Sub-pulses per saturation period
    pub n_pulses: Option<usize>,

    /// Inter-pulse delay in seconds
    pub td: Option<InterPulseDelay>,

    /// Main field strength in tesla
    #[serde(rename = "B0")]
    pub b0: Option<f64>,

    /// Gyromagnetic ratio in Hz/uT
    pub gamma_hz: Option<f64>,

    /// Echo time in seconds
    pub te: Option<f64>,

    /// Spin-lock flags
    #[serde(rename = "SLflag")]
    pub sl_flag: Option<Vec<FlagValue>>,

    /// Spin-lock tip angles in degrees
    #[serde(rename = "SLFA")]
    pub sl_fa: Option<Vec<f64>>,

    /// Unique sequence identifier
    #[serde(rename = "seq_id_string")]
    pub seq_id: Option<String>,

    /// Any other definitions, echoed verbatim
    #[serde(flatten)]
    pub extra: Metadata,
}

impl SequenceDefinitionSet {
    /// Parse a definition set from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a definition set from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a definition set, choosing the parser from the file extension.
    ///
    /// `.json` files go through serde_json; anything else is read as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }
}
