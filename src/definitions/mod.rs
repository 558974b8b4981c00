// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequence definitions: the per-measurement acquisition table.
//!
//! - [`SequenceDefinitionSet`]: loosely typed set as produced by loaders
//! - [`SequenceDefinitions`]: validated, strongly typed form consumed by
//!   the assembler, holding one [`Measurement`] per index plus the shared
//!   [`ScanConstants`]
//!
//! Construction of [`SequenceDefinitions`] is where missing or mismatched
//! arrays are rejected, so assembly never starts on an incomplete table.

pub mod set;

pub use set::{DefinitionValue, FlagValue, InterPulseDelay, Metadata, SequenceDefinitionSet};

use tracing::debug;
use uuid::Uuid;

use crate::config::ScanConfig;
use crate::error::{Error, Result, ValidationError};

/// Offsets below this (ppm) are treated as spin-lock when `SLflag` is absent.
pub const SPIN_LOCK_OFFSET_THRESHOLD_PPM: f64 = 1e-3;

/// One row of the acquisition table.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Position in the acquisition order.
    pub index: usize,
    /// Excitation flip angle in degrees.
    pub excitation_fa_deg: f64,
    /// Saturation / spin-lock amplitude in uT.
    pub b1_ut: f64,
    /// Frequency offset in ppm.
    pub offset_ppm: f64,
    /// Saturation pulse duration in seconds.
    pub tp_s: f64,
    /// Inter-pulse delay in seconds.
    pub td_s: f64,
    /// Recovery time recorded for this row, in seconds.
    pub recovery_s: f64,
    /// Whether the saturation period is a spin-lock.
    pub is_spin_lock: bool,
    /// Pre/post spin-lock tip angle in degrees.
    pub spin_lock_tip_deg: f64,
}

/// Scalars shared by every measurement of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConstants {
    /// Main field in tesla.
    pub b0_t: f64,
    /// Gyromagnetic ratio in Hz/uT.
    pub gamma_hz: f64,
    /// Sub-pulses per saturation period.
    pub n_pulses: usize,
    /// Echo time in seconds.
    pub echo_time_s: f64,
    /// Unique sequence identifier.
    pub seq_id: String,
}

impl ScanConstants {
    /// Gyromagnetic ratio in rad/uT/s.
    pub fn gamma_rad(&self) -> f64 {
        self.gamma_hz * std::f64::consts::TAU
    }

    /// Convert an offset in ppm to Hz at this field strength.
    pub fn offset_hz(&self, offset_ppm: f64) -> f64 {
        offset_ppm * self.b0_t * self.gamma_hz
    }
}

/// Validated acquisition table.
#[derive(Debug, Clone)]
pub struct SequenceDefinitions {
    measurements: Vec<Measurement>,
    constants: ScanConstants,
    metadata: Metadata,
}

impl SequenceDefinitions {
    /// Validate a raw definition set.
    ///
    /// `scan` supplies the gyromagnetic ratio and echo time when the set does
    /// not carry them.
    ///
    /// # Errors
    ///
    /// - `num_meas` missing or zero
    /// - a required array missing or not `num_meas` long
    /// - `n_pulses`, `td` or `B0` missing or unusable
    pub fn from_set(set: SequenceDefinitionSet, scan: &ScanConfig) -> Result<Self> {
        let num_meas = set
            .num_meas
            .ok_or_else(|| ValidationError::MissingField("num_meas".into()))?;
        if num_meas == 0 {
            return Err(Error::Config("num_meas must be greater than 0".into()));
        }

        let exc_fa = required_array("excFA", set.exc_fa.as_deref(), num_meas)?;
        let b1_pa = required_array("B1pa", set.b1_pa.as_deref(), num_meas)?;
        let offsets_ppm = required_array("offsets_ppm", set.offsets_ppm.as_deref(), num_meas)?;
        let tp = required_array("tp", set.tp.as_deref(), num_meas)?;
        let trec = required_array("Trec", set.trec.as_deref(), num_meas)?;

        let n_pulses = set
            .n_pulses
            .ok_or_else(|| ValidationError::MissingField("n_pulses".into()))?;
        if n_pulses == 0 {
            return Err(ValidationError::Field {
                field: "n_pulses".into(),
                message: "must be greater than 0".into(),
            }
            .into());
        }

        let td = set
            .td
            .clone()
            .ok_or_else(|| ValidationError::MissingField("td".into()))?;
        if let InterPulseDelay::PerMeasurement(values) = &td {
            check_length("td", values.len(), num_meas)?;
        }

        let b0_t = set
            .b0
            .ok_or_else(|| ValidationError::MissingField("B0".into()))?;
        positive_scalar("B0", b0_t)?;

        let gamma_hz = set.gamma_hz.unwrap_or(scan.gamma_hz);
        positive_scalar("gamma_hz", gamma_hz)?;

        let echo_time_s = set.te.unwrap_or(scan.echo_time_s);
        if !(echo_time_s.is_finite() && echo_time_s >= 0.0) {
            return Err(ValidationError::Field {
                field: "te".into(),
                message: format!("must be non-negative, got {echo_time_s}"),
            }
            .into());
        }

        let sl_flag: Vec<bool> = match &set.sl_flag {
            Some(flags) => {
                check_length("SLflag", flags.len(), num_meas)?;
                flags.iter().map(FlagValue::is_set).collect()
            }
            None => {
                debug!("SLflag absent, deriving from offsets_ppm");
                offsets_ppm
                    .iter()
                    .map(|&ppm| ppm < SPIN_LOCK_OFFSET_THRESHOLD_PPM)
                    .collect()
            }
        };

        let sl_fa: Vec<f64> = match &set.sl_fa {
            Some(values) => {
                check_length("SLFA", values.len(), num_meas)?;
                values.clone()
            }
            None => exc_fa.to_vec(),
        };

        let measurements: Vec<Measurement> = (0..num_meas)
            .map(|i| Measurement {
                index: i,
                excitation_fa_deg: exc_fa[i],
                b1_ut: b1_pa[i],
                offset_ppm: offsets_ppm[i],
                tp_s: tp[i],
                td_s: td.at(i),
                recovery_s: trec[i],
                is_spin_lock: sl_flag[i],
                spin_lock_tip_deg: sl_fa[i],
            })
            .collect();

        let mut metadata = set.extra.clone();
        metadata.insert("num_meas".into(), DefinitionValue::Integer(num_meas as i64));
        metadata.insert("excFA".into(), DefinitionValue::Numbers(exc_fa.to_vec()));
        metadata.insert("B1pa".into(), DefinitionValue::Numbers(b1_pa.to_vec()));
        metadata.insert(
            "offsets_ppm".into(),
            DefinitionValue::Numbers(offsets_ppm.to_vec()),
        );
        metadata.insert("tp".into(), DefinitionValue::Numbers(tp.to_vec()));
        metadata.insert("Trec".into(), DefinitionValue::Numbers(trec.to_vec()));
        metadata.insert("n_pulses".into(), DefinitionValue::Integer(n_pulses as i64));
        metadata.insert(
            "td".into(),
            match &td {
                InterPulseDelay::Uniform(v) => DefinitionValue::Number(*v),
                InterPulseDelay::PerMeasurement(v) => DefinitionValue::Numbers(v.clone()),
            },
        );
        metadata.insert("B0".into(), DefinitionValue::Number(b0_t));
        metadata.insert("gamma_hz".into(), DefinitionValue::Number(gamma_hz));
        metadata.insert("te".into(), DefinitionValue::Number(echo_time_s));
        metadata.insert("SLflag".into(), DefinitionValue::Flags(sl_flag));
        metadata.insert("SLFA".into(), DefinitionValue::Numbers(sl_fa));

        let seq_id = match set.seq_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => derive_seq_id(&metadata)?,
        };
        metadata.insert("seq_id_string".into(), DefinitionValue::Text(seq_id.clone()));

        Ok(Self {
            measurements,
            constants: ScanConstants {
                b0_t,
                gamma_hz,
                n_pulses,
                echo_time_s,
                seq_id,
            },
            metadata,
        })
    }

    /// Measurements in acquisition order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Shared scan constants.
    pub fn constants(&self) -> &ScanConstants {
        &self.constants
    }

    /// Definitions echoed into the persisted protocol.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Always false for a validated table; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

fn required_array<'a>(
    field: &str,
    values: Option<&'a [f64]>,
    num_meas: usize,
) -> Result<&'a [f64]> {
    let values = values.ok_or_else(|| ValidationError::MissingField(field.into()))?;
    check_length(field, values.len(), num_meas)?;
    Ok(values)
}

fn check_length(field: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(ValidationError::LengthMismatch {
            field: field.into(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn positive_scalar(field: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ValidationError::Field {
            field: field.into(),
            message: format!("must be positive, got {value}"),
        }
        .into());
    }
    Ok(())
}

/// Name-based (v5) UUID over the echoed definitions, so identical tables
/// always receive the same identifier.
fn derive_seq_id(metadata: &Metadata) -> Result<String> {
    let bytes = serde_json::to_vec(metadata)?;
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, &bytes).to_string())
}
