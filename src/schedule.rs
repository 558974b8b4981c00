// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fingerprinting schedule files as read by the ParaVision method.
//!
//! The file is whitespace-separated text: a row count `N` followed by `N`
//! rows of seven numbers,
//!
//! ```text
//! tr_ms  sat_b1_uT  offset_ppm  exc_fa_deg  sat_dur_ms  sl_flag  sl_tip_deg
//! ```
//!
//! Values are range-checked exactly as the scanner does, so a schedule that
//! loads here also loads on the console. Offsets beyond
//! [`SCANNER_OFFSET_LIMIT_PPM`] are clipped to the limit, as on the console.

use std::path::Path;

use tracing::{debug, warn};

use crate::definitions::{FlagValue, InterPulseDelay, SequenceDefinitionSet};
use crate::error::{Result, ValidationError};

/// Offsets beyond this magnitude (ppm) are clipped to it.
pub const SCANNER_OFFSET_LIMIT_PPM: f64 = 100.0;

/// Smallest B1 used when deriving a spin-lock tip angle.
const MIN_TIP_B1_UT: f64 = 1e-5;

/// One schedule row in file units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleRow {
    pub tr_ms: f64,
    pub b1_ut: f64,
    pub offset_ppm: f64,
    pub exc_fa_deg: f64,
    pub sat_dur_ms: f64,
    pub spin_lock: bool,
    pub sl_tip_deg: f64,
}

/// Scalars a schedule file does not carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleParams {
    pub n_pulses: usize,
    pub td_s: f64,
    pub b0_t: f64,
}

/// A parsed fingerprinting schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct MrfSchedule {
    rows: Vec<ScheduleRow>,
}

impl MrfSchedule {
    /// Parse schedule text.
    ///
    /// Errors cite the 1-based row; row 0 is the count header.
    pub fn parse(content: &str) -> Result<Self> {
        let mut tokens = content.split_whitespace();

        let count: usize = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| schedule_error(0, "expected the number of rows".into()))?;

        let mut rows = Vec::with_capacity(count);
        for line in 1..=count {
            let mut values = [0.0f64; 7];
            for value in values.iter_mut() {
                *value = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| schedule_error(line, "expected 7 numeric values".into()))?;
            }
            rows.push(check_row(line, values)?);
        }

        if tokens.next().is_some() {
            warn!(rows = count, "Ignoring trailing values after the last schedule row");
        }

        debug!(rows = rows.len(), "Parsed MRF schedule");
        Ok(Self { rows })
    }

    /// Read and parse a schedule file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace zero tip angles of spin-lock rows with the effective-field
    /// angle `atan(B1 · γ / Δf)`, in degrees.
    pub fn with_auto_spin_lock_tip(mut self, b0_t: f64, gamma_hz: f64) -> Self {
        for row in self.rows.iter_mut().filter(|r| r.spin_lock && r.sl_tip_deg == 0.0) {
            let offset_hz = row.offset_ppm * b0_t * gamma_hz;
            row.sl_tip_deg = effective_field_tip_deg(row.b1_ut, gamma_hz, offset_hz);
        }
        self
    }

    /// Convert into a definition set; times go from ms to s.
    pub fn into_definition_set(self, params: &ScheduleParams) -> SequenceDefinitionSet {
        let col = |f: &dyn Fn(&ScheduleRow) -> f64| Some(column(&self.rows, f));

        SequenceDefinitionSet {
            num_meas: Some(self.rows.len()),
            exc_fa: col(&|r| r.exc_fa_deg),
            b1_pa: col(&|r| r.b1_ut),
            offsets_ppm: col(&|r| r.offset_ppm),
            tp: col(&|r| r.sat_dur_ms / 1000.0),
            trec: col(&|r| r.tr_ms / 1000.0),
            n_pulses: Some(params.n_pulses),
            td: Some(InterPulseDelay::Uniform(params.td_s)),
            b0: Some(params.b0_t),
            sl_flag: Some(
                self.rows
                    .iter()
                    .map(|r| FlagValue::Bool(r.spin_lock))
                    .collect(),
            ),
            sl_fa: col(&|r| r.sl_tip_deg),
            ..Default::default()
        }
    }
}

/// Tip angle aligning magnetization with the effective field, in degrees.
///
/// On resonance the effective field is B1 itself, giving 90°.
pub fn effective_field_tip_deg(b1_ut: f64, gamma_hz: f64, offset_hz: f64) -> f64 {
    if offset_hz == 0.0 {
        return 90.0;
    }
    (b1_ut.max(MIN_TIP_B1_UT) * gamma_hz / offset_hz)
        .atan()
        .to_degrees()
}

fn column(rows: &[ScheduleRow], f: &dyn Fn(&ScheduleRow) -> f64) -> Vec<f64> {
    rows.iter().map(f).collect()
}

fn check_row(line: usize, v: [f64; 7]) -> Result<ScheduleRow> {
    let [tr_ms, b1_ut, offset_ppm, exc_fa_deg, sat_dur_ms, sl, sl_tip_deg] = v;

    if !(tr_ms > 0.0) {
        return Err(schedule_error(line, format!("TR {tr_ms} ms must be positive")));
    }
    if !(b1_ut > -0.1 && b1_ut <= 50.0) {
        return Err(schedule_error(line, format!("B1 {b1_ut} uT is out of range (-0.1, 50]")));
    }
    if !(-2000.0..=2000.0).contains(&offset_ppm) {
        return Err(schedule_error(
            line,
            format!("offset {offset_ppm} ppm is out of range [-2000, 2000]"),
        ));
    }
    if !(exc_fa_deg > 1.0 && exc_fa_deg <= 90.0) {
        return Err(schedule_error(
            line,
            format!("flip angle {exc_fa_deg} deg is out of range (1, 90]"),
        ));
    }
    if !(sat_dur_ms > 0.0) {
        return Err(schedule_error(
            line,
            format!("saturation duration {sat_dur_ms} ms must be positive"),
        ));
    }
    let spin_lock = if sl == 0.0 {
        false
    } else if sl == 1.0 {
        true
    } else {
        return Err(schedule_error(line, format!("spin-lock flag {sl} must be 0 or 1")));
    };
    if !(-90.0..=90.0).contains(&sl_tip_deg) {
        return Err(schedule_error(
            line,
            format!("spin-lock tip {sl_tip_deg} deg is out of range [-90, 90]"),
        ));
    }
    let clamped_ppm = offset_ppm.clamp(-SCANNER_OFFSET_LIMIT_PPM, SCANNER_OFFSET_LIMIT_PPM);
    if clamped_ppm != offset_ppm {
        warn!(
            line,
            offset_ppm,
            clamped_ppm,
            "Offset exceeds the scanner's +/-100 ppm limit, clipping"
        );
    }

    Ok(ScheduleRow {
        tr_ms,
        b1_ut,
        offset_ppm: clamped_ppm,
        exc_fa_deg,
        sat_dur_ms,
        spin_lock,
        sl_tip_deg,
    })
}

fn schedule_error(line: usize, message: String) -> crate::error::Error {
    ValidationError::Schedule { line, message }.into()
}
