// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement-by-measurement block assembly.
//!
//! For every measurement, in order:
//!
//! 1. recovery delay (skipped for the first measurement)
//! 2. saturation period chosen by [`PulseScheme::select`]
//! 3. excitation pulse, imaging delay and acquisition marker
//!
//! Blocks of one measurement are collected in a scratch buffer and only
//! appended once the measurement is complete, so the output never holds a
//! partially emitted measurement and an error leaves no sequence behind.

use tracing::{debug, info, warn};

use super::block::{Block, DelayRole, SequenceBlock};
use super::phase::PhaseState;
use super::scheme::{emit_readout, PulseScheme, SaturationContext};
use super::GeneratedSequence;
use crate::config::{Config, PulseTimingConfig, RecoveryIndexing};
use crate::definitions::{Measurement, SequenceDefinitions};
use crate::error::Result;
use crate::validation::{
    net_recovery, validate_flip_angle, validate_measurement, validate_offset,
};

/// Builds a [`GeneratedSequence`] from validated definitions.
#[derive(Debug, Clone, Default)]
pub struct BlockSequenceAssembler {
    timing: PulseTimingConfig,
    recovery_indexing: RecoveryIndexing,
}

impl BlockSequenceAssembler {
    pub fn new(timing: PulseTimingConfig, recovery_indexing: RecoveryIndexing) -> Self {
        Self {
            timing,
            recovery_indexing,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pulses.clone(), config.generation.recovery_indexing)
    }

    /// Assemble the full block sequence.
    ///
    /// # Errors
    ///
    /// Any physical-parameter error in any measurement aborts the run; no
    /// partial sequence is returned.
    pub fn assemble(&self, defs: &SequenceDefinitions) -> Result<GeneratedSequence> {
        let constants = defs.constants();
        let measurements = defs.measurements();

        let mut blocks: Vec<SequenceBlock> = Vec::new();
        let mut schemes = Vec::with_capacity(measurements.len());
        let mut scratch: Vec<Block> = Vec::new();

        for m in measurements {
            validate_measurement(m)?;
            scratch.clear();

            let recovery = self.recovery_before(measurements, m, constants.echo_time_s)?;
            if let Some(recovery_s) = recovery {
                scratch.push(Block::delay(DelayRole::Recovery, recovery_s));
            }

            let offset_hz = constants.offset_hz(m.offset_ppm);
            let fa_sat_rad = m.b1_ut * constants.gamma_rad() * m.tp_s;
            validate_flip_angle(m.index, fa_sat_rad)?;

            let phase = PhaseState::accumulate(offset_hz, m.tp_s);
            validate_offset(m.index, offset_hz, phase.radians())?;
            let scheme =
                PulseScheme::select(m, offset_hz, self.timing.on_resonance_tolerance_hz);

            if scheme == PulseScheme::DelayOnly && m.is_spin_lock {
                warn!(
                    measurement = m.index,
                    "Spin-lock measurement has zero B1, emitting delays only"
                );
            }

            debug!(
                measurement = m.index,
                scheme = ?scheme,
                offset_hz,
                fa_sat_rad,
                accumulated_phase = phase.radians(),
                "Emitting measurement"
            );

            let ctx = SaturationContext {
                measurement: m,
                offset_hz,
                fa_sat_rad,
                phase,
                n_pulses: constants.n_pulses,
                timing: &self.timing,
            };
            scheme.emit(&ctx, &mut scratch);
            emit_readout(m, constants.echo_time_s, &self.timing, &mut scratch);

            blocks.extend(scratch.drain(..).map(|block| SequenceBlock {
                measurement: m.index,
                block,
            }));
            schemes.push(scheme);
        }

        let sequence =
            GeneratedSequence::new(blocks, schemes, defs.metadata().clone(), constants.clone());

        info!(
            seq_id = %sequence.seq_id(),
            measurements = sequence.num_measurements(),
            blocks = sequence.len(),
            total_duration_s = sequence.total_duration_s(),
            "Assembled block sequence"
        );

        Ok(sequence)
    }

    /// Net recovery delay preceding `m`, or `None` for the first measurement.
    fn recovery_before(
        &self,
        measurements: &[Measurement],
        m: &Measurement,
        echo_time_s: f64,
    ) -> Result<Option<f64>> {
        if m.index == 0 {
            return Ok(None);
        }
        let source = match self.recovery_indexing {
            RecoveryIndexing::Previous => &measurements[m.index - 1],
            RecoveryIndexing::Current => m,
        };
        net_recovery(source.index, source.recovery_s, echo_time_s).map(Some)
    }
}
