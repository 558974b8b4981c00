// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Block sequence generation.
//!
//! ```text
//! SequenceDefinitions
//!        │
//!        ▼
//! BlockSequenceAssembler ── per measurement ──► PhaseState::accumulate
//!        │                                      PulseScheme::select / emit
//!        ▼                                      emit_readout
//! GeneratedSequence (blocks + metadata)
//! ```

pub mod assembler;
pub mod block;
pub mod phase;
pub mod scheme;

pub use assembler::BlockSequenceAssembler;
pub use block::{Acquisition, Block, Delay, DelayRole, PulseRole, RfPulse, SequenceBlock};
pub use phase::PhaseState;
pub use scheme::PulseScheme;

use crate::definitions::{Metadata, ScanConstants};

/// Assembled sequence: ordered blocks plus the metadata to persist with them.
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct GeneratedSequence {
    blocks: Vec<SequenceBlock>,
    schemes: Vec<PulseScheme>,
    metadata: Metadata,
    constants: ScanConstants,
}

impl GeneratedSequence {
    pub(crate) fn new(
        blocks: Vec<SequenceBlock>,
        schemes: Vec<PulseScheme>,
        metadata: Metadata,
        constants: ScanConstants,
    ) -> Self {
        Self {
            blocks,
            schemes,
            metadata,
            constants,
        }
    }

    /// All blocks in execution order.
    pub fn blocks(&self) -> &[SequenceBlock] {
        &self.blocks
    }

    /// Scheme chosen for each measurement, by index.
    pub fn schemes(&self) -> &[PulseScheme] {
        &self.schemes
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn constants(&self) -> &ScanConstants {
        &self.constants
    }

    pub fn seq_id(&self) -> &str {
        &self.constants.seq_id
    }

    pub fn b0_t(&self) -> f64 {
        self.constants.b0_t
    }

    pub fn gamma_hz(&self) -> f64 {
        self.constants.gamma_hz
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn num_measurements(&self) -> usize {
        self.schemes.len()
    }

    /// Sum of all block durations in seconds.
    pub fn total_duration_s(&self) -> f64 {
        self.blocks.iter().map(|b| b.block.duration_s()).sum()
    }

    /// Number of RF pulse blocks.
    pub fn rf_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.block.is_rf()).count()
    }

    /// Blocks belonging to one measurement.
    ///
    /// Blocks are stored in measurement order, so this is a contiguous slice.
    pub fn measurement_blocks(&self, measurement: usize) -> &[SequenceBlock] {
        let start = self.blocks.partition_point(|b| b.measurement < measurement);
        let end = self.blocks.partition_point(|b| b.measurement <= measurement);
        &self.blocks[start..end]
    }
}
