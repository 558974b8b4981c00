// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persisting a [`GeneratedSequence`].
//!
//! Two emitters are provided:
//!
//! - [`PulseqEmitter`]: Pulseq 1.4.1 text, readable by scanner interpreters
//!   and Bloch simulators
//! - [`JsonEmitter`]: kind-tagged blocks plus metadata as pretty JSON
//!
//! Emitters render into memory first, so a failed emission never leaves a
//! truncated file behind.

pub mod json;
pub mod pulseq;

pub use json::JsonEmitter;
pub use pulseq::PulseqEmitter;

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::sequence::GeneratedSequence;

/// Serializes an assembled sequence.
pub trait SequenceEmitter {
    /// Format written by this emitter.
    fn format(&self) -> OutputFormat;

    /// Write the whole protocol to `out`.
    fn write(&self, sequence: &GeneratedSequence, out: &mut dyn Write) -> Result<()>;

    /// Render to memory, then write the file in one step.
    fn emit_to_path(&self, sequence: &GeneratedSequence, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        self.write(sequence, &mut buffer)?;
        std::fs::write(path, &buffer)?;
        info!(
            path = %path.display(),
            format = %self.format(),
            bytes = buffer.len(),
            blocks = sequence.len(),
            "Wrote protocol"
        );
        Ok(())
    }
}

/// Emitter for `format` using the rasters in `output`.
pub fn emitter_for(format: OutputFormat, output: &OutputConfig) -> Box<dyn SequenceEmitter> {
    match format {
        OutputFormat::Pulseq => Box::new(PulseqEmitter::new(output.clone())),
        OutputFormat::Json => Box::new(JsonEmitter::new()),
    }
}
