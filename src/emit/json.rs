// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSON protocol writer.

use std::io::Write;

use serde::Serialize;

use super::SequenceEmitter;
use crate::config::OutputFormat;
use crate::definitions::Metadata;
use crate::error::Result;
use crate::sequence::{GeneratedSequence, PulseScheme, SequenceBlock};

/// Persisted JSON document.
#[derive(Debug, Serialize)]
pub struct ProtocolDocument<'a> {
    pub seq_id: &'a str,
    pub generator: String,
    pub b0_t: f64,
    pub gamma_hz: f64,
    pub total_duration_s: f64,
    pub num_measurements: usize,
    pub schemes: &'a [PulseScheme],
    pub metadata: &'a Metadata,
    pub blocks: &'a [SequenceBlock],
}

impl<'a> ProtocolDocument<'a> {
    pub fn new(sequence: &'a GeneratedSequence) -> Self {
        Self {
            seq_id: sequence.seq_id(),
            generator: format!("cest-mrf-seq {}", crate::VERSION),
            b0_t: sequence.b0_t(),
            gamma_hz: sequence.gamma_hz(),
            total_duration_s: sequence.total_duration_s(),
            num_measurements: sequence.num_measurements(),
            schemes: sequence.schemes(),
            metadata: sequence.metadata(),
            blocks: sequence.blocks(),
        }
    }
}

/// Pretty-printed JSON emitter.
#[derive(Debug, Clone, Default)]
pub struct JsonEmitter;

impl JsonEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl SequenceEmitter for JsonEmitter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn write(&self, sequence: &GeneratedSequence, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, &ProtocolDocument::new(sequence))?;
        writeln!(out)?;
        Ok(())
    }
}
