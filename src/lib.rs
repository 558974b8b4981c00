// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! CEST-MRF saturation / spin-lock sequence generator
//!
//! This crate turns a per-measurement acquisition table into an ordered,
//! time-accurate list of RF pulse, delay and acquisition blocks, and writes
//! it as a Pulseq or JSON protocol for scanners and Bloch simulators.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ definitions (YAML /  │   │ schedule (ParaVision │
//! │ JSON)                │   │ MRF text file)       │
//! └──────────┬───────────┘   └──────────┬───────────┘
//!            └────────────┬─────────────┘
//!                         ▼
//!              SequenceDefinitions (validated)
//!                         │
//!                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │ BlockSequenceAssembler                          │
//! │   PhaseState · PulseScheme · readout tail       │
//! └───────────────────────┬─────────────────────────┘
//!                         ▼
//!                 GeneratedSequence
//!                         │
//!            ┌────────────┴────────────┐
//!            ▼                         ▼
//!      PulseqEmitter              JsonEmitter
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`definitions`]: Definition sets and their validated form
//! - [`schedule`]: ParaVision fingerprinting schedule files
//! - [`sequence`]: Phase accumulation, scheme selection and block assembly
//! - [`emit`]: Pulseq and JSON protocol writers
//! - [`dictionary`]: Contracts for dictionary simulation and matching
//! - [`validation`]: Per-measurement physical checks
//! - [`error`]: Error types

pub mod config;
pub mod definitions;
pub mod dictionary;
pub mod emit;
pub mod error;
pub mod schedule;
pub mod sequence;
pub mod validation;

pub use config::Config;
pub use definitions::{SequenceDefinitionSet, SequenceDefinitions};
pub use emit::SequenceEmitter;
pub use error::{Error, Result};
pub use sequence::{BlockSequenceAssembler, GeneratedSequence};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
