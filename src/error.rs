// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for sequence generation.

use std::fmt;

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Generator error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Validation error
    Validation(ValidationError),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Validation errors.
///
/// Every variant carries enough context (field name, measurement index,
/// schedule row or block number) to locate the offending input.
#[derive(Debug)]
pub enum ValidationError {
    /// A required definition is absent
    MissingField(String),
    /// A per-measurement array does not have `num_meas` entries
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// Scalar field validation failed
    Field { field: String, message: String },
    /// Physical parameter of one measurement is unusable
    Measurement {
        index: usize,
        field: String,
        message: String,
    },
    /// Schedule file row could not be accepted (1-based row)
    Schedule { line: usize, message: String },
    /// Block duration is not an integer multiple of the block raster
    Raster {
        block: usize,
        duration_s: f64,
        raster_s: f64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(field) => {
                write!(f, "Missing required field '{}'", field)
            }
            ValidationError::LengthMismatch {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Field '{}' has {} entries, expected num_meas={}",
                    field, actual, expected
                )
            }
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::Measurement {
                index,
                field,
                message,
            } => {
                write!(f, "Measurement {} field '{}': {}", index, field, message)
            }
            ValidationError::Schedule { line, message } => {
                write!(f, "Schedule line {}: {}", line, message)
            }
            ValidationError::Raster {
                block,
                duration_s,
                raster_s,
            } => {
                write!(
                    f,
                    "Block {} duration {} s is not a multiple of the {} s block raster",
                    block, duration_s, raster_s
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}
