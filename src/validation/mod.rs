// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Physical-parameter validation for individual measurements.
//!
//! Each check names the measurement index and field so bad rows can be
//! located in the source table. A failure aborts the whole run.

use crate::definitions::Measurement;
use crate::error::{Result, ValidationError};

/// Validate the physical parameters of one measurement.
pub fn validate_measurement(m: &Measurement) -> Result<()> {
    finite(m.index, "excFA", m.excitation_fa_deg)?;
    finite(m.index, "B1pa", m.b1_ut)?;
    finite(m.index, "offsets_ppm", m.offset_ppm)?;
    finite(m.index, "SLFA", m.spin_lock_tip_deg)?;

    finite(m.index, "tp", m.tp_s)?;
    if m.tp_s <= 0.0 {
        return Err(ValidationError::Measurement {
            index: m.index,
            field: "tp".into(),
            message: format!("must be positive, got {}", m.tp_s),
        }
        .into());
    }

    non_negative_duration(m.index, "td", m.td_s)?;
    non_negative_duration(m.index, "Trec", m.recovery_s)?;

    Ok(())
}

/// Net recovery delay `trec - echo_time`, which must not be negative.
///
/// `index` is the measurement whose `Trec` entry is consumed.
pub fn net_recovery(index: usize, trec_s: f64, echo_time_s: f64) -> Result<f64> {
    let net = trec_s - echo_time_s;
    if net < 0.0 {
        return Err(ValidationError::Measurement {
            index,
            field: "Trec".into(),
            message: format!(
                "recovery time {} s is shorter than the echo time {} s",
                trec_s, echo_time_s
            ),
        }
        .into());
    }
    Ok(net)
}

/// Validate a derived flip angle (radians).
pub fn validate_flip_angle(index: usize, flip_angle_rad: f64) -> Result<()> {
    if !flip_angle_rad.is_finite() {
        return Err(ValidationError::Measurement {
            index,
            field: "B1pa".into(),
            message: format!("saturation flip angle is not finite ({flip_angle_rad} rad)"),
        }
        .into());
    }
    Ok(())
}

/// Validate a derived offset frequency (Hz) and the phase it accumulates
/// over the saturation period (radians).
pub fn validate_offset(index: usize, offset_hz: f64, phase_rad: f64) -> Result<()> {
    if !offset_hz.is_finite() {
        return Err(ValidationError::Measurement {
            index,
            field: "offsets_ppm".into(),
            message: format!("offset frequency is not finite ({offset_hz} Hz)"),
        }
        .into());
    }
    if !phase_rad.is_finite() {
        return Err(ValidationError::Measurement {
            index,
            field: "offsets_ppm".into(),
            message: format!("accumulated phase is not finite at {offset_hz} Hz"),
        }
        .into());
    }
    Ok(())
}

fn finite(index: usize, field: &str, value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(ValidationError::Measurement {
            index,
            field: field.into(),
            message: "is NaN".into(),
        }
        .into());
    }
    if value.is_infinite() {
        return Err(ValidationError::Measurement {
            index,
            field: field.into(),
            message: "is infinite".into(),
        }
        .into());
    }
    Ok(())
}

fn non_negative_duration(index: usize, field: &str, value: f64) -> Result<()> {
    finite(index, field, value)?;
    if value < 0.0 {
        return Err(ValidationError::Measurement {
            index,
            field: field.into(),
            message: format!("must be non-negative, got {value}"),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_utils::measurement;

    #[test]
    fn test_validate_measurement() {
        let m = measurement(3, 1.0, 2.0, true);
        assert!(validate_measurement(&m).is_ok());

        // Zero amplitude is a defined branch, not an error
        let zero = measurement(3, 0.0, 2.0, true);
        assert!(validate_measurement(&zero).is_ok());
    }

    #[test]
    fn test_rejects_negative_tp() {
        let mut m = measurement(7, 1.0, 0.0, true);
        m.tp_s = -0.01;
        let err = validate_measurement(&m).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Measurement { index: 7, ref field, .. })
                if field == "tp"
        ));
    }

    #[test]
    fn test_rejects_zero_tp() {
        let mut m = measurement(0, 1.0, 0.0, true);
        m.tp_s = 0.0;
        assert!(validate_measurement(&m).is_err());
    }

    #[test]
    fn test_rejects_negative_td() {
        let mut m = measurement(2, 1.0, 0.0, true);
        m.td_s = -1e-3;
        let err = validate_measurement(&m).unwrap_err();
        assert!(err.to_string().contains("'td'"));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let mut m = measurement(1, 1.0, 0.0, true);
        m.excitation_fa_deg = f64::NAN;
        let err = validate_measurement(&m).unwrap_err();
        assert!(err.to_string().contains("excFA"));
        assert!(err.to_string().contains("NaN"));

        let mut m = measurement(1, 1.0, 0.0, true);
        m.b1_ut = f64::INFINITY;
        let err = validate_measurement(&m).unwrap_err();
        assert!(err.to_string().contains("infinite"));
    }

    #[test]
    fn test_net_recovery() {
        assert!((net_recovery(0, 1.0, 0.02).unwrap() - 0.98).abs() < 1e-12);
        assert_eq!(net_recovery(0, 0.02, 0.02).unwrap(), 0.0);

        let err = net_recovery(4, 0.01, 0.02).unwrap_err();
        assert!(err.to_string().contains("Measurement 4"));
        assert!(err.to_string().contains("shorter than the echo time"));
    }

    #[test]
    fn test_validate_flip_angle() {
        assert!(validate_flip_angle(0, 1.2).is_ok());
        assert!(validate_flip_angle(0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_offset() {
        assert!(validate_offset(0, -1200.0, 1.5).is_ok());

        let err = validate_offset(5, f64::INFINITY, 0.0).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Measurement { index: 5, ref field, .. })
                if field == "offsets_ppm"
        ));

        let err = validate_offset(2, 1e300, f64::NAN).unwrap_err();
        assert!(err.to_string().contains("accumulated phase"));
    }
}
