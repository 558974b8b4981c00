// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-measurement pulse scheme selection and emission.
//!
//! [`PulseScheme::select`] looks at one measurement and picks exactly one
//! variant; [`PulseScheme::emit`] writes that variant's saturation period.
//! The readout tail shared by every variant is written by [`emit_readout`].
//!
//! | Variant | When | Saturation period |
//! |---------|------|-------------------|
//! | `DelayOnly` | B1 == 0 | `tp` delays, no RF |
//! | `Balanced` | spin-lock, \|Δf\| < tolerance | pre, 5-segment trains, post |
//! | `Regular` | spin-lock, off resonance | pre, full-length locks, post |
//! | `PlainSaturation` | not spin-lock | full-length saturation pulses |

use std::f64::consts::{FRAC_PI_2, PI};

use serde::Serialize;

use super::block::{Acquisition, Block, DelayRole, PulseRole, RfPulse};
use super::phase::PhaseState;
use crate::config::PulseTimingConfig;
use crate::definitions::Measurement;

/// Which saturation scheme a measurement uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseScheme {
    /// Zero amplitude: wall-clock time preserved with delays only.
    DelayOnly,
    /// On-resonance spin-lock with two refocusing pulses per sub-pulse.
    Balanced,
    /// Off-resonance spin-lock, one full pulse per sub-pulse.
    Regular,
    /// Conventional saturation train without tip-down/tip-up.
    PlainSaturation,
}

/// Everything a scheme needs to emit one measurement.
#[derive(Debug, Clone, Copy)]
pub struct SaturationContext<'a> {
    pub measurement: &'a Measurement,
    /// Measurement offset converted to Hz.
    pub offset_hz: f64,
    /// Nominal flip angle of one full-length saturation pulse, radians.
    pub fa_sat_rad: f64,
    /// Phase accumulated over one `tp` at `offset_hz`.
    pub phase: PhaseState,
    pub n_pulses: usize,
    pub timing: &'a PulseTimingConfig,
}

impl PulseScheme {
    /// Decide the scheme for one measurement.
    ///
    /// Zero amplitude wins over the spin-lock flag; spin-locks then split on
    /// whether the offset lies within `on_resonance_tolerance_hz` of zero.
    pub fn select(
        measurement: &Measurement,
        offset_hz: f64,
        on_resonance_tolerance_hz: f64,
    ) -> Self {
        if measurement.b1_ut == 0.0 {
            PulseScheme::DelayOnly
        } else if measurement.is_spin_lock {
            if offset_hz.abs() < on_resonance_tolerance_hz {
                PulseScheme::Balanced
            } else {
                PulseScheme::Regular
            }
        } else {
            PulseScheme::PlainSaturation
        }
    }

    /// Append this scheme's saturation period to `out`.
    pub fn emit(&self, ctx: &SaturationContext<'_>, out: &mut Vec<Block>) {
        match self {
            PulseScheme::DelayOnly => emit_train(ctx, out, |out| {
                out.push(Block::delay(DelayRole::ZeroAmplitude, ctx.measurement.tp_s));
            }),
            PulseScheme::Balanced => {
                out.push(pre_spin_lock(ctx));
                emit_train(ctx, out, |out| emit_balanced_lock(ctx, out));
                out.push(post_spin_lock(ctx));
            }
            PulseScheme::Regular => {
                out.push(pre_spin_lock(ctx));
                emit_train(ctx, out, |out| {
                    out.push(rf(
                        PulseRole::SpinLock,
                        ctx.fa_sat_rad,
                        ctx.measurement.tp_s,
                        ctx.offset_hz,
                        PI,
                    ));
                });
                out.push(post_spin_lock(ctx));
            }
            PulseScheme::PlainSaturation => emit_train(ctx, out, |out| {
                out.push(rf(
                    PulseRole::Saturation,
                    ctx.fa_sat_rad,
                    ctx.measurement.tp_s,
                    ctx.offset_hz,
                    0.0,
                ));
            }),
        }
    }
}

/// Excitation pulse, echo-time imaging delay and acquisition marker.
pub fn emit_readout(
    measurement: &Measurement,
    echo_time_s: f64,
    timing: &PulseTimingConfig,
    out: &mut Vec<Block>,
) {
    out.push(rf(
        PulseRole::Excitation,
        measurement.excitation_fa_deg.to_radians(),
        timing.excitation_duration_s,
        0.0,
        0.0,
    ));
    out.push(Block::delay(DelayRole::Imaging, echo_time_s));
    out.push(Block::Acquisition(Acquisition {
        num_samples: timing.acquisition_samples,
        duration_s: timing.acquisition_duration_s,
    }));
}

/// `n_pulses` slots separated by inter-pulse delays (none after the last).
fn emit_train<F>(ctx: &SaturationContext<'_>, out: &mut Vec<Block>, mut slot: F)
where
    F: FnMut(&mut Vec<Block>),
{
    for n in 0..ctx.n_pulses {
        slot(out);
        if n + 1 < ctx.n_pulses {
            out.push(Block::delay(DelayRole::InterPulse, ctx.measurement.td_s));
        }
    }
}

/// Quarter / refocus / half / refocus / quarter.
///
/// The three lock segments split `tp` and the nominal flip angle 1:2:1.
/// Segment phases advance by a quarter and three quarters of the
/// accumulated phase so each refocusing pulse meets the magnetization where
/// it has precessed to.
fn emit_balanced_lock(ctx: &SaturationContext<'_>, out: &mut Vec<Block>) {
    let tp = ctx.measurement.tp_s;
    let fa = ctx.fa_sat_rad;
    let quarter = ctx.phase.fraction(0.25);
    let three_quarters = ctx.phase.fraction(0.75);
    let refocus = ctx.timing.refocusing_duration_s;

    out.push(rf(PulseRole::SpinLockSegment, fa / 4.0, tp / 4.0, ctx.offset_hz, PI));
    out.push(rf(PulseRole::Refocusing, PI, refocus, 0.0, PI + quarter));
    out.push(rf(PulseRole::SpinLockSegment, fa / 2.0, tp / 2.0, ctx.offset_hz, quarter));
    out.push(rf(PulseRole::Refocusing, PI, refocus, 0.0, three_quarters));
    out.push(rf(
        PulseRole::SpinLockSegment,
        fa / 4.0,
        tp / 4.0,
        ctx.offset_hz,
        PI + three_quarters,
    ));
}

fn pre_spin_lock(ctx: &SaturationContext<'_>) -> Block {
    rf(
        PulseRole::PreSpinLock,
        ctx.measurement.spin_lock_tip_deg.to_radians(),
        ctx.timing.spin_lock_prep_duration_s,
        0.0,
        FRAC_PI_2,
    )
}

fn post_spin_lock(ctx: &SaturationContext<'_>) -> Block {
    rf(
        PulseRole::PostSpinLock,
        ctx.measurement.spin_lock_tip_deg.to_radians(),
        ctx.timing.spin_lock_prep_duration_s,
        0.0,
        3.0 * FRAC_PI_2 + ctx.phase.radians(),
    )
}

fn rf(
    role: PulseRole,
    flip_angle_rad: f64,
    duration_s: f64,
    freq_offset_hz: f64,
    phase_offset_rad: f64,
) -> Block {
    Block::Rf(RfPulse {
        role,
        flip_angle_rad,
        duration_s,
        freq_offset_hz,
        phase_offset_rad,
    })
}
