// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rotating-frame phase accumulated during one saturation period.
//!
//! Magnetization locked along an off-resonant effective field precesses about
//! z relative to the on-resonant frame at the offset frequency. A pulse that
//! follows such a period must be re-phased by `2π · Δf · t` (mod 2π) to stay
//! phase-continuous. The value depends only on (offset, duration); nothing is
//! carried from one measurement to the next.

use std::f64::consts::TAU;

/// Phase accumulated over one saturation period, in [0, 2π).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PhaseState(f64);

impl PhaseState {
    /// Phase accumulated at `offset_hz` over `duration_s`.
    ///
    /// Negative products wrap upward, so the result is always in [0, 2π)
    /// for finite input.
    pub fn accumulate(offset_hz: f64, duration_s: f64) -> Self {
        let wrapped = (offset_hz * TAU * duration_s).rem_euclid(TAU);
        // rem_euclid can round up to exactly TAU for tiny negative inputs
        if wrapped >= TAU {
            PhaseState(0.0)
        } else {
            PhaseState(wrapped)
        }
    }

    pub fn radians(&self) -> f64 {
        self.0
    }

    /// `fraction` of the accumulated phase, e.g. 0.25 after the first
    /// quarter of a balanced spin-lock.
    pub fn fraction(&self, fraction: f64) -> f64 {
        self.0 * fraction
    }
}
