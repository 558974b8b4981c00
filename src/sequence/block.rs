// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output blocks: RF pulses, delays and acquisition markers.
//!
//! All quantities are in final physical units: seconds, radians and Hz.
//! Emitters write them as-is.

use std::f64::consts::TAU;

use serde::Serialize;

/// Purpose of an RF pulse within a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseRole {
    /// Plain off-resonant saturation pulse
    Saturation,
    /// Tip-down pulse before a spin-lock train
    PreSpinLock,
    /// Full-duration spin-lock pulse
    SpinLock,
    /// Quarter or half segment of a balanced spin-lock
    SpinLockSegment,
    /// 180° refocusing pulse of a balanced spin-lock
    Refocusing,
    /// Tip-up pulse after a spin-lock train
    PostSpinLock,
    /// Imaging excitation pulse
    Excitation,
}

/// Purpose of a delay within a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayRole {
    /// Recovery before a measurement
    Recovery,
    /// Gap between saturation sub-pulses
    InterPulse,
    /// Stand-in for a zero-amplitude saturation sub-pulse
    ZeroAmplitude,
    /// Readout placeholder lasting one echo time
    Imaging,
}

/// Rectangular (block) RF pulse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RfPulse {
    pub role: PulseRole,
    /// Flip angle in radians.
    pub flip_angle_rad: f64,
    pub duration_s: f64,
    pub freq_offset_hz: f64,
    /// Phase offset in radians, not wrapped.
    pub phase_offset_rad: f64,
}

impl RfPulse {
    /// B1 amplitude of the block pulse in Hz: `flip / (2π · duration)`.
    pub fn amplitude_hz(&self) -> f64 {
        self.flip_angle_rad / (TAU * self.duration_s)
    }
}

/// Pure wait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delay {
    pub role: DelayRole,
    pub duration_s: f64,
}

/// Placeholder acquisition (ADC) event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Acquisition {
    pub num_samples: u32,
    pub duration_s: f64,
}

impl Acquisition {
    /// Sample spacing in seconds.
    pub fn dwell_s(&self) -> f64 {
        self.duration_s / f64::from(self.num_samples)
    }
}

/// One atomic output unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Rf(RfPulse),
    Delay(Delay),
    Acquisition(Acquisition),
}

impl Block {
    pub fn duration_s(&self) -> f64 {
        match self {
            Block::Rf(p) => p.duration_s,
            Block::Delay(d) => d.duration_s,
            Block::Acquisition(a) => a.duration_s,
        }
    }

    pub fn is_rf(&self) -> bool {
        matches!(self, Block::Rf(_))
    }

    pub fn is_delay(&self) -> bool {
        matches!(self, Block::Delay(_))
    }

    pub fn as_rf(&self) -> Option<&RfPulse> {
        match self {
            Block::Rf(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_delay(&self) -> Option<&Delay> {
        match self {
            Block::Delay(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn delay(role: DelayRole, duration_s: f64) -> Self {
        Block::Delay(Delay { role, duration_s })
    }
}

/// A block tagged with the measurement that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceBlock {
    pub measurement: usize,
    #[serde(flatten)]
    pub block: Block,
}
