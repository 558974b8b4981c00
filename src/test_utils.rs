// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities: definition builders and mock collaborators.

use std::collections::BTreeMap;

use crate::config::ScanConfig;
use crate::definitions::{
    FlagValue, InterPulseDelay, Measurement, SequenceDefinitionSet, SequenceDefinitions,
};
use crate::dictionary::{
    Dictionary, DictionaryEntry, DictionaryGenerator, DictionaryRequest, MatchRequest, QuantMaps,
    SignalMatcher,
};
use crate::error::Result;

/// Two spin-lock measurements at 9.4 T: on resonance, then 5 ppm.
pub fn two_measurement_set() -> SequenceDefinitionSet {
    SequenceDefinitionSet {
        num_meas: Some(2),
        exc_fa: Some(vec![90.0, 90.0]),
        b1_pa: Some(vec![1.0, 1.0]),
        offsets_ppm: Some(vec![0.0, 5.0]),
        tp: Some(vec![0.01, 0.01]),
        trec: Some(vec![1.0, 1.0]),
        n_pulses: Some(1),
        td: Some(InterPulseDelay::Uniform(0.0)),
        b0: Some(9.4),
        gamma_hz: None,
        te: None,
        sl_flag: Some(vec![FlagValue::Bool(true), FlagValue::Bool(true)]),
        sl_fa: Some(vec![90.0, 90.0]),
        seq_id: None,
        extra: BTreeMap::new(),
    }
}

/// Validate a set against the default scan configuration.
pub fn definitions(set: SequenceDefinitionSet) -> SequenceDefinitions {
    SequenceDefinitions::from_set(set, &ScanConfig::default()).unwrap()
}

/// A 10 ms measurement with 90° excitation and spin-lock tip, no
/// inter-pulse delay and 1 s recovery.
pub fn measurement(index: usize, b1_ut: f64, offset_ppm: f64, is_spin_lock: bool) -> Measurement {
    Measurement {
        index,
        excitation_fa_deg: 90.0,
        b1_ut,
        offset_ppm,
        tp_s: 0.01,
        td_s: 0.0,
        recovery_s: 1.0,
        is_spin_lock,
        spin_lock_tip_deg: 90.0,
    }
}

/// Mock generator producing four exponential traces of a fixed length.
///
/// `fs_1` is derived from the request's equality constraints when present.
pub struct MockDictionaryGenerator {
    pub signal_len: usize,
}

impl MockDictionaryGenerator {
    pub fn new(signal_len: usize) -> Self {
        Self { signal_len }
    }
}

impl DictionaryGenerator for MockDictionaryGenerator {
    fn generate(&self, request: &DictionaryRequest) -> Result<Dictionary> {
        request.validate()?;
        let entries = (1..=4)
            .map(|k| {
                let ksw = 100.0 * k as f64;
                let mut params = BTreeMap::new();
                params.insert("ksw".to_string(), ksw);
                params.insert("fs_0".to_string(), 1e-3 * k as f64);
                params.insert("fs_1".to_string(), 1e-3 * k as f64);
                for c in &request.equals {
                    if let Some(a) = params.get(&c.param_a).copied() {
                        params.insert(c.param_b.clone(), c.ratio * a);
                    }
                }
                let signal = (1..=self.signal_len)
                    .map(|j| (-(j as f64) * ksw / 1000.0).exp())
                    .collect();
                DictionaryEntry { params, signal }
            })
            .collect();
        Dictionary::new(entries)
    }
}

/// Mock matcher over in-memory voxel traces laid out as one row.
pub struct MockSignalMatcher {
    pub voxels: Vec<Vec<f64>>,
}

impl MockSignalMatcher {
    pub fn new(voxels: Vec<Vec<f64>>) -> Self {
        Self { voxels }
    }
}

impl SignalMatcher for MockSignalMatcher {
    fn match_signals(&self, dictionary: &Dictionary, _request: &MatchRequest) -> Result<QuantMaps> {
        let mut params: BTreeMap<String, Vec<f64>> = dictionary
            .param_names()
            .into_iter()
            .map(|name| (name.to_string(), Vec::with_capacity(self.voxels.len())))
            .collect();
        let mut dot_product = Vec::with_capacity(self.voxels.len());

        for voxel in &self.voxels {
            let mut best: Option<(usize, f64)> = None;
            for (i, entry) in dictionary.entries().iter().enumerate() {
                let score = normalized_dot(voxel, &entry.signal);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
            let (i, score) = best.unwrap_or((0, 0.0));
            if let Some(entry) = dictionary.entries().get(i) {
                for (name, value) in &entry.params {
                    if let Some(map) = params.get_mut(name) {
                        map.push(*value);
                    }
                }
            }
            dot_product.push(score);
        }

        QuantMaps::new(1, self.voxels.len(), params, dot_product)
    }
}

fn normalized_dot(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
