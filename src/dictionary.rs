// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Contracts for the dictionary simulation and matching collaborators.
//!
//! The generated protocol file is handed to a [`DictionaryGenerator`], which
//! simulates a signal trace per tissue-parameter tuple, and then to a
//! [`SignalMatcher`], which picks the best dictionary entry for every voxel
//! of an acquisition. Only the request and result types live here; the
//! simulation and the matching itself are provided elsewhere.
//!
//! ```text
//! protocol.seq ─┐
//! scenario.yaml ┴─► DictionaryGenerator ─► Dictionary ─┐
//!                                 acquired signals ────┴─► SignalMatcher ─► QuantMaps
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ValidationError};

/// Dot-product score above which a voxel match is considered reliable.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.99974;

/// Ratio tying the second CEST pool fraction to the first in
/// multi-pool dictionaries.
pub const DEFAULT_POOL_FRACTION_RATIO: f64 = 0.6666667;

/// Which magnetization components form the simulated signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAxes {
    /// Transverse magnitude
    #[default]
    Xy,
    /// Longitudinal component
    Z,
}

impl FromStr for SignalAxes {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xy" => Ok(SignalAxes::Xy),
            "z" => Ok(SignalAxes::Z),
            other => Err(Error::Config(format!(
                "unknown signal axes '{other}' (expected xy or z)"
            ))),
        }
    }
}

impl fmt::Display for SignalAxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAxes::Xy => write!(f, "xy"),
            SignalAxes::Z => write!(f, "z"),
        }
    }
}

/// `param_b = ratio * param_a` for every dictionary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualityConstraint {
    pub param_a: String,
    pub param_b: String,
    pub ratio: f64,
}

impl EqualityConstraint {
    pub fn new(param_a: impl Into<String>, param_b: impl Into<String>, ratio: f64) -> Self {
        Self {
            param_a: param_a.into(),
            param_b: param_b.into(),
            ratio,
        }
    }

    /// Whether a parameter tuple satisfies this constraint.
    pub fn holds(&self, params: &BTreeMap<String, f64>, tolerance: f64) -> bool {
        match (params.get(&self.param_a), params.get(&self.param_b)) {
            (Some(a), Some(b)) => (b - self.ratio * a).abs() <= tolerance,
            _ => false,
        }
    }
}

/// Constraints used when the scenario has `num_cest_pools` solute pools.
///
/// A second pool's fraction is tied to the first; single-pool scenarios are
/// unconstrained.
pub fn default_equality_constraints(num_cest_pools: usize) -> Vec<EqualityConstraint> {
    if num_cest_pools > 1 {
        vec![EqualityConstraint::new(
            "fs_0",
            "fs_1",
            DEFAULT_POOL_FRACTION_RATIO,
        )]
    } else {
        Vec::new()
    }
}

/// Input to a [`DictionaryGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryRequest {
    /// Protocol file written by an emitter
    pub sequence_path: PathBuf,
    /// Tissue/scanner scenario file
    pub parameter_path: PathBuf,
    /// Where the generator persists the dictionary, if anywhere
    pub output_path: Option<PathBuf>,
    /// Worker-count hint; results must not depend on it
    pub workers: usize,
    pub axes: SignalAxes,
    #[serde(default)]
    pub equals: Vec<EqualityConstraint>,
}

impl DictionaryRequest {
    pub fn new(sequence_path: impl Into<PathBuf>, parameter_path: impl Into<PathBuf>) -> Self {
        Self {
            sequence_path: sequence_path.into(),
            parameter_path: parameter_path.into(),
            output_path: None,
            workers: 1,
            axes: SignalAxes::default(),
            equals: Vec::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_equals(mut self, equals: Vec<EqualityConstraint>) -> Self {
        self.equals = equals;
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ValidationError::Field {
                field: "workers".into(),
                message: "must be at least 1".into(),
            }
            .into());
        }
        if let Some(output) = &self.output_path {
            if output == &self.sequence_path || output == &self.parameter_path {
                return Err(ValidationError::Field {
                    field: "output_path".into(),
                    message: format!("{} would overwrite an input file", output.display()),
                }
                .into());
            }
        }
        for c in &self.equals {
            if !c.ratio.is_finite() {
                return Err(ValidationError::Field {
                    field: "equals".into(),
                    message: format!("ratio for {} / {} is not finite", c.param_a, c.param_b),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// One simulated parameter tuple and its signal trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub params: BTreeMap<String, f64>,
    /// One sample per measurement
    pub signal: Vec<f64>,
}

/// Parameter tuples mapped to signal traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
}

impl Dictionary {
    /// Build a dictionary, checking that all traces have the same length and
    /// every entry names the same parameters.
    pub fn new(entries: Vec<DictionaryEntry>) -> Result<Self> {
        if let Some(first) = entries.first() {
            let len = first.signal.len();
            let names: Vec<&String> = first.params.keys().collect();
            for (i, entry) in entries.iter().enumerate().skip(1) {
                if entry.signal.len() != len {
                    return Err(ValidationError::Field {
                        field: "signal".into(),
                        message: format!(
                            "entry {i} has {} samples, expected {len}",
                            entry.signal.len()
                        ),
                    }
                    .into());
                }
                if !entry.params.keys().eq(names.iter().copied()) {
                    return Err(ValidationError::Field {
                        field: "params".into(),
                        message: format!("entry {i} has a different parameter set"),
                    }
                    .into());
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Samples per trace, or 0 for an empty dictionary.
    pub fn signal_len(&self) -> usize {
        self.entries.first().map(|e| e.signal.len()).unwrap_or(0)
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.entries
            .first()
            .map(|e| e.params.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether every entry satisfies all `constraints`.
    pub fn satisfies(&self, constraints: &[EqualityConstraint], tolerance: f64) -> bool {
        self.entries
            .iter()
            .all(|e| constraints.iter().all(|c| c.holds(&e.params, tolerance)))
    }
}

/// Input to a [`SignalMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Acquired per-voxel signal traces
    pub acquired_path: PathBuf,
    /// Worker-count hint; results must not depend on it
    pub workers: usize,
}

/// Per-voxel best-match parameter maps plus the dot-product score map.
///
/// Maps are stored row-major with `rows * cols` entries each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantMaps {
    pub rows: usize,
    pub cols: usize,
    pub params: BTreeMap<String, Vec<f64>>,
    pub dot_product: Vec<f64>,
}

impl QuantMaps {
    pub fn new(
        rows: usize,
        cols: usize,
        params: BTreeMap<String, Vec<f64>>,
        dot_product: Vec<f64>,
    ) -> Result<Self> {
        let voxels = rows * cols;
        if dot_product.len() != voxels {
            return Err(ValidationError::LengthMismatch {
                field: "dot_product".into(),
                expected: voxels,
                actual: dot_product.len(),
            }
            .into());
        }
        for (name, map) in &params {
            if map.len() != voxels {
                return Err(ValidationError::LengthMismatch {
                    field: name.clone(),
                    expected: voxels,
                    actual: map.len(),
                }
                .into());
            }
        }
        Ok(Self {
            rows,
            cols,
            params,
            dot_product,
        })
    }

    pub fn num_voxels(&self) -> usize {
        self.rows * self.cols
    }

    /// Voxels whose dot-product score exceeds `threshold`.
    pub fn mask(&self, threshold: f64) -> Vec<bool> {
        self.dot_product.iter().map(|&dp| dp > threshold).collect()
    }

    pub fn param(&self, name: &str) -> Option<&[f64]> {
        self.params.get(name).map(Vec::as_slice)
    }
}

/// Simulates a dictionary for a persisted protocol.
pub trait DictionaryGenerator {
    fn generate(&self, request: &DictionaryRequest) -> Result<Dictionary>;
}

/// Matches acquired signals against a dictionary.
pub trait SignalMatcher {
    fn match_signals(&self, dictionary: &Dictionary, request: &MatchRequest) -> Result<QuantMaps>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockDictionaryGenerator, MockSignalMatcher};

    fn params(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    #[test]
    fn test_default_constraints_by_pool_count() {
        assert!(default_equality_constraints(1).is_empty());
        let eq = default_equality_constraints(2);
        assert_eq!(eq.len(), 1);
        assert_eq!(eq[0].param_a, "fs_0");
        assert_eq!(eq[0].param_b, "fs_1");
        assert_eq!(eq[0].ratio, DEFAULT_POOL_FRACTION_RATIO);
    }

    #[test]
    fn test_constraint_holds() {
        let c = EqualityConstraint::new("fs_0", "fs_1", 0.5);
        assert!(c.holds(&params(&[("fs_0", 0.2), ("fs_1", 0.1)]), 1e-12));
        assert!(!c.holds(&params(&[("fs_0", 0.2), ("fs_1", 0.2)]), 1e-12));
        assert!(!c.holds(&params(&[("fs_0", 0.2)]), 1e-12));
    }

    #[test]
    fn test_signal_axes_parse() {
        assert_eq!("XY".parse::<SignalAxes>().unwrap(), SignalAxes::Xy);
        assert_eq!("z".parse::<SignalAxes>().unwrap(), SignalAxes::Z);
        assert!("xyz".parse::<SignalAxes>().is_err());
        assert_eq!(SignalAxes::Xy.to_string(), "xy");
    }

    // =========================================================================
    // Requests and results
    // =========================================================================

    #[test]
    fn test_request_validation() {
        let req = DictionaryRequest::new("p.seq", "s.yaml").with_workers(18);
        assert!(req.validate().is_ok());
        assert_eq!(req.axes, SignalAxes::Xy);

        let bad = DictionaryRequest::new("p.seq", "s.yaml").with_workers(0);
        assert!(bad.validate().is_err());

        let nan = DictionaryRequest::new("p.seq", "s.yaml")
            .with_equals(vec![EqualityConstraint::new("a", "b", f64::NAN)]);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_request_output_must_not_overwrite_inputs() {
        let req = DictionaryRequest::new("p.seq", "s.yaml").with_output("dict.json");
        assert_eq!(req.output_path, Some(PathBuf::from("dict.json")));
        assert!(req.validate().is_ok());

        let err = DictionaryRequest::new("p.seq", "s.yaml")
            .with_output("p.seq")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("output_path"));
        assert!(DictionaryRequest::new("p.seq", "s.yaml")
            .with_output("s.yaml")
            .validate()
            .is_err());
    }

    #[test]
    fn test_dictionary_rejects_ragged_signals() {
        let entries = vec![
            DictionaryEntry {
                params: params(&[("t1", 1.0)]),
                signal: vec![1.0, 0.5],
            },
            DictionaryEntry {
                params: params(&[("t1", 2.0)]),
                signal: vec![1.0],
            },
        ];
        assert!(Dictionary::new(entries).is_err());
    }

    #[test]
    fn test_dictionary_rejects_mixed_params() {
        let entries = vec![
            DictionaryEntry {
                params: params(&[("t1", 1.0)]),
                signal: vec![1.0],
            },
            DictionaryEntry {
                params: params(&[("t2", 2.0)]),
                signal: vec![1.0],
            },
        ];
        assert!(Dictionary::new(entries).is_err());
    }

    #[test]
    fn test_quant_maps_shape_and_mask() {
        let mut p = BTreeMap::new();
        p.insert("ksw".to_string(), vec![100.0, 200.0, 300.0, 400.0]);
        let maps = QuantMaps::new(2, 2, p, vec![0.9999, 0.5, 0.99975, 1.0]).unwrap();
        assert_eq!(maps.num_voxels(), 4);
        assert_eq!(
            maps.mask(DEFAULT_MATCH_THRESHOLD),
            vec![true, false, true, true]
        );
        assert_eq!(maps.param("ksw").unwrap()[3], 400.0);

        let mut bad = BTreeMap::new();
        bad.insert("ksw".to_string(), vec![1.0]);
        assert!(QuantMaps::new(2, 2, bad, vec![0.0; 4]).is_err());
    }

    // =========================================================================
    // Collaborator round trip through the trait objects
    // =========================================================================

    #[test]
    fn test_generate_then_match() {
        let generator: Box<dyn DictionaryGenerator> = Box::new(MockDictionaryGenerator::new(3));
        let request = DictionaryRequest::new("p.seq", "s.yaml")
            .with_workers(4)
            .with_equals(default_equality_constraints(2));
        let dictionary = generator.generate(&request).unwrap();
        assert_eq!(dictionary.signal_len(), 3);
        assert!(dictionary.satisfies(&request.equals, 1e-12));
        assert_eq!(dictionary.param_names(), vec!["fs_0", "fs_1", "ksw"]);

        let target = dictionary.entries()[2].signal.clone();
        let matcher: Box<dyn SignalMatcher> =
            Box::new(MockSignalMatcher::new(vec![target.clone(), target]));
        let maps = matcher
            .match_signals(
                &dictionary,
                &MatchRequest {
                    acquired_path: "acq.mat".into(),
                    workers: 4,
                },
            )
            .unwrap();
        assert_eq!(maps.num_voxels(), 2);
        assert!(maps.dot_product.iter().all(|&dp| (dp - 1.0).abs() < 1e-12));
        let ksw = maps.param("ksw").unwrap();
        assert_eq!(ksw[0], dictionary.entries()[2].params["ksw"]);
    }

    #[test]
    fn test_matching_is_independent_of_workers() {
        let dictionary = MockDictionaryGenerator::new(4)
            .generate(&DictionaryRequest::new("p.seq", "s.yaml"))
            .unwrap();
        let voxels = vec![
            dictionary.entries()[1].signal.clone(),
            dictionary.entries()[0].signal.clone(),
        ];
        let matcher = MockSignalMatcher::new(voxels);
        let one = matcher
            .match_signals(
                &dictionary,
                &MatchRequest {
                    acquired_path: "acq.mat".into(),
                    workers: 1,
                },
            )
            .unwrap();
        let many = matcher
            .match_signals(
                &dictionary,
                &MatchRequest {
                    acquired_path: "acq.mat".into(),
                    workers: 16,
                },
            )
            .unwrap();
        assert_eq!(one, many);
    }
}
