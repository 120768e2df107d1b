/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares configuration types for solve modes, local neighbourhoods, evaluation, and grade models.
//
// Created on: 03 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares configuration types for solve modes, local neighbourhoods, evaluation, and grade models.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelIOResult, RbfError};
use crate::interpolant_config::InterpolantSettings;
use crate::metric::Ellipsoid;
use crate::postprocess::{DecaySettings, ExtrapolationLimit, ThresholdConfig};
use crate::samples::{DuplicatePolicy, Sample};

/// Sample count above which [`SolverMode::Auto`] switches to local mode.
pub const AUTO_LOCAL_THRESHOLD: usize = 1000;

/// Smallest neighbourhood [`SolverMode::Auto`] will use in local mode.
pub const AUTO_LOCAL_MIN_NEIGHBOURS: usize = 100;

/// Parameters controlling batch evaluation of query points.
///
/// ### Default Values
/// - `parallel`: `true`
/// - `chunk_size`: `256`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationParams {
    /// Whether query chunks are evaluated on the rayon thread pool.
    pub parallel: bool,

    /// Number of query points per chunk. Cancellation and progress are checked
    /// between chunks.
    pub chunk_size: usize,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        EvaluationParams {
            parallel: true,
            chunk_size: 256,
        }
    }
}

impl EvaluationParams {
    /// Returns a new [`EvaluationParamsBuilder`] populated with defaults.
    pub fn builder() -> EvaluationParamsBuilder {
        EvaluationParamsBuilder::default()
    }

    /// Chunk size clamped to at least one point.
    #[inline]
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// A convenience builder for constructing an [`EvaluationParams`] instance.
#[derive(Debug, Clone, Default)]
pub struct EvaluationParamsBuilder {
    params: EvaluationParams,
}

impl EvaluationParamsBuilder {
    /// Enables or disables parallel evaluation.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.params.parallel = parallel;
        self
    }

    /// Sets the number of query points per chunk.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.params.chunk_size = chunk_size;
        self
    }

    /// Builds and returns an [`EvaluationParams`] instance.
    pub fn build(self) -> EvaluationParams {
        self.params
    }
}

/// How the samples used for a local fit are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Neighbourhood {
    /// The `k` nearest samples under the active metric.
    Nearest(usize),

    /// Every sample within this normalised distance. `1.0` is the ellipsoid boundary.
    Radius(f64),
}

impl Default for Neighbourhood {
    fn default() -> Self {
        Neighbourhood::Nearest(32)
    }
}

/// What a local evaluation returns when too few neighbours are found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LocalFallback {
    /// Return this value instead of fitting.
    Background(f64),

    /// Fail with [`RbfError::InsufficientNeighbours`].
    Error,
}

impl Default for LocalFallback {
    fn default() -> Self {
        LocalFallback::Background(0.0)
    }
}

/// Parameters for local RBF evaluation.
///
/// ### Default Values
/// - `neighbourhood`: `Nearest(32)`
/// - `min_neighbours`: `2`
/// - `fallback`: `Background(0.0)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalParams {
    pub neighbourhood: Neighbourhood,

    /// Fewest neighbours a local system may be fitted on. Raised to one more than
    /// the drift basis size when a drift is used.
    pub min_neighbours: usize,

    pub fallback: LocalFallback,
}

impl Default for LocalParams {
    fn default() -> Self {
        LocalParams::builder(Neighbourhood::default()).build()
    }
}

impl LocalParams {
    /// Returns a new [`LocalParamsBuilder`] for the given neighbourhood.
    pub fn builder(neighbourhood: Neighbourhood) -> LocalParamsBuilder {
        LocalParamsBuilder::new(neighbourhood)
    }

    /// Checks the neighbourhood size.
    pub fn validate(&self) -> Result<(), RbfError> {
        match self.neighbourhood {
            Neighbourhood::Nearest(0) => Err(RbfError::InvalidParameter {
                name: "neighbourhood",
                value: 0.0,
                reason: "the neighbour count must be at least one",
            }),
            Neighbourhood::Radius(r) if !(r.is_finite() && r > 0.0) => {
                Err(RbfError::InvalidParameter {
                    name: "neighbourhood",
                    value: r,
                    reason: "the search radius must be finite and greater than zero",
                })
            }
            _ => Ok(()),
        }
    }
}

/// A convenience builder for constructing a [`LocalParams`] instance.
#[derive(Debug, Clone, Copy)]
pub struct LocalParamsBuilder {
    params: LocalParams,
}

impl LocalParamsBuilder {
    fn new(neighbourhood: Neighbourhood) -> Self {
        Self {
            params: LocalParams {
                neighbourhood,
                min_neighbours: 2,
                fallback: LocalFallback::default(),
            },
        }
    }

    /// Sets the minimum neighbour count.
    pub fn min_neighbours(mut self, min_neighbours: usize) -> Self {
        self.params.min_neighbours = min_neighbours;
        self
    }

    /// Sets the insufficient-neighbour policy.
    pub fn fallback(mut self, fallback: LocalFallback) -> Self {
        self.params.fallback = fallback;
        self
    }

    /// Builds and returns a [`LocalParams`] instance.
    pub fn build(self) -> LocalParams {
        self.params
    }
}

/// Chooses between one global system and per-query local systems.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SolverMode {
    /// Solve one system over every sample.
    Global,

    /// Solve a small system around each query point.
    Local(LocalParams),

    /// Global up to [`AUTO_LOCAL_THRESHOLD`] samples, local with
    /// `k = max(100, n / 20)` above it.
    #[default]
    Auto,
}

impl SolverMode {
    /// The local parameters to use for `num_samples` samples, or `None` for a
    /// global solve.
    pub fn resolve(&self, num_samples: usize) -> Option<LocalParams> {
        match self {
            SolverMode::Global => None,
            SolverMode::Local(params) => Some(*params),
            SolverMode::Auto => match num_samples > AUTO_LOCAL_THRESHOLD {
                true => Some(
                    LocalParams::builder(Neighbourhood::Nearest(
                        AUTO_LOCAL_MIN_NEIGHBOURS.max(num_samples / 20),
                    ))
                    .build(),
                ),
                false => None,
            },
        }
    }
}

/// Caller-supplied cutoff grades, keyed by attribute name (for example `"Au"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CutoffGrades(BTreeMap<String, f64>);

impl CutoffGrades {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cutoff for an attribute, returning the previous value.
    pub fn insert(&mut self, attribute: impl Into<String>, cutoff: f64) -> Option<f64> {
        self.0.insert(attribute.into(), cutoff)
    }

    /// The cutoff for an attribute. An exact match is preferred, then a
    /// case-insensitive one.
    pub fn get(&self, attribute: &str) -> Option<f64> {
        self.0.get(attribute).copied().or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(attribute))
                .map(|(_, v)| *v)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for CutoffGrades {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Every parameter of the grade modelling pipeline.
///
/// Missing JSON fields take their defaults, so a configuration file only needs
/// to name what it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeModelConfig {
    /// Attribute being modelled. Used to look up its cutoff grade.
    pub attribute: Option<String>,

    pub interpolant: InterpolantSettings,

    /// Search and distance ellipsoid. `None` uses plain Euclidean distance.
    pub ellipsoid: Option<Ellipsoid>,

    pub solver_mode: SolverMode,

    pub duplicate_policy: DuplicatePolicy,

    /// Distance decay towards a background value. `None` disables decay.
    pub decay: Option<DecaySettings>,

    /// Min/max filtering of the final values. `None` keeps every value.
    pub threshold: Option<ThresholdConfig>,

    pub extrapolation_limit: ExtrapolationLimit,

    /// Value given to nodes beyond the extrapolation limit. Defaults to the decay
    /// background, or zero without decay.
    pub mask_value: Option<f64>,

    pub evaluation: EvaluationParams,

    /// Extra samples that take part in the fit but not in distance-to-data
    /// calculations.
    pub control_points: Vec<Sample>,
}

impl GradeModelConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ModelIOResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes the configuration to a pretty-printed JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ModelIOResult<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    /// The cutoff grade for the configured attribute, if both are known.
    pub fn cutoff_for(&self, cutoffs: &CutoffGrades) -> Option<f64> {
        self.attribute.as_deref().and_then(|a| cutoffs.get(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolant_config::RBFKernelType;
    use crate::postprocess::DecayFunction;
    use equator::assert;

    #[test]
    fn auto_mode_switches_to_local_above_threshold() {
        assert!(SolverMode::Auto.resolve(AUTO_LOCAL_THRESHOLD).is_none());

        let local = SolverMode::Auto.resolve(1500).unwrap();
        assert!(local.neighbourhood == Neighbourhood::Nearest(100));

        let local = SolverMode::Auto.resolve(10_000).unwrap();
        assert!(local.neighbourhood == Neighbourhood::Nearest(500));
        assert!(local.min_neighbours == 2);

        assert!(SolverMode::Global.resolve(1_000_000).is_none());
    }

    #[test]
    fn local_params_reject_empty_neighbourhoods() {
        assert!(LocalParams::builder(Neighbourhood::Nearest(0)).build().validate().is_err());
        assert!(LocalParams::builder(Neighbourhood::Radius(-1.0)).build().validate().is_err());
        assert!(LocalParams::builder(Neighbourhood::Radius(1.5)).build().validate().is_ok());
    }

    #[test]
    fn local_params_default_matches_builder() {
        let params = LocalParams::default();
        assert!(params.min_neighbours == 2);
        assert!(params.neighbourhood == Neighbourhood::Nearest(32));
        assert!(params == LocalParams::builder(Neighbourhood::default()).build());

        let parsed: LocalParams = serde_json::from_str("{}").unwrap();
        assert!(parsed.min_neighbours == 2);
        assert!(parsed == params);
    }

    #[test]
    fn cutoff_lookup_falls_back_to_case_insensitive() {
        let cutoffs: CutoffGrades = [("Au", 0.5), ("CU", 0.3)].into_iter().collect();
        assert!(cutoffs.get("Au") == Some(0.5));
        assert!(cutoffs.get("cu") == Some(0.3));
        assert!(cutoffs.get("Ag").is_none());

        let config = GradeModelConfig {
            attribute: Some("au".to_string()),
            ..Default::default()
        };
        assert!(config.cutoff_for(&cutoffs) == Some(0.5));
    }

    #[test]
    fn partial_json_takes_defaults() {
        let json = r#"{
            "attribute": "Au",
            "interpolant": { "kernel_type": "Gaussian", "epsilon": 0.5, "smoothing": 0.1, "drift": "Constant" },
            "solver_mode": "Global",
            "decay": { "distance": { "Fixed": 25.0 }, "background_value": 0.01, "decay_function": "Gaussian" }
        }"#;
        let config: GradeModelConfig = serde_json::from_str(json).unwrap();

        assert!(config.interpolant.kernel_type == RBFKernelType::Gaussian);
        assert!(config.solver_mode == SolverMode::Global);
        assert!(config.ellipsoid.is_none());
        assert!(config.evaluation == EvaluationParams::default());
        assert!(config.decay.unwrap().decay_function == DecayFunction::Gaussian);
    }

    #[test]
    fn json_file_round_trip() {
        let config = GradeModelConfig {
            attribute: Some("Cu".to_string()),
            ellipsoid: Some(Ellipsoid::new(120.0, 60.0, 15.0, 45.0, -30.0, 10.0)),
            solver_mode: SolverMode::Local(
                LocalParams::builder(Neighbourhood::Radius(1.0))
                    .fallback(LocalFallback::Error)
                    .build(),
            ),
            control_points: vec![Sample::new([1.0, 2.0, 3.0], 0.0)],
            ..Default::default()
        };

        let path = std::env::temp_dir().join(format!("grade_model_config_{}.json", std::process::id()));
        config.to_json_file(&path).unwrap();
        let loaded = GradeModelConfig::from_json_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(loaded == config);
    }
}
