/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the end-to-end grade field pipeline from samples to labelled, thresholded output.
//
// Created on: 07 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! The grade modelling pipeline.
//!
//! [`GradeModel`] wires the components together for one attribute:
//!
//! 1. duplicate samples are merged and reported,
//! 2. control points are appended to the fitting set,
//! 3. a global or local interpolant is built according to the [`SolverMode`],
//! 4. the targets are evaluated,
//! 5. raw values decay towards the background with distance to the nearest real
//!    sample, then nodes beyond the extrapolation limit are masked,
//! 6. the threshold labels each value kept or excluded,
//! 7. the distribution of the result is logged.
//!
//! Distances in steps 5 and 6 are measured under the same metric as the
//! interpolant and never consider control points.

use std::{path::Path, sync::Arc};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    cancel::{self, CancellationToken},
    config::{CutoffGrades, GradeModelConfig, LocalFallback},
    desurvey::Desurveyor,
    error::{DesurveyError, GradeModelError, RbfError},
    grid::{GridSpec, LabelledPoint, ScalarGrid},
    local::LocalInterpolator,
    metric::AnisotropicMetric,
    neighbours::NeighbourIndex,
    postprocess::{DecayConfig, apply_decay, apply_threshold},
    progress::{ProgressMsg, ProgressSink},
    rbf::RBFModel,
    samples::{Sample, SampleSet},
    statistics::{GridStatistics, log_grid_statistics, median},
};

/// An assayed interval down a drill hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayInterval {
    pub hole_id: String,
    pub depth_from: f64,
    pub depth_to: f64,
    pub value: f64,
}

/// Places each interval's value at the mid depth of the interval.
pub fn samples_from_intervals(
    desurveyor: &Desurveyor,
    intervals: &[AssayInterval],
) -> Result<Vec<Sample>, DesurveyError> {
    intervals
        .iter()
        .map(|interval| {
            let located = desurveyor.locate_interval(&interval.hole_id, interval.depth_from, interval.depth_to)?;
            Ok(Sample::new(located.mid, interval.value))
        })
        .collect()
}

/// Which interpolant produced a [`GradeField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    Global,
    Local,
}

/// Output of a pipeline run.
#[derive(Debug, Clone)]
pub struct GradeField {
    /// One entry per target, in target order.
    pub points: Vec<LabelledPoint>,

    /// The gridded values, for grid runs.
    pub grid: Option<ScalarGrid>,

    /// Lower bound applied by the threshold, if one was configured.
    pub cutoff: Option<f64>,

    pub num_duplicates: usize,
    pub solver: SolverKind,
    pub statistics: Option<GridStatistics>,
}

/// A configured grade modelling pipeline.
#[derive(Debug, Clone)]
pub struct GradeModel {
    config: GradeModelConfig,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

enum Interpolant {
    Global(RBFModel),
    Local(LocalInterpolator),
}

impl GradeModel {
    /// Validates the configuration.
    pub fn new(config: GradeModelConfig) -> Result<Self, RbfError> {
        config.interpolant.validate()?;
        if let Some(threshold) = &config.threshold {
            threshold.validate()?;
        }
        if let Some(params) = config.solver_mode.resolve(0) {
            params.validate()?;
        }
        if let Some(v) = config.mask_value.filter(|v| !v.is_finite()) {
            return Err(RbfError::InvalidParameter { name: "mask value", value: v, reason: "must be finite" });
        }
        Ok(Self { config, progress_callback: None })
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, GradeModelError> {
        Ok(Self::new(GradeModelConfig::from_json_file(path)?)?)
    }

    /// Installs a progress sink for subsequent runs.
    pub fn with_progress_callback(mut self, progress_callback: Arc<dyn ProgressSink>) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    pub fn config(&self) -> &GradeModelConfig {
        &self.config
    }

    /// Models the field at arbitrary target positions.
    pub fn run_points(
        &self,
        samples: Vec<Sample>,
        targets: &[[f64; 3]],
        cutoffs: &CutoffGrades,
        cancel: Option<&CancellationToken>,
    ) -> Result<GradeField, GradeModelError> {
        Ok(self.run(samples, targets, cutoffs, cancel)?)
    }

    /// Models the field over every node of `grid`.
    pub fn run_grid(
        &self,
        samples: Vec<Sample>,
        grid: &GridSpec,
        cutoffs: &CutoffGrades,
        cancel: Option<&CancellationToken>,
    ) -> Result<GradeField, GradeModelError> {
        let mut field = self.run(samples, &grid.points(), cutoffs, cancel)?;
        field.grid = Some(ScalarGrid::from_labelled(*grid, &field.points)?);
        Ok(field)
    }

    fn run(
        &self,
        samples: Vec<Sample>,
        targets: &[[f64; 3]],
        cutoffs: &CutoffGrades,
        cancel: Option<&CancellationToken>,
    ) -> Result<GradeField, RbfError> {
        let config = &self.config;
        cancel::check(cancel)?;

        let (data, num_duplicates) = SampleSet::new(samples, config.duplicate_policy)?;
        if data.is_empty() {
            return Err(RbfError::EmptySampleSet);
        }
        if num_duplicates > 0 {
            self.emit(ProgressMsg::DuplicatesMerged { num_duplicates });
        }

        let metric = config
            .ellipsoid
            .as_ref()
            .map_or_else(AnisotropicMetric::euclidean, AnisotropicMetric::new);

        // Real samples only. Control points shape the fit, not the distances.
        let index = NeighbourIndex::build(&data, &metric);
        let decay = config.decay.map(|d| d.resolve(&index)).transpose()?;
        let positions: Vec<[f64; 3]> = data.iter().map(|s| s.position).collect();
        let mask = config.extrapolation_limit.build_mask(&positions)?;

        let fit_set = match config.control_points.is_empty() {
            true => data.clone(),
            false => data.extended(&config.control_points, config.duplicate_policy)?.0,
        };

        let interpolant = self.build_interpolant(fit_set, &metric, decay.as_ref(), cancel)?;
        let (solver, raw) = match &interpolant {
            Interpolant::Global(model) => (SolverKind::Global, model.evaluate_points(targets, cancel)?),
            Interpolant::Local(local) => (SolverKind::Local, local.evaluate_points(targets, cancel)?),
        };
        cancel::check(cancel)?;

        let mask_value = config
            .mask_value
            .or(decay.map(|d| d.background_value))
            .unwrap_or(0.0);

        let finalise = |(point, raw): (&[f64; 3], &f64)| {
            let nearest = index.nearest(point).map(|n| n.distance);
            let decayed = match (&decay, nearest) {
                (Some(decay), Some(distance)) => apply_decay(*raw, distance, decay),
                _ => *raw,
            };
            match mask.is_masked(point, nearest) {
                true => mask_value,
                false => decayed,
            }
        };
        let values: Vec<f64> = match config.evaluation.parallel {
            true => targets.par_iter().zip(raw.par_iter()).map(finalise).collect(),
            false => targets.iter().zip(raw.iter()).map(finalise).collect(),
        };

        let sample_median = median(&data.values());
        let cutoff = config.threshold.map(|threshold| {
            let auto = match threshold.use_auto_cutoff {
                true => config.cutoff_for(cutoffs),
                false => None,
            };
            if threshold.use_auto_cutoff && auto.is_none() {
                tracing::warn!(attribute = ?config.attribute, "no cutoff grade for attribute; using the configured minimum");
            }
            auto.or(threshold.min).or_else(|| {
                tracing::warn!(
                    median = ?sample_median,
                    max = ?threshold.max,
                    "no threshold minimum or cutoff grade given; the sample median becomes the lower cutoff"
                );
                sample_median
            })
        });

        let points: Vec<LabelledPoint> = targets
            .iter()
            .zip(&values)
            .map(|(p, v)| {
                let label = match &config.threshold {
                    Some(threshold) => apply_threshold(*v, None, threshold.max, cutoff.flatten()),
                    None => apply_threshold(*v, None, None, None),
                };
                LabelledPoint::new(*p, *v, label)
            })
            .collect();

        let statistics = log_grid_statistics(&values, cutoff.flatten().or(sample_median));

        Ok(GradeField {
            points,
            grid: None,
            cutoff: cutoff.flatten(),
            num_duplicates,
            solver,
            statistics,
        })
    }

    fn build_interpolant(
        &self,
        fit_set: SampleSet,
        metric: &AnisotropicMetric,
        decay: Option<&DecayConfig>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Interpolant, RbfError> {
        let config = &self.config;

        match config.solver_mode.resolve(fit_set.len()) {
            None => {
                let mut builder = RBFModel::builder(fit_set, config.interpolant)
                    .metric(metric.clone())
                    .params(config.evaluation);
                if let Some(token) = cancel {
                    builder = builder.cancellation(token.clone());
                }
                if let Some(sink) = &self.progress_callback {
                    builder = builder.progress_callback(sink.clone());
                }
                Ok(Interpolant::Global(builder.build()?))
            }
            Some(mut params) => {
                // Starved neighbourhoods blend into the same background as decay.
                if let (LocalFallback::Background(_), Some(decay)) = (params.fallback, decay) {
                    params.fallback = LocalFallback::Background(decay.background_value);
                }
                let mut local = LocalInterpolator::new(fit_set, config.interpolant, metric, params)?
                    .with_evaluation_params(config.evaluation);
                local.set_progress_callback(self.progress_callback.clone());
                Ok(Interpolant::Local(local))
            }
        }
    }

    fn emit(&self, msg: ProgressMsg) {
        if let Some(sink) = &self.progress_callback {
            sink.emit(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocalParams, Neighbourhood, SolverMode};
    use crate::desurvey::{Collar, DesurveyMethod, SurveyStation};
    use crate::interpolant_config::{Drift, InterpolantSettings, RBFKernelType};
    use crate::postprocess::{DecayDistance, DecayFunction, DecaySettings, ExtrapolationLimit, ThresholdConfig};
    use crate::progress::closure_sink;
    use equator::assert;
    use std::sync::Mutex;

    fn plane_samples() -> Vec<Sample> {
        let mut samples = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                let (x, y) = (i as f64 * 10.0, j as f64 * 10.0);
                samples.push(Sample::new([x, y, 0.0], 1.0 + x / 10.0));
            }
        }
        samples
    }

    fn linear_config() -> GradeModelConfig {
        GradeModelConfig {
            interpolant: InterpolantSettings::builder(RBFKernelType::ThinPlateSpline)
                .drift(Drift::Linear)
                .build(),
            solver_mode: SolverMode::Global,
            ..Default::default()
        }
    }

    #[test]
    fn plain_run_reproduces_samples() {
        let model = GradeModel::new(linear_config()).unwrap();
        let targets = [[10.0, 20.0, 0.0], [35.0, 5.0, 0.0]];
        let field = model.run_points(plane_samples(), &targets, &CutoffGrades::new(), None).unwrap();

        assert!(field.solver == SolverKind::Global);
        assert!((field.points[0].value - 2.0).abs() < 1e-8);
        assert!((field.points[1].value - 4.5).abs() < 1e-8);
        assert!(field.points.iter().all(|p| !p.excluded));
        assert!(field.cutoff.is_none());
    }

    #[test]
    fn decay_pulls_far_nodes_to_background() {
        let config = GradeModelConfig {
            decay: Some(DecaySettings {
                distance: DecayDistance::Fixed(20.0),
                background_value: -1.0,
                decay_function: DecayFunction::Linear,
            }),
            ..linear_config()
        };
        let model = GradeModel::new(config).unwrap();
        let targets = [[20.0, 20.0, 0.0], [20.0, 20.0, 500.0]];
        let field = model.run_points(plane_samples(), &targets, &CutoffGrades::new(), None).unwrap();

        assert!((field.points[0].value - 3.0).abs() < 1e-8);
        assert!(field.points[1].value == -1.0);
    }

    #[test]
    fn extrapolation_mask_uses_mask_value() {
        let config = GradeModelConfig {
            extrapolation_limit: ExtrapolationLimit::Distance(15.0),
            mask_value: Some(-9.0),
            ..linear_config()
        };
        let model = GradeModel::new(config).unwrap();
        let targets = [[5.0, 5.0, 0.0], [100.0, 0.0, 0.0]];
        let field = model.run_points(plane_samples(), &targets, &CutoffGrades::new(), None).unwrap();

        assert!(field.points[0].value != -9.0);
        assert!(field.points[1].value == -9.0);
    }

    #[test]
    fn threshold_uses_cutoff_grade_then_median() {
        let config = GradeModelConfig {
            attribute: Some("Au".to_string()),
            threshold: Some(ThresholdConfig { min: None, max: None, use_auto_cutoff: true }),
            ..linear_config()
        };
        let model = GradeModel::new(config).unwrap();
        let targets = [[0.0, 0.0, 0.0], [40.0, 0.0, 0.0]];

        let cutoffs: CutoffGrades = [("au", 2.5)].into_iter().collect();
        let field = model.run_points(plane_samples(), &targets, &cutoffs, None).unwrap();
        assert!(field.cutoff == Some(2.5));
        assert!(field.points[0].excluded);
        assert!(!field.points[1].excluded);

        // sample values 1..=5, median 3
        let field = model.run_points(plane_samples(), &targets, &CutoffGrades::new(), None).unwrap();
        assert!(field.cutoff == Some(3.0));
    }

    #[test]
    fn max_only_threshold_takes_median_as_lower_cutoff() {
        let config = GradeModelConfig {
            threshold: Some(ThresholdConfig { min: None, max: Some(4.5), use_auto_cutoff: false }),
            ..linear_config()
        };
        let model = GradeModel::new(config).unwrap();
        let targets = [[0.0, 0.0, 0.0], [30.0, 0.0, 0.0], [40.0, 0.0, 0.0]];

        let cutoffs: CutoffGrades = [("au", 0.5)].into_iter().collect();
        let field = model.run_points(plane_samples(), &targets, &cutoffs, None).unwrap();
        assert!(field.cutoff == Some(3.0));
        assert!(field.points[0].excluded);
        assert!(!field.points[1].excluded);
        assert!(field.points[2].excluded);
    }

    #[test]
    fn grid_run_fills_scalar_grid() {
        let config = GradeModelConfig {
            threshold: Some(ThresholdConfig { min: Some(2.0), max: None, use_auto_cutoff: false }),
            ..linear_config()
        };
        let model = GradeModel::new(config).unwrap();
        let grid = GridSpec::new([0.0, 0.0, 0.0], [40.0, 40.0, 0.0], [5, 3, 1]).unwrap();
        let field = model.run_grid(plane_samples(), &grid, &CutoffGrades::new(), None).unwrap();

        let scalar = field.grid.unwrap();
        assert!(scalar.values.len() == 15);
        assert!(scalar.get(0, 0, 0).is_nan());
        assert!((scalar.get(4, 2, 0) - 5.0).abs() < 1e-8);
        assert!(field.statistics.unwrap().summary.count == 15);
    }

    #[test]
    fn control_points_shape_fit_but_not_distances() {
        let config = GradeModelConfig {
            control_points: vec![Sample::new([200.0, 0.0, 0.0], 21.0)],
            extrapolation_limit: ExtrapolationLimit::Distance(15.0),
            mask_value: Some(-5.0),
            ..linear_config()
        };
        let model = GradeModel::new(config).unwrap();
        let field = model
            .run_points(plane_samples(), &[[200.0, 0.0, 0.0]], &CutoffGrades::new(), None)
            .unwrap();

        // The control point lies on the plane but is not real data.
        assert!(field.points[0].value == -5.0);
    }

    #[test]
    fn local_mode_and_duplicate_reporting() {
        let config = GradeModelConfig {
            solver_mode: SolverMode::Local(LocalParams::builder(Neighbourhood::Nearest(10)).build()),
            ..linear_config()
        };

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_log = received.clone();
        let (sink, handle) = closure_sink(16, move |msg| {
            if let ProgressMsg::DuplicatesMerged { num_duplicates } = msg {
                sink_log.lock().unwrap().push(num_duplicates);
            }
        });

        let mut samples = plane_samples();
        samples.push(samples[0]);
        let field = GradeModel::new(config)
            .unwrap()
            .with_progress_callback(sink)
            .run_points(samples, &[[12.0, 17.0, 0.0]], &CutoffGrades::new(), None)
            .unwrap();

        assert!(field.solver == SolverKind::Local);
        assert!(field.num_duplicates == 1);
        assert!((field.points[0].value - 2.2).abs() < 1e-8);

        handle.join().unwrap();
        assert!(*received.lock().unwrap() == vec![1]);
    }

    #[test]
    fn cancelled_run_returns_no_field() {
        let token = CancellationToken::new();
        token.cancel();
        let model = GradeModel::new(linear_config()).unwrap();
        let result = model.run_points(plane_samples(), &[[0.0; 3]], &CutoffGrades::new(), Some(&token));
        assert!(matches!(result, Err(GradeModelError::Rbf(RbfError::Cancelled))));
    }

    #[test]
    fn interval_samples_sit_at_mid_depth() {
        let mut desurveyor = Desurveyor::new(DesurveyMethod::MinimumCurvature);
        desurveyor
            .insert_hole(
                Collar::new("DH1", [100.0, 200.0, 50.0]),
                vec![SurveyStation::new(0.0, 0.0, -90.0), SurveyStation::new(100.0, 0.0, -90.0)],
            )
            .unwrap();

        let intervals = vec![AssayInterval { hole_id: "DH1".into(), depth_from: 10.0, depth_to: 20.0, value: 1.2 }];
        let samples = samples_from_intervals(&desurveyor, &intervals).unwrap();
        assert!((samples[0].position[2] - 35.0).abs() < 1e-9);
        assert!(samples[0].value == 1.2);

        let missing = vec![AssayInterval { hole_id: "DH9".into(), ..intervals[0].clone() }];
        assert!(samples_from_intervals(&desurveyor, &missing).is_err());
    }
}
