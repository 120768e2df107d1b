/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements local RBF evaluation over per-query neighbourhoods of the sample set.
//
// Created on: 05 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Local RBF evaluation.
//!
//! Instead of one `N × N` system over every sample, each query point gathers its
//! neighbourhood from a [`NeighbourIndex`], fits a small system on just those
//! samples and evaluates it. The result is not globally smooth, but the cost per
//! query is bounded by the neighbourhood size and queries are independent, so
//! batches run in parallel.
//!
//! A query with fewer neighbours than required never attempts a degenerate solve.
//! It returns the [`LocalFallback::Background`] value or fails with
//! [`RbfError::InsufficientNeighbours`], as configured.

use std::sync::Arc;

use faer::Mat;
use orebody_rbf_utils::{KernelParams, get_a_matrix_symmetric_solver};

use crate::{
    cancel::CancellationToken,
    config::{EvaluationParams, LocalFallback, LocalParams, Neighbourhood},
    error::RbfError,
    interpolant_config::InterpolantSettings,
    metric::AnisotropicMetric,
    neighbours::{Neighbour, NeighbourIndex},
    progress::ProgressSink,
    rbf::{evaluate_in_chunks, mat_to_points, points_to_mat, solve_kernel_system},
    samples::SampleSet,
};

/// Fewest neighbours a local system needs under these settings.
pub fn required_neighbours(settings: &InterpolantSettings, params: &LocalParams) -> usize {
    params
        .min_neighbours
        .max(settings.drift.basis_size() + 1)
        .max(1)
}

/// Fits an RBF system on the neighbourhood of `point` and evaluates it there.
///
/// `index` must have been built over `samples`, in the same order.
pub fn evaluate_local(
    settings: &InterpolantSettings,
    samples: &SampleSet,
    index: &NeighbourIndex,
    point: &[f64; 3],
    params: &LocalParams,
) -> Result<f64, RbfError> {
    settings.validate()?;
    params.validate()?;

    if index.len() != samples.len() {
        return Err(RbfError::DimensionMismatch { expected: samples.len(), found: index.len() });
    }

    let neighbours = gather(index, point, &params.neighbourhood);

    let required = required_neighbours(settings, params);
    if neighbours.len() < required {
        return match params.fallback {
            LocalFallback::Background(value) => Ok(value),
            LocalFallback::Error => Err(RbfError::InsufficientNeighbours {
                found: neighbours.len(),
                required,
            }),
        };
    }

    let metric = index.metric();
    let local: Vec<_> = neighbours.iter().map(|n| &samples.samples()[n.index]).collect();

    let centres: Vec<[f64; 3]> = local.iter().map(|s| metric.transform_point(&s.position)).collect();
    let values: Vec<f64> = local.iter().map(|s| s.value).collect();
    let diagonal: Vec<f64> = local
        .iter()
        .map(|s| settings.smoothing / s.effective_weight())
        .collect();

    let centres_mat = points_to_mat(&centres);
    let kernel: KernelParams = (*settings).into();
    let kernel_matrix = get_a_matrix_symmetric_solver(&centres_mat, &kernel, &diagonal);

    let (system, _) = solve_kernel_system(kernel_matrix, &centres_mat, &values, settings)?;

    Ok(system.evaluate_transformed(&centres, &kernel, &metric.transform_point(point)))
}

fn gather(index: &NeighbourIndex, point: &[f64; 3], neighbourhood: &Neighbourhood) -> Vec<Neighbour> {
    match *neighbourhood {
        Neighbourhood::Nearest(k) => index.query_knn(point, k),
        Neighbourhood::Radius(r) => index.query_radius(point, r),
    }
}

/// A sample set prepared for local RBF evaluation.
///
/// Holds the samples and their neighbour index. Nothing is solved until a point
/// is evaluated.
#[derive(Debug, Clone)]
pub struct LocalInterpolator {
    settings: InterpolantSettings,
    params: LocalParams,
    samples: SampleSet,
    index: NeighbourIndex,
    evaluation: EvaluationParams,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl LocalInterpolator {
    /// Validates the parameters and indexes the samples under `metric`.
    pub fn new(
        samples: SampleSet,
        settings: InterpolantSettings,
        metric: &AnisotropicMetric,
        params: LocalParams,
    ) -> Result<Self, RbfError> {
        settings.validate()?;
        params.validate()?;
        if samples.is_empty() {
            return Err(RbfError::EmptySampleSet);
        }

        let index = NeighbourIndex::build(&samples, metric);

        tracing::debug!(
            num_samples = samples.len(),
            neighbourhood = ?params.neighbourhood,
            required = required_neighbours(&settings, &params),
            "prepared local RBF interpolator"
        );

        Ok(Self {
            settings,
            params,
            samples,
            index,
            evaluation: EvaluationParams::default(),
            progress_callback: None,
        })
    }

    /// Sets the batch evaluation parameters.
    pub fn with_evaluation_params(mut self, evaluation: EvaluationParams) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Installs a progress sink for subsequent evaluations.
    pub fn set_progress_callback(&mut self, progress_callback: Option<Arc<dyn ProgressSink>>) {
        self.progress_callback = progress_callback;
    }

    pub fn settings(&self) -> &InterpolantSettings {
        &self.settings
    }

    pub fn params(&self) -> &LocalParams {
        &self.params
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// The neighbour index over the samples.
    pub fn index(&self) -> &NeighbourIndex {
        &self.index
    }

    /// Evaluates a single world position.
    pub fn evaluate_point(&self, point: &[f64; 3]) -> Result<f64, RbfError> {
        evaluate_local(&self.settings, &self.samples, &self.index, point, &self.params)
    }

    /// Evaluates each world position, polling `cancel` between chunks.
    pub fn evaluate_points(
        &self,
        points: &[[f64; 3]],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<f64>, RbfError> {
        evaluate_in_chunks(
            points,
            &self.evaluation,
            cancel,
            self.progress_callback.as_ref(),
            |chunk| chunk.iter().map(|p| self.evaluate_point(p)).collect(),
        )
    }

    /// Evaluates each row of an `(n, 3)` matrix.
    pub fn evaluate(&self, target_points: &Mat<f64>) -> Result<Mat<f64>, RbfError> {
        let points = mat_to_points(target_points)?;
        let values = self.evaluate_points(&points, None)?;
        Ok(Mat::from_fn(values.len(), 1, |i, _| values[i]))
    }
}
