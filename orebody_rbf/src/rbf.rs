/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the global RBF model, system assembly and solution, evaluation, and persistence.
//
// Created on: 04 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use faer::Mat;
use orebody_rbf_utils::{KernelParams, get_a_matrix, kernel_phi};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    cancel::{self, CancellationToken},
    config::EvaluationParams,
    error::{ModelIOError, ModelIOResult, RbfError},
    interpolant_config::InterpolantSettings,
    linalg::{self, Factorisation},
    metric::AnisotropicMetric,
    polynomials::DriftBasis,
    progress::{ProgressMsg, ProgressSink, fraction},
    samples::SampleSet,
};

/// Kernel matrix rows assembled per task. Cancellation is polled between blocks.
const ASSEMBLY_BLOCK_ROWS: usize = 64;

const JSON_FORMAT_NAME: &str = "orebody_rbf.json";
const JSON_VERSION: u32 = 1;

/// Coefficients of a solved RBF system, together with the drift basis they
/// belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FittedSystem {
    pub(crate) point_coefficients: Vec<f64>,
    pub(crate) drift: DriftBasis,
    pub(crate) poly_coefficients: Vec<f64>,
}

impl FittedSystem {
    /// Evaluates the fitted interpolant at a point already in metric space.
    pub(crate) fn evaluate_transformed(
        &self,
        centres: &[[f64; 3]],
        kernel: &KernelParams,
        point: &[f64; 3],
    ) -> f64 {
        let radial: f64 = centres
            .iter()
            .zip(&self.point_coefficients)
            .map(|(c, w)| w * kernel_phi(euclidean(point, c), kernel))
            .sum();

        let drift: f64 = self
            .drift
            .evaluate_point(point)
            .iter()
            .zip(&self.poly_coefficients)
            .map(|(p, c)| p * c)
            .sum();

        radial + drift
    }
}

/// Augments a kernel matrix (diagonal terms already added) with the drift
/// columns and solves it for `values`.
pub(crate) fn solve_kernel_system(
    kernel_matrix: Mat<f64>,
    centres: &Mat<f64>,
    values: &[f64],
    settings: &InterpolantSettings,
) -> Result<(FittedSystem, Factorisation), RbfError> {
    let n = centres.nrows();
    let drift = DriftBasis::new(centres, settings.drift);
    let m = drift.len();

    let system = match m {
        0 => kernel_matrix,
        _ => {
            let p = drift.evaluate(centres);
            let mut a = Mat::<f64>::zeros(n + m, n + m);
            a.submatrix_mut(0, 0, n, n).copy_from(&kernel_matrix);
            a.submatrix_mut(0, n, n, m).copy_from(&p);
            a.submatrix_mut(n, 0, m, n).copy_from(p.transpose());
            a
        }
    };

    let rhs = Mat::from_fn(n + m, 1, |i, _| if i < n { values[i] } else { 0.0 });

    // The saddle-point system [K P; Pᵀ 0] is never positive definite.
    let (solution, factorisation) = linalg::solve_system(&system, &rhs, m == 0, settings.smoothing)?;

    let fitted = FittedSystem {
        point_coefficients: (0..n).map(|i| solution[(i, 0)]).collect(),
        poly_coefficients: (n..n + m).map(|i| solution[(i, 0)]).collect(),
        drift,
    };

    Ok((fitted, factorisation))
}

/// Per-sample diagonal regularisation: the smoothing divided by each weight.
pub(crate) fn smoothing_diagonal(samples: &SampleSet, smoothing: f64) -> Vec<f64> {
    samples.iter().map(|s| smoothing / s.effective_weight()).collect()
}

pub(crate) fn points_to_mat(points: &[[f64; 3]]) -> Mat<f64> {
    Mat::from_fn(points.len(), 3, |i, j| points[i][j])
}

pub(crate) fn mat_to_points(points: &Mat<f64>) -> Result<Vec<[f64; 3]>, RbfError> {
    if points.ncols() != 3 {
        return Err(RbfError::DimensionMismatch { expected: 3, found: points.ncols() });
    }
    Ok((0..points.nrows())
        .map(|i| [points[(i, 0)], points[(i, 1)], points[(i, 2)]])
        .collect())
}

#[inline]
fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let (dx, dy, dz) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Evaluates `points` chunk by chunk, polling `cancel` and reporting progress
/// between chunks.
pub(crate) fn evaluate_in_chunks<F>(
    points: &[[f64; 3]],
    params: &EvaluationParams,
    cancel: Option<&CancellationToken>,
    progress: Option<&Arc<dyn ProgressSink>>,
    eval_chunk: F,
) -> Result<Vec<f64>, RbfError>
where
    F: Fn(&[[f64; 3]]) -> Result<Vec<f64>, RbfError> + Sync,
{
    let total_points = points.len();
    let done = AtomicUsize::new(0);

    let run = |chunk: &[[f64; 3]]| -> Result<Vec<f64>, RbfError> {
        cancel::check(cancel)?;
        let values = eval_chunk(chunk)?;

        let points_done = done.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
        if let Some(sink) = progress {
            sink.emit(ProgressMsg::Evaluation {
                points_done,
                total_points,
                progress: fraction(points_done, total_points),
            });
        }
        Ok(values)
    };

    let chunk_size = params.effective_chunk_size();
    let chunks: Vec<Vec<f64>> = match params.parallel {
        true => points.par_chunks(chunk_size).map(&run).collect::<Result<_, _>>()?,
        false => points.chunks(chunk_size).map(&run).collect::<Result<_, _>>()?,
    };

    Ok(chunks.into_iter().flatten().collect())
}

/// Builds the dense kernel matrix over `centres` in row blocks, adding
/// `diagonal[i]` to entry `(i, i)`.
fn assemble_kernel_matrix(
    centres: &Mat<f64>,
    kernel: &KernelParams,
    diagonal: &[f64],
    cancel: Option<&CancellationToken>,
    progress: Option<&Arc<dyn ProgressSink>>,
) -> Result<Mat<f64>, RbfError> {
    let n = centres.nrows();
    let done = AtomicUsize::new(0);

    let starts: Vec<usize> = (0..n).step_by(ASSEMBLY_BLOCK_ROWS).collect();
    let blocks = starts
        .par_iter()
        .map(|&start| {
            cancel::check(cancel)?;

            let rows = ASSEMBLY_BLOCK_ROWS.min(n - start);
            let targets = centres.subrows(start, rows).to_owned();
            let block = get_a_matrix(&targets, centres, kernel);

            let rows_done = done.fetch_add(rows, Ordering::Relaxed) + rows;
            if let Some(sink) = progress {
                sink.emit(ProgressMsg::MatrixAssembly {
                    rows_done,
                    total_rows: n,
                    progress: fraction(rows_done, n),
                });
            }
            Ok((start, block))
        })
        .collect::<Result<Vec<_>, RbfError>>()?;

    let mut a = Mat::<f64>::zeros(n, n);
    for (start, block) in blocks {
        a.subrows_mut(start, block.nrows()).copy_from(&block);
    }
    for (i, d) in diagonal.iter().enumerate() {
        a[(i, i)] += d;
    }

    Ok(a)
}

/// Fits a global RBF model.
///
/// Builds the `N × N` kernel matrix over the samples under `metric`, adds the
/// (weight-scaled) smoothing to its diagonal, augments it with the drift
/// columns and solves for the coefficients. `cancel` is polled between blocks of
/// matrix rows. A cancelled or failed fit returns no model.
pub fn fit(
    samples: &SampleSet,
    settings: &InterpolantSettings,
    metric: &AnisotropicMetric,
    cancel: Option<&CancellationToken>,
) -> Result<RBFModel, RbfError> {
    RBFModel::fit_with(samples.clone(), *settings, metric.clone(), EvaluationParams::default(), cancel, None)
}

/// A convenience builder for fitting an [`RBFModel`].
///
/// The builder should be called via the [`RBFModel::builder`] method.
pub struct RBFModelBuilder {
    samples: SampleSet,
    settings: InterpolantSettings,
    metric: AnisotropicMetric,
    params: EvaluationParams,
    cancellation: Option<CancellationToken>,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl RBFModelBuilder {
    fn new(samples: SampleSet, settings: InterpolantSettings) -> Self {
        Self {
            samples,
            settings,
            metric: AnisotropicMetric::euclidean(),
            params: EvaluationParams::default(),
            cancellation: None,
            progress_callback: None,
        }
    }

    /// Sets the distance metric. Defaults to Euclidean.
    pub fn metric(mut self, metric: AnisotropicMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the batch evaluation parameters.
    pub fn params(mut self, params: EvaluationParams) -> Self {
        self.params = params;
        self
    }

    /// Token polled while the system is assembled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Optional callback for reporting progress.
    ///
    /// Skipped during serialization.
    pub fn progress_callback(mut self, progress_callback: Arc<dyn ProgressSink>) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    /// Fits and returns the model.
    pub fn build(self) -> Result<RBFModel, RbfError> {
        RBFModel::fit_with(
            self.samples,
            self.settings,
            self.metric,
            self.params,
            self.cancellation.as_ref(),
            self.progress_callback,
        )
    }
}

/// A fitted global RBF interpolant.
///
/// Immutable once fitted, and safe to evaluate from many threads at once.
/// Changing any parameter means fitting a new model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RBFModel {
    settings: InterpolantSettings,

    /// Ellipsoid defining the distance used by the kernel.
    metric: AnisotropicMetric,

    samples: SampleSet,

    /// Sample positions mapped into metric space.
    centres: Vec<[f64; 3]>,

    system: FittedSystem,

    #[serde(default)]
    params: EvaluationParams,

    #[serde(skip, default)]
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl RBFModel {
    /// Creates a new [`RBFModelBuilder`] for the given samples and settings.
    pub fn builder(samples: SampleSet, settings: InterpolantSettings) -> RBFModelBuilder {
        RBFModelBuilder::new(samples, settings)
    }

    fn fit_with(
        samples: SampleSet,
        settings: InterpolantSettings,
        metric: AnisotropicMetric,
        params: EvaluationParams,
        cancel: Option<&CancellationToken>,
        progress_callback: Option<Arc<dyn ProgressSink>>,
    ) -> Result<Self, RbfError> {
        let fit_start = Instant::now();

        settings.validate()?;
        if samples.is_empty() {
            return Err(RbfError::EmptySampleSet);
        }
        cancel::check(cancel)?;

        if settings.drift < settings.kernel_type.minimum_drift() {
            tracing::debug!(
                kernel = ?settings.kernel_type,
                drift = ?settings.drift,
                minimum = ?settings.kernel_type.minimum_drift(),
                "drift is below the kernel's minimum; solvability depends on sample geometry"
            );
        }

        let centres: Vec<[f64; 3]> = samples.iter().map(|s| metric.transform_point(&s.position)).collect();
        let centres_mat = points_to_mat(&centres);
        let kernel: KernelParams = settings.into();

        let kernel_matrix = assemble_kernel_matrix(
            &centres_mat,
            &kernel,
            &smoothing_diagonal(&samples, settings.smoothing),
            cancel,
            progress_callback.as_ref(),
        )?;
        cancel::check(cancel)?;

        let (system, factorisation) =
            solve_kernel_system(kernel_matrix, &centres_mat, &samples.values(), &settings)?;

        tracing::info!(
            num_samples = samples.len(),
            kernel = ?settings.kernel_type,
            drift_terms = system.drift.len(),
            ?factorisation,
            elapsed_ms = fit_start.elapsed().as_millis() as u64,
            "fitted global RBF model"
        );

        Ok(Self {
            settings,
            metric,
            samples,
            centres,
            system,
            params,
            progress_callback,
        })
    }

    /// The kernel, shape, smoothing and drift settings.
    pub fn settings(&self) -> &InterpolantSettings {
        &self.settings
    }

    /// The metric distances are measured under.
    pub fn metric(&self) -> &AnisotropicMetric {
        &self.metric
    }

    /// The samples the model was fitted on.
    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// Coefficients of the radial terms, one per sample.
    pub fn point_coefficients(&self) -> &[f64] {
        &self.system.point_coefficients
    }

    /// Coefficients of the retained drift monomials.
    pub fn poly_coefficients(&self) -> &[f64] {
        &self.system.poly_coefficients
    }

    /// Batch evaluation parameters.
    pub fn params(&self) -> &EvaluationParams {
        &self.params
    }

    /// Installs a progress sink for subsequent evaluations.
    pub fn set_progress_callback(&mut self, progress_callback: Option<Arc<dyn ProgressSink>>) {
        self.progress_callback = progress_callback;
    }

    fn kernel(&self) -> KernelParams {
        self.settings.into()
    }

    /// Evaluates the interpolant at a single world position.
    pub fn evaluate_point(&self, point: &[f64; 3]) -> f64 {
        let t = self.metric.transform_point(point);
        self.system.evaluate_transformed(&self.centres, &self.kernel(), &t)
    }

    /// Evaluates the interpolant at each row of an `(n, 3)` matrix.
    ///
    /// ### Returns
    /// A `(n, 1)` matrix of interpolated values.
    pub fn evaluate(&self, target_points: &Mat<f64>) -> Result<Mat<f64>, RbfError> {
        self.evaluate_with_cancellation(target_points, None)
    }

    /// As [`evaluate`](Self::evaluate), polling `cancel` between chunks.
    pub fn evaluate_with_cancellation(
        &self,
        target_points: &Mat<f64>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Mat<f64>, RbfError> {
        let points = mat_to_points(target_points)?;
        let values = self.evaluate_points(&points, cancel)?;
        Ok(Mat::from_fn(values.len(), 1, |i, _| values[i]))
    }

    /// Evaluates the interpolant at each world position.
    pub fn evaluate_points(
        &self,
        points: &[[f64; 3]],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<f64>, RbfError> {
        let centres = points_to_mat(&self.centres);
        let (coefficients, poly) = self.coefficient_columns();

        evaluate_in_chunks(points, &self.params, cancel, self.progress_callback.as_ref(), |chunk| {
            let transformed: Vec<[f64; 3]> = chunk.iter().map(|p| self.metric.transform_point(p)).collect();
            Ok(self.evaluate_chunk(&centres, &coefficients, &poly, &transformed))
        })
    }

    /// Evaluates the interpolant at the training positions.
    ///
    /// With `add_smoothing` the diagonal smoothing term is added back, so the
    /// result reproduces the sample values to solver precision. Without it you
    /// observe the smoothed fit.
    pub fn evaluate_at_source(&self, add_smoothing: bool) -> Vec<f64> {
        let centres = points_to_mat(&self.centres);
        let (coefficients, poly) = self.coefficient_columns();

        let mut values: Vec<f64> = self
            .centres
            .chunks(self.params.effective_chunk_size())
            .flat_map(|chunk| self.evaluate_chunk(&centres, &coefficients, &poly, chunk))
            .collect();

        if add_smoothing {
            let diagonal = smoothing_diagonal(&self.samples, self.settings.smoothing);
            values
                .iter_mut()
                .zip(diagonal.iter().zip(&self.system.point_coefficients))
                .for_each(|(v, (d, w))| *v += d * w);
        }

        values
    }

    fn coefficient_columns(&self) -> (Mat<f64>, Mat<f64>) {
        let w = &self.system.point_coefficients;
        let c = &self.system.poly_coefficients;
        (
            Mat::from_fn(w.len(), 1, |i, _| w[i]),
            Mat::from_fn(c.len(), 1, |i, _| c[i]),
        )
    }

    fn evaluate_chunk(
        &self,
        centres: &Mat<f64>,
        coefficients: &Mat<f64>,
        poly: &Mat<f64>,
        transformed: &[[f64; 3]],
    ) -> Vec<f64> {
        let targets = points_to_mat(transformed);
        let mut values = get_a_matrix(&targets, centres, &self.kernel()) * coefficients;

        if !self.system.drift.is_empty() {
            values += self.system.drift.evaluate(&targets) * poly;
        }

        (0..values.nrows()).map(|i| values[(i, 0)]).collect()
    }

    /// Save this model to a **JSON envelope** `{ format, version, model }`.
    ///
    /// Files produced here are intended to be read back with [`RBFModel::load_model`].
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> ModelIOResult<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);

        let env = JsonEnvelopeRef {
            format: JSON_FORMAT_NAME,
            version: JSON_VERSION,
            model: self,
        };

        serde_json::to_writer_pretty(&mut w, &env)?;
        w.flush()?;
        Ok(())
    }

    /// Load a model from a versioned **JSON envelope**, validating format and version.
    ///
    /// If `progress` is `Some`, the sink is installed on the returned model.
    pub fn load_model<P: AsRef<Path>>(
        path: P,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> ModelIOResult<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let env: JsonEnvelopeOwned<Self> = serde_json::from_reader(reader)?;

        if env.format != JSON_FORMAT_NAME {
            return Err(ModelIOError::InvalidFormat(format!(
                "expected format '{JSON_FORMAT_NAME}', found '{}'",
                env.format
            )));
        }
        if env.version != JSON_VERSION {
            return Err(ModelIOError::UnsupportedVersion {
                found: env.version,
                expected: JSON_VERSION,
            });
        }

        let mut model = env.model;
        model.check_consistency()?;
        model.progress_callback = progress;
        Ok(model)
    }

    fn check_consistency(&self) -> ModelIOResult<()> {
        let n = self.samples.len();
        if self.centres.len() != n || self.system.point_coefficients.len() != n {
            return Err(ModelIOError::InvalidFormat(format!(
                "{n} samples but {} centres and {} coefficients",
                self.centres.len(),
                self.system.point_coefficients.len()
            )));
        }
        if self.system.poly_coefficients.len() != self.system.drift.len() {
            return Err(ModelIOError::InvalidFormat(format!(
                "{} drift terms but {} drift coefficients",
                self.system.drift.len(),
                self.system.poly_coefficients.len()
            )));
        }
        Ok(())
    }
}

/// Borrowing envelope for SAVE (no clone of the model).
#[derive(Serialize)]
struct JsonEnvelopeRef<'a, T: ?Sized> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    model: &'a T,
}

/// Owning envelope for LOAD.
#[derive(Deserialize)]
struct JsonEnvelopeOwned<T> {
    format: String,
    version: u32,
    #[serde(flatten)]
    model: T,
}
