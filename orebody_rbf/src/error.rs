/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the typed failures raised by desurveying, fitting, evaluation, and model I/O.
//
// Created on: 02 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Error types for every fallible operation in the crate.
//!
//! Each area has its own enum so callers can match on exactly the failures an
//! operation can produce. [`GradeModelError`] wraps all of them for the end-to-end
//! pipeline.

use thiserror::Error;

/// Failures raised while converting collar and survey records into hole traces.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DesurveyError {
    /// Station depths must be strictly increasing down the hole.
    #[error(
        "hole '{hole_id}': survey station {index} at depth {depth} does not follow previous depth {previous_depth}"
    )]
    InvalidSurveyOrder {
        hole_id: String,
        index: usize,
        previous_depth: f64,
        depth: f64,
    },

    /// A station carries a value that cannot describe a direction or depth.
    #[error("hole '{hole_id}': survey station {index} is invalid ({reason})")]
    InvalidSurveyStation {
        hole_id: String,
        index: usize,
        reason: String,
    },

    /// The requested depth lies outside the desurveyed trace.
    #[error("hole '{hole_id}': depth {depth} is outside the desurveyed range [0, {max_depth}]")]
    DepthOutOfRange {
        hole_id: String,
        depth: f64,
        max_depth: f64,
    },

    /// The collar's total depth is shallower than the deepest survey station.
    #[error(
        "hole '{hole_id}': total depth {total_depth} is shallower than the last survey station at {last_station_depth}"
    )]
    InvalidTotalDepth {
        hole_id: String,
        total_depth: f64,
        last_station_depth: f64,
    },

    /// No hole with this identifier has been desurveyed.
    #[error("hole '{hole_id}' has not been desurveyed")]
    UnknownHole { hole_id: String },

    /// Trace resampling needs a finite, positive spacing that keeps the point
    /// count bounded.
    #[error("trace resolution {resolution} is not a usable spacing for this hole")]
    InvalidResolution { resolution: f64 },
}

/// Failures raised while fitting or evaluating an RBF model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RbfError {
    /// A configuration value is outside its valid range.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The interpolation system could not be solved.
    #[error(
        "singular interpolation system of size {size} with smoothing {smoothing}; enable smoothing or remove duplicate samples"
    )]
    SingularSystem { size: usize, smoothing: f64 },

    /// A local neighbourhood holds too few samples to fit.
    #[error("found {found} neighbouring samples but at least {required} are required")]
    InsufficientNeighbours { found: usize, required: usize },

    /// There are no samples to fit.
    #[error("the sample set is empty")]
    EmptySampleSet,

    /// A point or value array has the wrong shape.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The cancellation flag was raised while work was in progress.
    #[error("operation cancelled")]
    Cancelled,
}

/// Failures raised while reading or writing models, configurations, and CSV files.
#[derive(Debug, Error)]
pub enum ModelIOError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("unsupported model version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Top-level error for the grade modelling pipeline.
#[derive(Debug, Error)]
pub enum GradeModelError {
    #[error(transparent)]
    Desurvey(#[from] DesurveyError),

    #[error(transparent)]
    Rbf(#[from] RbfError),

    #[error(transparent)]
    ModelIO(#[from] ModelIOError),
}

/// Result alias for model and configuration I/O.
pub type ModelIOResult<T> = Result<T, ModelIOError>;
