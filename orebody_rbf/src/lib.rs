/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for drill-hole grade modelling.
//
// Created on: 02 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Drill-hole desurveying and anisotropic RBF grade modelling.
//!
//! This crate turns drill-hole surveys and assays into bounded 3D grade fields:
//!
//! - **Desurveying** converts a collar and its ordered survey stations into a 3D
//!   trace by minimum curvature (tangential and average-angle are also available)
//!   and locates samples by depth along the hole.
//! - **Anisotropic metric**: an oriented search ellipsoid defines a linear
//!   transform. Points are transformed once, after which every distance is plain
//!   Euclidean distance in the transformed space.
//! - **Neighbour index**: a kd-tree over transformed sample positions answering
//!   radius and k-nearest queries.
//! - **RBF solver**: a global dense system over every sample, or small local
//!   systems over the neighbourhood of each query point, with eight radial kernels,
//!   smoothing, sample weights, and an optional polynomial drift.
//! - **Post-processing**: distance decay towards a background value, a hard
//!   extrapolation limit, and min/max/cutoff-grade thresholding.
//!
//! [`GradeModel`] runs the whole chain for a set of target points or a grid.
//!
//! Coordinates are East, North, Up. Azimuths are degrees clockwise from North and
//! dips are negative downwards.
//!
//! # Examples
//!
//! ```
//! use orebody_rbf::{
//!     AnisotropicMetric, DecayConfig, DecayFunction, DuplicatePolicy, Ellipsoid,
//!     InterpolantSettings, RBFKernelType, RBFModel, Sample, SampleSet, apply_decay,
//! };
//!
//! let samples = vec![
//!     Sample::new([0.0, 0.0, 0.0], 1.0),
//!     Sample::new([10.0, 0.0, 0.0], 2.0),
//!     Sample::new([0.0, 10.0, 0.0], 3.0),
//!     Sample::new([0.0, 0.0, -10.0], 4.0),
//! ];
//! let (samples, _) = SampleSet::new(samples, DuplicatePolicy::Average).unwrap();
//!
//! // Stretch distances along a north-striking, 30 degree dipping structure.
//! let ellipsoid = Ellipsoid::new(50.0, 25.0, 5.0, 0.0, -30.0, 0.0);
//! let metric = AnisotropicMetric::new(&ellipsoid);
//!
//! let settings = InterpolantSettings::builder(RBFKernelType::Linear).build();
//! let model = RBFModel::builder(samples, settings).metric(metric).build().unwrap();
//!
//! // The fit is exact at the samples.
//! assert!((model.evaluate_point(&[10.0, 0.0, 0.0]) - 2.0).abs() < 1e-8);
//!
//! // Far from the data the estimate blends into the background.
//! let decay = DecayConfig::new(20.0, 0.0, DecayFunction::Smooth);
//! let raw = model.evaluate_point(&[200.0, 0.0, 0.0]);
//! assert!(apply_decay(raw, 190.0, &decay) == 0.0);
//! ```
pub mod cancel;

pub mod config;

pub mod desurvey;

pub mod error;

pub mod grid;

pub mod interpolant_config;

mod linalg;

pub mod local;

pub mod metric;

pub mod neighbours;

pub mod pipeline;

mod polynomials;

pub mod postprocess;

pub mod progress;

mod rbf;

pub mod samples;

pub mod statistics;

pub use {
    cancel::CancellationToken,
    config::{
        CutoffGrades, EvaluationParams, GradeModelConfig, LocalFallback, LocalParams,
        Neighbourhood, SolverMode,
    },
    desurvey::{
        Collar, DesurveyMethod, DesurveySummary, DesurveyedPoint, Desurveyor, IntervalPosition,
        SurveyStation, desurvey, desurvey_with_method,
    },
    error::{DesurveyError, GradeModelError, ModelIOError, RbfError},
    grid::{
        GridSpec, LabelledPoint, ScalarGrid, labelled_points_to_csv, samples_from_csv,
    },
    interpolant_config::{Drift, InterpolantSettings, RBFKernelType},
    local::{LocalInterpolator, evaluate_local},
    metric::{AnisotropicMetric, Ellipsoid},
    neighbours::{Neighbour, NeighbourIndex},
    pipeline::{AssayInterval, GradeField, GradeModel, SolverKind, samples_from_intervals},
    postprocess::{
        DecayConfig, DecayDistance, DecayFunction, DecaySettings, ExtrapolationLimit,
        ThresholdConfig, Thresholded, apply_decay, apply_threshold,
    },
    progress::{ProgressMsg, ProgressSink, closure_sink},
    rbf::{RBFModel, RBFModelBuilder, fit},
    samples::{DuplicatePolicy, Sample, SampleSet},
    statistics::{SuggestedSettings, ValueSummary, suggest_settings},
};
