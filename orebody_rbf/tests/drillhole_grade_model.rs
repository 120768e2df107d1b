/////////////////////////////////////////////////////////////////////////////////////////////
//
// End-to-end tests from drill-hole surveys and assays to a thresholded grade grid.
//
// Created on: 08 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use equator::assert;
use orebody_rbf::{
    AssayInterval, Collar, CutoffGrades, DecayDistance, DecayFunction, DecaySettings,
    DesurveyMethod, Desurveyor, Drift, DuplicatePolicy, GradeModel, GradeModelConfig, GridSpec,
    InterpolantSettings, RBFKernelType, SampleSet, SolverMode, SurveyStation, ThresholdConfig,
    labelled_points_to_csv, samples_from_intervals, suggest_settings,
};

fn drill_program() -> Desurveyor {
    let mut desurveyor = Desurveyor::new(DesurveyMethod::MinimumCurvature);
    let vertical = |depth| SurveyStation::new(depth, 0.0, -90.0);

    let summary = desurveyor.desurvey_all(vec![
        (Collar::new("DH1", [0.0, 0.0, 100.0]), vec![vertical(0.0), vertical(100.0)]),
        (
            Collar::new("DH2", [30.0, 0.0, 100.0]),
            vec![SurveyStation::new(0.0, 90.0, -60.0), SurveyStation::new(100.0, 90.0, -60.0)],
        ),
        (Collar::new("DH3", [0.0, 30.0, 100.0]), vec![vertical(0.0), vertical(100.0)]),
        // Stations out of order; reported and skipped.
        (Collar::new("BAD", [50.0, 50.0, 100.0]), vec![vertical(50.0), vertical(10.0)]),
    ]);

    assert!(summary.desurveyed.len() == 3);
    assert!(summary.failed.len() == 1);
    assert!(summary.failed[0].0 == "BAD");
    desurveyor
}

fn assays() -> Vec<AssayInterval> {
    let mut intervals = Vec::new();
    for (offset, hole_id) in [(0.0, "DH1"), (0.5, "DH2"), (1.0, "DH3")] {
        for i in 0..10 {
            let depth_from = i as f64 * 10.0;
            intervals.push(AssayInterval {
                hole_id: hole_id.to_string(),
                depth_from,
                depth_to: depth_from + 10.0,
                value: 0.5 + offset + (depth_from + 5.0) / 50.0,
            });
        }
    }
    intervals
}

fn config() -> GradeModelConfig {
    GradeModelConfig {
        attribute: Some("Cu".to_string()),
        interpolant: InterpolantSettings::builder(RBFKernelType::ThinPlateSpline)
            .drift(Drift::Linear)
            .build(),
        solver_mode: SolverMode::Global,
        decay: Some(DecaySettings {
            distance: DecayDistance::Fixed(40.0),
            background_value: 0.0,
            decay_function: DecayFunction::Smooth,
        }),
        threshold: Some(ThresholdConfig { min: Some(1.05), max: None, use_auto_cutoff: true }),
        ..Default::default()
    }
}

#[test]
fn assays_are_honoured_at_their_positions() {
    let samples = samples_from_intervals(&drill_program(), &assays()).unwrap();
    assert!(samples.len() == 30);

    let targets: Vec<[f64; 3]> = samples.iter().map(|s| s.position).collect();
    let field = GradeModel::new(config())
        .unwrap()
        .run_points(samples.clone(), &targets, &CutoffGrades::new(), None)
        .unwrap();

    for (point, sample) in field.points.iter().zip(&samples) {
        assert!((point.value - sample.value).abs() < 1e-6);
        assert!(point.excluded == (sample.value < 1.05));
    }
}

#[test]
fn grid_is_bounded_and_labelled() {
    let samples = samples_from_intervals(&drill_program(), &assays()).unwrap();
    let (set, _) = SampleSet::new(samples.clone(), DuplicatePolicy::Average).unwrap();
    let spec = GridSpec::around_samples(&set, [6, 6, 6], 0.1).unwrap();

    let cutoffs: CutoffGrades = [("CU", 1.5)].into_iter().collect();
    let field = GradeModel::new(config())
        .unwrap()
        .run_grid(samples, &spec, &cutoffs, None)
        .unwrap();

    assert!(field.cutoff == Some(1.5));
    assert!(field.points.len() == 216);
    assert!(field.points.iter().all(|p| p.value.is_finite()));
    assert!(field.points.iter().filter(|p| !p.excluded).all(|p| p.value >= 1.5));
    assert!(field.points.iter().any(|p| p.excluded));

    let grid = field.grid.unwrap();
    for (value, point) in grid.values.iter().zip(&field.points) {
        assert!(value.is_nan() == point.excluded);
    }

    let path = std::env::temp_dir().join(format!("orebody_rbf_grid_{}.csv", std::process::id()));
    labelled_points_to_csv(&path, &field.points).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(text.lines().count() == 217);
}

#[test]
fn suggested_settings_drive_a_model() {
    let samples = samples_from_intervals(&drill_program(), &assays()).unwrap();
    let (set, _) = SampleSet::new(samples.clone(), DuplicatePolicy::Average).unwrap();

    let suggested = suggest_settings(&set).unwrap();
    assert!((suggested.mean_spacing - 10.0).abs() < 1e-6);
    assert!(suggested.interpolant.kernel_type == RBFKernelType::ThinPlateSpline);

    let config = GradeModelConfig {
        interpolant: InterpolantSettings { drift: Drift::Linear, ..suggested.interpolant },
        decay: Some(suggested.decay),
        threshold: Some(suggested.threshold),
        solver_mode: SolverMode::Global,
        ..Default::default()
    };

    let path = std::env::temp_dir().join(format!("orebody_rbf_suggested_{}.json", std::process::id()));
    config.to_json_file(&path).unwrap();
    let model = GradeModel::from_json_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(model.config().interpolant.drift == Drift::Linear);
    assert!(model.config().decay.is_some());

    let field = model
        .run_points(samples, &[[0.0, 0.0, 50.0], [500.0, 500.0, 500.0]], &CutoffGrades::new(), None)
        .unwrap();
    // far from every hole the value has decayed to the background and is cut
    assert!(field.points[1].value == 0.0);
    assert!(field.points[1].excluded);
}
