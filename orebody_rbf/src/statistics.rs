/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements value summaries, grid statistics logging, and data-driven parameter suggestions.
//
// Created on: 06 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};

use crate::{
    error::RbfError,
    interpolant_config::{InterpolantSettings, RBFKernelType},
    metric::AnisotropicMetric,
    neighbours::NeighbourIndex,
    postprocess::{DecayDistance, DecayFunction, DecaySettings, ThresholdConfig},
    samples::SampleSet,
};

/// Share of grid values above the cutoff beyond which the shell is likely too large.
pub const HIGH_FRACTION_ABOVE_CUTOFF: f64 = 0.9;

/// Share of grid values above the cutoff below which the shell is likely empty.
pub const LOW_FRACTION_ABOVE_CUTOFF: f64 = 0.01;

/// Percentile of sorted values with linear interpolation between closest ranks.
///
/// `q` is in `[0, 100]`. Returns `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let t = rank - lo as f64;
    Some(sorted[lo] + t * (sorted[hi] - sorted[lo]))
}

/// Percentile of the finite entries of `values`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    percentile_sorted(&sorted_finite(values), q)
}

/// Median of the finite entries of `values`.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Descriptive statistics of a set of values. Non-finite entries are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

impl ValueSummary {
    /// Summarises the finite entries of `values`, or `None` if there are none.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted_finite(values);
        let count = sorted.len();
        if count == 0 {
            return None;
        }

        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let p = |q| percentile_sorted(&sorted, q).unwrap_or(f64::NAN);

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            std_dev: variance.sqrt(),
            p10: p(10.0),
            p25: p(25.0),
            p50: p(50.0),
            p75: p(75.0),
            p90: p(90.0),
        })
    }

    pub fn median(&self) -> f64 {
        self.p50
    }

    /// Coefficient of variation, `std / mean`. Taken as 1 when the mean is not positive.
    pub fn coefficient_of_variation(&self) -> f64 {
        match self.mean > 0.0 {
            true => self.std_dev / self.mean,
            false => 1.0,
        }
    }

    /// Pearson's second skewness indicator without the factor of 3,
    /// `(mean - median) / std`. Zero for constant data.
    pub fn skew_indicator(&self) -> f64 {
        match self.std_dev > 0.0 {
            true => (self.mean - self.p50) / self.std_dev,
            false => 0.0,
        }
    }
}

/// Distribution of evaluated grid values against a cutoff grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStatistics {
    pub summary: ValueSummary,
    pub cutoff: Option<f64>,
    /// Share of finite values at or above the cutoff.
    pub fraction_above: Option<f64>,
}

impl GridStatistics {
    /// Summarises `values` (NaN entries, such as excluded nodes, are skipped).
    pub fn new(values: &[f64], cutoff: Option<f64>) -> Option<Self> {
        let summary = ValueSummary::from_values(values)?;
        let fraction_above = cutoff.map(|c| {
            let above = values.iter().filter(|v| v.is_finite() && **v >= c).count();
            above as f64 / summary.count as f64
        });
        Some(Self { summary, cutoff, fraction_above })
    }

    /// Logs the summary, warning when the cutoff leaves almost all or almost none
    /// of the grid above it.
    pub fn log(&self) {
        let s = &self.summary;
        tracing::info!(
            count = s.count,
            min = s.min,
            max = s.max,
            mean = s.mean,
            p10 = s.p10,
            p25 = s.p25,
            p50 = s.p50,
            p75 = s.p75,
            p90 = s.p90,
            "grid value distribution"
        );

        let (Some(cutoff), Some(fraction)) = (self.cutoff, self.fraction_above) else {
            return;
        };
        let percent_above = 100.0 * fraction;
        if fraction > HIGH_FRACTION_ABOVE_CUTOFF {
            tracing::warn!(cutoff, percent_above, "most of the grid is above the cutoff; consider raising it");
        } else if fraction < LOW_FRACTION_ABOVE_CUTOFF {
            tracing::warn!(cutoff, percent_above, "almost none of the grid is above the cutoff; consider lowering it");
        } else {
            tracing::info!(cutoff, percent_above, "grid nodes above cutoff");
        }
    }
}

/// Summarises and logs grid values against a cutoff.
pub fn log_grid_statistics(values: &[f64], cutoff: Option<f64>) -> Option<GridStatistics> {
    let stats = GridStatistics::new(values, cutoff);
    match &stats {
        Some(stats) => stats.log(),
        None => tracing::warn!("grid holds no finite values"),
    }
    stats
}

/// Starting parameters derived from a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuggestedSettings {
    pub interpolant: InterpolantSettings,
    pub threshold: ThresholdConfig,
    pub decay: DecaySettings,
    /// Suggested grid nodes along each axis.
    pub grid_nodes: usize,
    /// Mean distance from each sample to its nearest neighbour.
    pub mean_spacing: f64,
    pub summary: ValueSummary,
}

/// Derives starting parameters from the values and spacing of `samples`.
///
/// - Kernel: thin plate spline, with `ε = max(1, spacing / 10)`.
/// - Smoothing: 0.5 when the coefficient of variation exceeds 2, 0.2 above 1,
///   otherwise an exact fit.
/// - Cutoff: the 25th percentile for strongly right-skewed data, else the median.
///   The maximum is `min(max, 1.5 · P90)`.
/// - Decay: smooth, over 2.5 × spacing, towards 0.
///
/// Spacing is measured in plain Euclidean distance. With a single sample it
/// falls back to the mean extent divided by the cube root of the count.
pub fn suggest_settings(samples: &SampleSet) -> Result<SuggestedSettings, RbfError> {
    let values = samples.values();
    let summary = ValueSummary::from_values(&values).ok_or(RbfError::EmptySampleSet)?;

    let index = NeighbourIndex::build(samples, &AnisotropicMetric::euclidean());
    let mean_spacing = index
        .mean_nearest_spacing()
        .unwrap_or_else(|| mean_extent(samples) / (samples.len() as f64).cbrt());
    if !(mean_spacing.is_finite() && mean_spacing > 0.0) {
        return Err(RbfError::InvalidParameter {
            name: "sample spacing",
            value: mean_spacing,
            reason: "samples must span a non-zero extent",
        });
    }

    let smoothing = match summary.coefficient_of_variation() {
        cv if cv > 2.0 => 0.5,
        cv if cv > 1.0 => 0.2,
        _ => 0.0,
    };
    let interpolant = InterpolantSettings::builder(RBFKernelType::ThinPlateSpline)
        .epsilon((mean_spacing / 10.0).max(1.0))
        .smoothing(smoothing)
        .build();

    let cutoff = match summary.skew_indicator() > 1.0 {
        true => summary.p25,
        false => summary.p50,
    };
    let threshold = ThresholdConfig {
        min: Some(cutoff.max(summary.min)),
        max: Some(summary.max.min(1.5 * summary.p90)),
        use_auto_cutoff: false,
    };

    let decay = DecaySettings {
        distance: DecayDistance::Fixed(2.5 * mean_spacing),
        background_value: 0.0,
        decay_function: DecayFunction::Smooth,
    };

    let ideal_cells = (samples.len() as f64 / 15.0).max(20.0);
    let grid_nodes = (ideal_cells.cbrt() as usize).clamp(30, 100);

    tracing::info!(
        num_samples = summary.count,
        mean_spacing,
        cv = summary.coefficient_of_variation(),
        skew = summary.skew_indicator(),
        smoothing,
        cutoff = threshold.min,
        "suggested interpolation settings"
    );

    Ok(SuggestedSettings { interpolant, threshold, decay, grid_nodes, mean_spacing, summary })
}

fn mean_extent(samples: &SampleSet) -> f64 {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for s in samples.iter() {
        for k in 0..3 {
            lo[k] = lo[k].min(s.position[k]);
            hi[k] = hi[k].max(s.position[k]);
        }
    }
    (0..3).map(|k| hi[k] - lo[k]).sum::<f64>() / 3.0
}
