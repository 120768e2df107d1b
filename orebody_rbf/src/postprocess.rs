/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements distance decay towards a background value, threshold filtering, and extrapolation masks.
//
// Created on: 04 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Post-processing of raw interpolated values.
//!
//! An RBF interpolant is unbounded: away from the data it drifts or overshoots
//! freely. The helpers here pull estimates back towards a background value as the
//! distance to the nearest sample grows, cut the field at a caller-supplied or
//! derived grade range, and mask out regions too far from any sample to trust.
//!
//! Distances are measured under the active [`AnisotropicMetric`], so with an
//! ellipsoid they are normalised distances (`1.0` on the ellipsoid boundary) and
//! with the Euclidean metric they are plain distances.
//!
//! [`AnisotropicMetric`]: crate::metric::AnisotropicMetric

use serde::{Deserialize, Serialize};

use crate::error::RbfError;
use crate::metric::{AnisotropicMetric, Ellipsoid};
use crate::neighbours::NeighbourIndex;

/// Multiple of the mean nearest-sample spacing used as an automatic decay distance.
pub const AUTO_DECAY_SPACING_FACTOR: f64 = 3.0;

/// Shape of the blend from the raw estimate to the background value.
///
/// With `t = clamp(distance / decay_distance, 0, 1)`:
///
/// | Function | result |
/// |---|---|
/// | `Linear` | `raw · (1 - t) + background · t` |
/// | `Smooth` | as `Linear` with `t' = 3t² - 2t³` |
/// | `Gaussian` | `raw · w + background · (1 - w)`, `w = exp(-(distance / decay_distance)²)` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecayFunction {
    Linear,
    #[default]
    Smooth,
    Gaussian,
}

impl DecayFunction {
    /// Weight given to the raw estimate at `distance`.
    pub fn raw_weight(&self, distance: f64, decay_distance: f64) -> f64 {
        let ratio = distance / decay_distance;
        let t = ratio.clamp(0.0, 1.0);
        match self {
            DecayFunction::Linear => 1.0 - t,
            DecayFunction::Smooth => 1.0 - t * t * (3.0 - 2.0 * t),
            // Not clamped, so the weight keeps falling beyond the decay distance.
            DecayFunction::Gaussian => (-(ratio.max(0.0) * ratio.max(0.0))).exp(),
        }
    }
}

/// Resolved decay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Distance at which `Linear` and `Smooth` reach the background value.
    pub decay_distance: f64,
    pub background_value: f64,
    pub decay_function: DecayFunction,
}

impl DecayConfig {
    pub fn new(decay_distance: f64, background_value: f64, decay_function: DecayFunction) -> Self {
        Self { decay_distance, background_value, decay_function }
    }

    /// Checks that the decay distance is finite and positive and the background
    /// is finite.
    pub fn validate(&self) -> Result<(), RbfError> {
        if !(self.decay_distance.is_finite() && self.decay_distance > 0.0) {
            return Err(RbfError::InvalidParameter {
                name: "decay_distance",
                value: self.decay_distance,
                reason: "must be finite and greater than zero",
            });
        }
        if !self.background_value.is_finite() {
            return Err(RbfError::InvalidParameter {
                name: "background_value",
                value: self.background_value,
                reason: "must be finite",
            });
        }
        Ok(())
    }
}

/// Blends `raw_value` towards the background according to its distance to the
/// nearest sample.
///
/// A NaN raw value or distance propagates unchanged.
pub fn apply_decay(raw_value: f64, distance_to_nearest_sample: f64, config: &DecayConfig) -> f64 {
    let w = config
        .decay_function
        .raw_weight(distance_to_nearest_sample, config.decay_distance);
    raw_value * w + config.background_value * (1.0 - w)
}

/// Decay distance as configured by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DecayDistance {
    /// [`AUTO_DECAY_SPACING_FACTOR`] times the mean nearest-sample spacing.
    #[default]
    Auto,
    Fixed(f64),
}

/// Decay parameters before the distance has been resolved against the data.
///
/// ### Default Values
/// - `distance`: `Auto`
/// - `background_value`: `0.0`
/// - `decay_function`: `Smooth`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecaySettings {
    pub distance: DecayDistance,
    pub background_value: f64,
    pub decay_function: DecayFunction,
}

impl DecaySettings {
    /// Resolves an automatic distance from the indexed samples and validates the result.
    pub fn resolve(&self, index: &NeighbourIndex) -> Result<DecayConfig, RbfError> {
        let decay_distance = match self.distance {
            DecayDistance::Fixed(d) => d,
            DecayDistance::Auto => auto_decay_distance(index).ok_or(RbfError::InvalidParameter {
                name: "decay_distance",
                value: f64::NAN,
                reason: "cannot be derived from fewer than two distinct samples",
            })?,
        };

        let config = DecayConfig::new(decay_distance, self.background_value, self.decay_function);
        config.validate()?;
        Ok(config)
    }
}

/// [`AUTO_DECAY_SPACING_FACTOR`] times the mean nearest-neighbour spacing of the
/// indexed samples, or `None` when it would not be positive.
pub fn auto_decay_distance(index: &NeighbourIndex) -> Option<f64> {
    index
        .mean_nearest_spacing()
        .map(|s| s * AUTO_DECAY_SPACING_FACTOR)
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Outcome of threshold filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Thresholded {
    Kept(f64),
    Excluded,
}

impl Thresholded {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Thresholded::Excluded)
    }

    /// The kept value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            Thresholded::Kept(v) => Some(*v),
            Thresholded::Excluded => None,
        }
    }
}

/// Keeps `value` when it lies within `[min, max]`.
///
/// A supplied `auto_cutoff` takes the place of `min`. Missing bounds are open.
/// NaN is always excluded.
pub fn apply_threshold(
    value: f64,
    min: Option<f64>,
    max: Option<f64>,
    auto_cutoff: Option<f64>,
) -> Thresholded {
    let lower = auto_cutoff.or(min);

    let below = lower.is_some_and(|lo| value < lo);
    let above = max.is_some_and(|hi| value > hi);

    match value.is_nan() || below || above {
        true => Thresholded::Excluded,
        false => Thresholded::Kept(value),
    }
}

/// Threshold bounds as configured by the caller.
///
/// When `use_auto_cutoff` is set the attribute's cutoff grade replaces `min`. The
/// pipeline falls back to the sample median when neither is available.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub use_auto_cutoff: bool,
}

impl ThresholdConfig {
    /// Checks that the bounds are finite and ordered.
    pub fn validate(&self) -> Result<(), RbfError> {
        for (name, bound) in [("threshold min", self.min), ("threshold max", self.max)] {
            if let Some(b) = bound.filter(|b| !b.is_finite()) {
                return Err(RbfError::InvalidParameter { name, value: b, reason: "must be finite" });
            }
        }
        if let (Some(lo), Some(hi)) = (self.min, self.max) {
            if lo > hi {
                return Err(RbfError::InvalidParameter {
                    name: "threshold min",
                    value: lo,
                    reason: "must not exceed the maximum",
                });
            }
        }
        Ok(())
    }

    /// Filters a value against these bounds.
    pub fn apply(&self, value: f64, auto_cutoff: Option<f64>) -> Thresholded {
        let cutoff = auto_cutoff.filter(|_| self.use_auto_cutoff);
        apply_threshold(value, self.min, self.max, cutoff)
    }
}

/// Hard limit on how far from the data a value is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ExtrapolationLimit {
    #[default]
    None,

    /// Beyond this distance to the nearest sample, under the active metric.
    Distance(f64),

    /// Outside this ellipsoid centred on the nearest sample.
    Ellipsoid(Ellipsoid),
}

impl ExtrapolationLimit {
    /// Prepares the limit for the given sample positions.
    pub fn build_mask(&self, positions: &[[f64; 3]]) -> Result<ExtrapolationMask, RbfError> {
        let index = match self {
            ExtrapolationLimit::Distance(d) if !(d.is_finite() && *d > 0.0) => {
                return Err(RbfError::InvalidParameter {
                    name: "extrapolation distance",
                    value: *d,
                    reason: "must be finite and greater than zero",
                });
            }
            ExtrapolationLimit::Ellipsoid(e) => {
                Some(NeighbourIndex::from_positions(positions, &AnisotropicMetric::new(e)))
            }
            _ => None,
        };

        Ok(ExtrapolationMask { limit: *self, index })
    }
}

/// An [`ExtrapolationLimit`] bound to a sample set.
#[derive(Debug, Clone)]
pub struct ExtrapolationMask {
    limit: ExtrapolationLimit,
    index: Option<NeighbourIndex>,
}

impl ExtrapolationMask {
    /// Whether `point` lies beyond the limit.
    ///
    /// `nearest_distance` is the distance to the nearest sample under the active
    /// metric, `None` when there are no samples.
    pub fn is_masked(&self, point: &[f64; 3], nearest_distance: Option<f64>) -> bool {
        match (&self.limit, &self.index) {
            (ExtrapolationLimit::None, _) => false,
            (ExtrapolationLimit::Distance(d), _) => nearest_distance.map_or(true, |n| n > *d),
            (ExtrapolationLimit::Ellipsoid(_), Some(index)) => index.query_ellipsoid(point).is_empty(),
            (ExtrapolationLimit::Ellipsoid(_), None) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    const TOL: f64 = 1e-12;

    #[test]
    fn threshold_excludes_outside_bounds() {
        let out: Vec<Thresholded> = [1.0, 5.0, 15.0]
            .iter()
            .map(|v| apply_threshold(*v, Some(2.0), Some(10.0), None))
            .collect();
        assert!(out == vec![Thresholded::Excluded, Thresholded::Kept(5.0), Thresholded::Excluded]);
    }

    #[test]
    fn auto_cutoff_replaces_min() {
        assert!(apply_threshold(3.0, Some(2.0), None, Some(4.0)).is_excluded());
        assert!(apply_threshold(4.0, Some(5.0), None, Some(4.0)) == Thresholded::Kept(4.0));
        assert!(apply_threshold(f64::NAN, None, None, None).is_excluded());
        assert!(apply_threshold(-1e9, None, None, None).value() == Some(-1e9));
    }

    #[test]
    fn threshold_config_ignores_cutoff_unless_enabled() {
        let config = ThresholdConfig { min: Some(1.0), max: None, use_auto_cutoff: false };
        assert!(config.apply(2.0, Some(3.0)) == Thresholded::Kept(2.0));

        let config = ThresholdConfig { use_auto_cutoff: true, ..config };
        assert!(config.apply(2.0, Some(3.0)).is_excluded());

        let inverted = ThresholdConfig { min: Some(5.0), max: Some(1.0), use_auto_cutoff: false };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn linear_decay_halfway() {
        let config = DecayConfig::new(10.0, 0.0, DecayFunction::Linear);
        assert!((apply_decay(8.0, 5.0, &config) - 4.0).abs() < TOL);
    }

    #[test]
    fn decay_functions_at_the_ends() {
        for function in [DecayFunction::Linear, DecayFunction::Smooth, DecayFunction::Gaussian] {
            let config = DecayConfig::new(10.0, 1.0, function);
            assert!((apply_decay(8.0, 0.0, &config) - 8.0).abs() < TOL);
        }

        let linear = DecayConfig::new(10.0, 1.0, DecayFunction::Linear);
        let smooth = DecayConfig::new(10.0, 1.0, DecayFunction::Smooth);
        assert!((apply_decay(8.0, 10.0, &linear) - 1.0).abs() < TOL);
        assert!((apply_decay(8.0, 25.0, &smooth) - 1.0).abs() < TOL);
    }

    #[test]
    fn smooth_and_gaussian_shapes() {
        let smooth = DecayConfig::new(10.0, 0.0, DecayFunction::Smooth);
        // t = 0.25, t' = 3/16 - 2/64 = 0.15625
        assert!((apply_decay(1.0, 2.5, &smooth) - 0.84375).abs() < TOL);
        // smoothstep is symmetric about the midpoint
        assert!((apply_decay(1.0, 5.0, &smooth) - 0.5).abs() < TOL);

        let gaussian = DecayConfig::new(10.0, 2.0, DecayFunction::Gaussian);
        let w = (-1.0f64).exp();
        assert!((apply_decay(10.0, 10.0, &gaussian) - (10.0 * w + 2.0 * (1.0 - w))).abs() < TOL);
    }

    #[test]
    fn decay_config_validation() {
        assert!(DecayConfig::new(0.0, 0.0, DecayFunction::Linear).validate().is_err());
        assert!(DecayConfig::new(5.0, f64::NAN, DecayFunction::Linear).validate().is_err());
        assert!(DecayConfig::new(5.0, 0.1, DecayFunction::Linear).validate().is_ok());
    }

    #[test]
    fn auto_distance_is_three_mean_spacings() {
        let positions: Vec<[f64; 3]> = (0..10).map(|i| [i as f64 * 4.0, 0.0, 0.0]).collect();
        let index = NeighbourIndex::from_positions(&positions, &AnisotropicMetric::euclidean());

        let resolved = DecaySettings::default().resolve(&index).unwrap();
        assert!((resolved.decay_distance - 12.0).abs() < TOL);
        assert!(resolved.decay_function == DecayFunction::Smooth);

        let single = NeighbourIndex::from_positions(&[[0.0; 3]], &AnisotropicMetric::euclidean());
        assert!(DecaySettings::default().resolve(&single).is_err());
    }

    #[test]
    fn extrapolation_masks() {
        let positions = vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0]];

        let none = ExtrapolationLimit::None.build_mask(&positions).unwrap();
        assert!(!none.is_masked(&[1e6, 0.0, 0.0], None));

        let distance = ExtrapolationLimit::Distance(20.0).build_mask(&positions).unwrap();
        assert!(!distance.is_masked(&[50.0, 0.0, 0.0], Some(15.0)));
        assert!(distance.is_masked(&[50.0, 0.0, 0.0], Some(25.0)));
        assert!(distance.is_masked(&[50.0, 0.0, 0.0], None));

        // long axis north-south
        let ellipsoid = Ellipsoid::new(40.0, 10.0, 5.0, 0.0, 0.0, 0.0);
        let mask = ExtrapolationLimit::Ellipsoid(ellipsoid).build_mask(&positions).unwrap();
        assert!(!mask.is_masked(&[0.0, 35.0, 0.0], None));
        assert!(mask.is_masked(&[15.0, 0.0, 0.0], None));

        assert!(ExtrapolationLimit::Distance(-1.0).build_mask(&positions).is_err());
    }
}
