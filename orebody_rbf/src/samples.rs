/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines sample records and the validated, duplicate-free sample collections fed to the solver.
//
// Created on: 02 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Sample records and duplicate handling.
//!
//! Two samples at bit-identical positions make the interpolation matrix singular
//! when no smoothing is applied. [`SampleSet::new`] resolves such collisions with a
//! deterministic [`DuplicatePolicy`] before any system is assembled:
//!
//! - [`DuplicatePolicy::Average`] (default) keeps one sample at the first
//!   occurrence's slot whose value is the weight-averaged value of the group.
//!   Its weight is the sum of the explicit weights, or `None` when no sample in
//!   the group carried one.
//! - [`DuplicatePolicy::LastWins`] keeps the first occurrence's slot but takes
//!   value and weight from the last sample in input order.
//! - [`DuplicatePolicy::Keep`] leaves duplicates in place.

use std::collections::HashMap;

use faer::Mat;
use serde::{Deserialize, Serialize};

use crate::error::RbfError;

/// A scalar observation at a 3D position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Position as `[x, y, z]` (East, North, Up).
    pub position: [f64; 3],

    /// Observed value, for example an assay grade.
    pub value: f64,

    /// Relative confidence in the value. The smoothing applied to this sample is
    /// divided by its weight, so heavier samples are honoured more closely.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Sample {
    /// Creates an unweighted sample.
    pub fn new(position: [f64; 3], value: f64) -> Self {
        Self { position, value, weight: None }
    }

    /// Attaches a weight to the sample.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// The sample weight, `1.0` when none was given.
    #[inline]
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// Strategy for samples sharing an identical position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    #[default]
    Average,
    LastWins,
    Keep,
}

/// A validated, immutable collection of samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    /// Validates the samples and resolves duplicate positions.
    ///
    /// Returns the set together with the number of samples removed by merging.
    pub fn new(samples: Vec<Sample>, policy: DuplicatePolicy) -> Result<(Self, usize), RbfError> {
        for sample in &samples {
            validate_sample(sample)?;
        }

        let input_len = samples.len();
        let merged = match policy {
            DuplicatePolicy::Keep => samples,
            DuplicatePolicy::Average | DuplicatePolicy::LastWins => merge_duplicates(samples, policy),
        };
        let num_duplicates = input_len - merged.len();

        if num_duplicates > 0 {
            tracing::debug!(num_duplicates, ?policy, "merged samples sharing a position");
        }

        Ok((Self { samples: merged }, num_duplicates))
    }

    /// Builds a set from an `(n, 3)` point matrix and an `(n, 1)` value matrix.
    pub fn from_point_arrays(
        points: &Mat<f64>,
        values: &Mat<f64>,
        policy: DuplicatePolicy,
    ) -> Result<(Self, usize), RbfError> {
        if points.ncols() != 3 {
            return Err(RbfError::DimensionMismatch { expected: 3, found: points.ncols() });
        }
        if values.nrows() != points.nrows() {
            return Err(RbfError::DimensionMismatch {
                expected: points.nrows(),
                found: values.nrows(),
            });
        }
        if values.ncols() != 1 {
            return Err(RbfError::DimensionMismatch { expected: 1, found: values.ncols() });
        }

        let samples = (0..points.nrows())
            .map(|i| {
                Sample::new(
                    [points[(i, 0)], points[(i, 1)], points[(i, 2)]],
                    values[(i, 0)],
                )
            })
            .collect();

        Self::new(samples, policy)
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the set holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples in input order.
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterates over the samples.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Sample positions as an `(n, 3)` matrix.
    pub fn positions(&self) -> Mat<f64> {
        Mat::from_fn(self.samples.len(), 3, |i, j| self.samples[i].position[j])
    }

    /// Sample values in input order.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Returns a new set holding these samples followed by `extra`, with
    /// duplicates resolved by `policy`.
    pub fn extended(&self, extra: &[Sample], policy: DuplicatePolicy) -> Result<(Self, usize), RbfError> {
        let mut samples = self.samples.clone();
        samples.extend_from_slice(extra);
        Self::new(samples, policy)
    }
}

fn validate_sample(sample: &Sample) -> Result<(), RbfError> {
    if let Some(c) = sample.position.iter().find(|c| !c.is_finite()) {
        return Err(RbfError::InvalidParameter {
            name: "sample position",
            value: *c,
            reason: "coordinates must be finite",
        });
    }
    if !sample.value.is_finite() {
        return Err(RbfError::InvalidParameter {
            name: "sample value",
            value: sample.value,
            reason: "values must be finite",
        });
    }
    if let Some(w) = sample.weight {
        if !(w.is_finite() && w > 0.0) {
            return Err(RbfError::InvalidParameter {
                name: "sample weight",
                value: w,
                reason: "weights must be finite and greater than zero",
            });
        }
    }
    Ok(())
}

/// Bit pattern of a position, with `-0.0` folded onto `0.0`.
fn position_key(position: &[f64; 3]) -> [u64; 3] {
    position.map(|c| if c == 0.0 { 0.0f64.to_bits() } else { c.to_bits() })
}

struct MergeGroup {
    slot: usize,
    weighted_sum: f64,
    weight_sum: f64,
    explicit_weight: Option<f64>,
}

fn merge_duplicates(samples: Vec<Sample>, policy: DuplicatePolicy) -> Vec<Sample> {
    let mut groups: HashMap<[u64; 3], MergeGroup> = HashMap::with_capacity(samples.len());
    let mut merged: Vec<Sample> = Vec::with_capacity(samples.len());

    for sample in samples {
        let key = position_key(&sample.position);
        match groups.get_mut(&key) {
            None => {
                groups.insert(
                    key,
                    MergeGroup {
                        slot: merged.len(),
                        weighted_sum: sample.value * sample.effective_weight(),
                        weight_sum: sample.effective_weight(),
                        explicit_weight: sample.weight,
                    },
                );
                merged.push(sample);
            }
            Some(group) => {
                let slot = &mut merged[group.slot];
                match policy {
                    DuplicatePolicy::LastWins => {
                        slot.value = sample.value;
                        slot.weight = sample.weight;
                    }
                    _ => {
                        let w = sample.effective_weight();
                        group.weighted_sum += sample.value * w;
                        group.weight_sum += w;
                        if let Some(sw) = sample.weight {
                            group.explicit_weight = Some(group.explicit_weight.unwrap_or(0.0) + sw);
                        }
                        slot.value = group.weighted_sum / group.weight_sum;
                        slot.weight = group.explicit_weight;
                    }
                }
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    fn collocated() -> Vec<Sample> {
        vec![
            Sample::new([1.0, 2.0, 3.0], 2.0),
            Sample::new([5.0, 5.0, 5.0], 9.0),
            Sample::new([1.0, 2.0, 3.0], 4.0),
            Sample::new([1.0, 2.0, 3.0], 9.0),
        ]
    }

    #[test]
    fn average_policy_merges_into_first_slot() {
        let (set, removed) = SampleSet::new(collocated(), DuplicatePolicy::Average).unwrap();
        assert!(removed == 2);
        assert!(set.len() == 2);
        assert!(set.samples()[0].position == [1.0, 2.0, 3.0]);
        assert!((set.samples()[0].value - 5.0).abs() < 1e-12);
        assert!(set.samples()[0].weight.is_none());
        assert!(set.samples()[1].value == 9.0);
    }

    #[test]
    fn average_policy_respects_weights() {
        let samples = vec![
            Sample::new([0.0, 0.0, 0.0], 1.0).with_weight(3.0),
            Sample::new([-0.0, 0.0, 0.0], 5.0),
        ];
        let (set, removed) = SampleSet::new(samples, DuplicatePolicy::Average).unwrap();
        assert!(removed == 1);
        // (1 * 3 + 5 * 1) / 4
        assert!((set.samples()[0].value - 2.0).abs() < 1e-12);
        assert!(set.samples()[0].weight == Some(3.0));
    }

    #[test]
    fn last_wins_policy_takes_final_value() {
        let (set, removed) = SampleSet::new(collocated(), DuplicatePolicy::LastWins).unwrap();
        assert!(removed == 2);
        assert!(set.samples()[0].value == 9.0);
        assert!(set.samples()[1].position == [5.0, 5.0, 5.0]);
    }

    #[test]
    fn keep_policy_leaves_duplicates() {
        let (set, removed) = SampleSet::new(collocated(), DuplicatePolicy::Keep).unwrap();
        assert!(removed == 0);
        assert!(set.len() == 4);
    }

    #[test]
    fn rejects_non_finite_values_and_bad_weights() {
        let nan = vec![Sample::new([0.0, 0.0, 0.0], f64::NAN)];
        assert!(matches!(
            SampleSet::new(nan, DuplicatePolicy::Average),
            Err(RbfError::InvalidParameter { name: "sample value", .. })
        ));

        let zero_weight = vec![Sample::new([0.0, 0.0, 0.0], 1.0).with_weight(0.0)];
        assert!(matches!(
            SampleSet::new(zero_weight, DuplicatePolicy::Average),
            Err(RbfError::InvalidParameter { name: "sample weight", .. })
        ));
    }

    #[test]
    fn point_arrays_must_be_three_dimensional() {
        let points = Mat::<f64>::zeros(4, 2);
        let values = Mat::<f64>::zeros(4, 1);
        assert!(matches!(
            SampleSet::from_point_arrays(&points, &values, DuplicatePolicy::Average),
            Err(RbfError::DimensionMismatch { expected: 3, found: 2 })
        ));
    }
}
