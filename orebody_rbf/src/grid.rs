/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines regular evaluation grids, labelled point output, and CSV sample exchange.
//
// Created on: 06 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use csv::{ReaderBuilder, StringRecord, Writer};
use faer::Mat;
use orebody_rbf_utils::{get_pointarray_extents, select_mat_rows};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelIOError, ModelIOResult, RbfError},
    postprocess::Thresholded,
    samples::{Sample, SampleSet},
};

/// Default padding added on each side of a bounding box, as a fraction of its range.
pub const DEFAULT_GRID_PADDING: f64 = 0.1;

/// A regular 3D grid of evaluation nodes.
///
/// Nodes are ordered with x varying fastest, then y, then z. An axis with a
/// single node places it at the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub counts: [usize; 3],
}

impl GridSpec {
    /// Creates a grid over the box `[min, max]`.
    pub fn new(min: [f64; 3], max: [f64; 3], counts: [usize; 3]) -> Result<Self, RbfError> {
        for k in 0..3 {
            if !(min[k].is_finite() && max[k].is_finite()) {
                return Err(RbfError::InvalidParameter {
                    name: "grid bounds",
                    value: if min[k].is_finite() { max[k] } else { min[k] },
                    reason: "must be finite",
                });
            }
            if min[k] > max[k] {
                return Err(RbfError::InvalidParameter {
                    name: "grid minimum",
                    value: min[k],
                    reason: "must not exceed the maximum",
                });
            }
            if counts[k] == 0 {
                return Err(RbfError::InvalidParameter {
                    name: "grid node count",
                    value: 0.0,
                    reason: "every axis needs at least one node",
                });
            }
        }
        Ok(Self { min, max, counts })
    }

    /// Creates a grid over `[min, max]` widened by `padding` times the range on
    /// each side of every axis.
    pub fn padded(min: [f64; 3], max: [f64; 3], counts: [usize; 3], padding: f64) -> Result<Self, RbfError> {
        if !(padding.is_finite() && padding >= 0.0) {
            return Err(RbfError::InvalidParameter {
                name: "grid padding",
                value: padding,
                reason: "must be finite and non-negative",
            });
        }
        let pad = |k: usize| padding * (max[k] - min[k]);
        Self::new(
            [min[0] - pad(0), min[1] - pad(1), min[2] - pad(2)],
            [max[0] + pad(0), max[1] + pad(1), max[2] + pad(2)],
            counts,
        )
    }

    /// Creates a padded grid around the sample positions.
    pub fn around_samples(samples: &SampleSet, counts: [usize; 3], padding: f64) -> Result<Self, RbfError> {
        if samples.is_empty() {
            return Err(RbfError::EmptySampleSet);
        }
        let extents = get_pointarray_extents(&samples.positions());
        Self::padded(
            [extents[0], extents[1], extents[2]],
            [extents[3], extents[4], extents[5]],
            counts,
            padding,
        )
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.counts.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distance between neighbouring nodes along each axis, zero for single-node axes.
    pub fn spacing(&self) -> [f64; 3] {
        std::array::from_fn(|k| match self.counts[k] > 1 {
            true => (self.max[k] - self.min[k]) / (self.counts[k] - 1) as f64,
            false => 0.0,
        })
    }

    /// Linear index of node `(i, j, k)`.
    #[inline]
    pub fn linear_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.counts[0] * (j + self.counts[1] * k)
    }

    /// Position of node `(i, j, k)`.
    pub fn node(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let step = self.spacing();
        [
            self.min[0] + step[0] * i as f64,
            self.min[1] + step[1] * j as f64,
            self.min[2] + step[2] * k as f64,
        ]
    }

    /// Every node position, in linear index order.
    pub fn points(&self) -> Vec<[f64; 3]> {
        let [nx, ny, _] = self.counts;
        (0..self.len())
            .map(|idx| self.node(idx % nx, (idx / nx) % ny, idx / (nx * ny)))
            .collect()
    }

    /// Every node position as an `(n, 3)` matrix.
    pub fn to_mat(&self) -> Mat<f64> {
        let points = self.points();
        Mat::from_fn(points.len(), 3, |i, j| points[i][j])
    }
}

/// An output location with its final value and threshold status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelledPoint {
    pub position: [f64; 3],

    /// Value after decay and masking, before thresholding.
    pub value: f64,

    /// Whether the threshold rejected the value.
    pub excluded: bool,
}

impl LabelledPoint {
    pub fn new(position: [f64; 3], value: f64, threshold: Thresholded) -> Self {
        Self { position, value, excluded: threshold.is_excluded() }
    }
}

/// Values over a [`GridSpec`], in the grid's linear order. Excluded nodes hold NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarGrid {
    pub spec: GridSpec,
    pub values: Vec<f64>,
}

impl ScalarGrid {
    /// Collects labelled points evaluated at `spec.points()`.
    pub fn from_labelled(spec: GridSpec, points: &[LabelledPoint]) -> Result<Self, RbfError> {
        if points.len() != spec.len() {
            return Err(RbfError::DimensionMismatch { expected: spec.len(), found: points.len() });
        }
        let values = points
            .iter()
            .map(|p| if p.excluded { f64::NAN } else { p.value })
            .collect();
        Ok(Self { spec, values })
    }

    /// Value at node `(i, j, k)`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.spec.linear_index(i, j, k)]
    }

    /// Positions of nodes that passed the threshold, as an `(n, 3)` matrix.
    pub fn kept_points(&self) -> Mat<f64> {
        let kept: Vec<usize> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .map(|(i, _)| i)
            .collect();
        select_mat_rows(&self.spec.to_mat(), &kept)
    }
}

/// Reads samples from `x,y,z,value[,weight]` CSV.
pub fn samples_from_reader<R: Read>(reader: R, has_headers: bool) -> ModelIOResult<Vec<Sample>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    let mut num_cols = 0;

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if num_cols == 0 {
            num_cols = record.len();
            if !(4..=5).contains(&num_cols) {
                return Err(ModelIOError::InvalidFormat(format!(
                    "expected 4 or 5 columns (x, y, z, value[, weight]), found {num_cols}"
                )));
            }
        } else if record.len() != num_cols {
            return Err(ModelIOError::InvalidFormat(format!(
                "row {row} has {} columns, expected {num_cols}",
                record.len()
            )));
        }

        let fields = parse_fields(&record, row)?;
        let sample = Sample::new([fields[0], fields[1], fields[2]], fields[3]);
        samples.push(match fields.get(4) {
            Some(w) => sample.with_weight(*w),
            None => sample,
        });
    }

    Ok(samples)
}

fn parse_fields(record: &StringRecord, row: usize) -> ModelIOResult<Vec<f64>> {
    record
        .iter()
        .map(|field| {
            field.parse::<f64>().map_err(|_| {
                ModelIOError::InvalidFormat(format!("row {row}: cannot parse '{field}' as a number"))
            })
        })
        .collect()
}

/// Reads samples from a `x,y,z,value[,weight]` CSV file.
pub fn samples_from_csv<P: AsRef<Path>>(path: P, has_headers: bool) -> ModelIOResult<Vec<Sample>> {
    samples_from_reader(File::open(path)?, has_headers)
}

/// Writes labelled points as `x,y,z,value,excluded` CSV.
pub fn write_labelled_points<W: Write>(writer: W, points: &[LabelledPoint]) -> ModelIOResult<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["x", "y", "z", "value", "excluded"])?;
    for p in points {
        wtr.write_record(&[
            p.position[0].to_string(),
            p.position[1].to_string(),
            p.position[2].to_string(),
            p.value.to_string(),
            p.excluded.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes labelled points to a CSV file.
pub fn labelled_points_to_csv<P: AsRef<Path>>(path: P, points: &[LabelledPoint]) -> ModelIOResult<()> {
    write_labelled_points(BufWriter::new(File::create(path)?), points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::DuplicatePolicy;
    use equator::assert;

    #[test]
    fn nodes_run_x_fastest() {
        let spec = GridSpec::new([0.0, 0.0, 0.0], [2.0, 10.0, 5.0], [3, 2, 1]).unwrap();
        let points = spec.points();

        assert!(points.len() == 6);
        assert!(points[0] == [0.0, 0.0, 0.0]);
        assert!(points[1] == [1.0, 0.0, 0.0]);
        assert!(points[3] == [0.0, 10.0, 0.0]);
        assert!(spec.linear_index(2, 1, 0) == 5);
        assert!(spec.spacing() == [1.0, 10.0, 0.0]);

        let m = spec.to_mat();
        assert!(m[(4, 0)] == 1.0);
        assert!(m[(4, 1)] == 10.0);
    }

    #[test]
    fn padding_widens_each_axis() {
        let spec = GridSpec::padded([0.0, 10.0, -5.0], [10.0, 30.0, -5.0], [5, 5, 5], DEFAULT_GRID_PADDING).unwrap();
        assert!(spec.min == [-1.0, 8.0, -5.0]);
        assert!(spec.max == [11.0, 32.0, -5.0]);
    }

    #[test]
    fn grid_around_samples() {
        let samples = vec![
            Sample::new([0.0, 0.0, 0.0], 1.0),
            Sample::new([10.0, 20.0, 40.0], 1.0),
        ];
        let set = SampleSet::new(samples, DuplicatePolicy::Average).unwrap().0;
        let spec = GridSpec::around_samples(&set, [2, 2, 2], 0.5).unwrap();
        assert!(spec.min == [-5.0, -10.0, -20.0]);
        assert!(spec.max == [15.0, 30.0, 60.0]);
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(GridSpec::new([0.0; 3], [1.0; 3], [2, 0, 2]).is_err());
        assert!(GridSpec::new([2.0, 0.0, 0.0], [1.0; 3], [2, 2, 2]).is_err());
        assert!(GridSpec::new([f64::NAN, 0.0, 0.0], [1.0; 3], [2, 2, 2]).is_err());
        assert!(GridSpec::padded([0.0; 3], [1.0; 3], [2, 2, 2], -0.1).is_err());
    }

    #[test]
    fn scalar_grid_marks_excluded_nodes() {
        let spec = GridSpec::new([0.0; 3], [1.0, 0.0, 0.0], [2, 1, 1]).unwrap();
        let labelled = vec![
            LabelledPoint::new([0.0; 3], 3.0, Thresholded::Kept(3.0)),
            LabelledPoint::new([1.0, 0.0, 0.0], 9.0, Thresholded::Excluded),
        ];
        let grid = ScalarGrid::from_labelled(spec, &labelled).unwrap();

        assert!(grid.get(0, 0, 0) == 3.0);
        assert!(grid.get(1, 0, 0).is_nan());
        assert!(grid.kept_points().nrows() == 1);
        assert!(ScalarGrid::from_labelled(spec, &labelled[..1]).is_err());
    }

    #[test]
    fn reads_samples_with_optional_weight() {
        let data = "x,y,z,value,weight\n1, 2, 3, 0.5, 2\n4,5,6,1.5,1\n";
        let samples = samples_from_reader(data.as_bytes(), true).unwrap();

        assert!(samples.len() == 2);
        assert!(samples[0].position == [1.0, 2.0, 3.0]);
        assert!(samples[0].weight == Some(2.0));
        assert!(samples[1].value == 1.5);

        let unweighted = samples_from_reader("0,0,0,7\n".as_bytes(), false).unwrap();
        assert!(unweighted[0].weight.is_none());
    }

    #[test]
    fn rejects_malformed_csv() {
        assert!(matches!(
            samples_from_reader("1,2,3\n".as_bytes(), false),
            Err(ModelIOError::InvalidFormat(_))
        ));
        assert!(matches!(
            samples_from_reader("1,2,3,x\n".as_bytes(), false),
            Err(ModelIOError::InvalidFormat(_))
        ));
        assert!(samples_from_reader("1,2,3,4\n1,2,3,4,5\n".as_bytes(), false).is_err());
    }

    #[test]
    fn writes_labelled_points() {
        let points = vec![
            LabelledPoint { position: [1.0, 2.0, 3.0], value: 0.25, excluded: false },
            LabelledPoint { position: [4.0, 5.0, 6.0], value: 12.0, excluded: true },
        ];
        let mut out = Vec::new();
        write_labelled_points(&mut out, &points).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines == vec!["x,y,z,value,excluded", "1,2,3,0.25,false", "4,5,6,12,true"]);
    }
}
