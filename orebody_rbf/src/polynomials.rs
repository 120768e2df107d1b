/////////////////////////////////////////////////////////////////////////////////////////////
//
// Evaluates the constant and linear polynomial bases used for drift terms in RBF interpolation.
//
// Created on: 03 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::Mat;
use orebody_rbf_utils::get_pointarray_extents;
use serde::{Deserialize, Serialize};

use crate::interpolant_config::Drift;

/// Relative tolerance below which a pivoted-QR diagonal entry counts as zero.
const UNISOLVENT_TOLERANCE: f64 = 1E-10;

/// The polynomial part of an RBF system: which monomials are used and how
/// coordinates are mapped onto `[-1, 1]^3` before evaluating them.
///
/// Monomials that are linearly dependent on the sample positions are dropped
/// when the basis is built. Samples from a single straight drill hole are
/// collinear, for example, so a linear drift keeps only two of its four columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DriftBasis {
    translation_factor: [f64; 3],
    scale_factor: [f64; 3],
    columns: Vec<usize>,
}

impl DriftBasis {
    /// Builds the basis for `drift` over the `(n, 3)` point matrix.
    pub(crate) fn new(points: &Mat<f64>, drift: Drift) -> Self {
        let (translation_factor, scale_factor) = get_cheb_cube_scaling_factors(points);

        let mut basis = Self {
            translation_factor,
            scale_factor,
            columns: (0..drift.basis_size()).collect(),
        };

        if basis.columns.len() > 1 && points.nrows() > 0 {
            let monomials = basis.evaluate_full(points);
            basis.columns = unisolvent_columns(&monomials);
        }

        basis
    }

    /// An empty basis.
    pub(crate) fn none() -> Self {
        Self {
            translation_factor: [0.0; 3],
            scale_factor: [1.0; 3],
            columns: Vec::new(),
        }
    }

    /// Number of retained monomials.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Evaluates the retained monomials at each row of `points`.
    pub(crate) fn evaluate(&self, points: &Mat<f64>) -> Mat<f64> {
        let full = self.evaluate_full(points);
        Mat::from_fn(points.nrows(), self.columns.len(), |i, j| full[(i, self.columns[j])])
    }

    /// Evaluates the retained monomials at a single point.
    pub(crate) fn evaluate_point(&self, point: &[f64; 3]) -> Vec<f64> {
        let scaled = self.scale(point);
        self.columns
            .iter()
            .map(|&c| match c {
                0 => 1.0,
                _ => scaled[c - 1],
            })
            .collect()
    }

    fn scale(&self, point: &[f64; 3]) -> [f64; 3] {
        std::array::from_fn(|d| (point[d] - self.translation_factor[d]) / self.scale_factor[d])
    }

    fn evaluate_full(&self, points: &Mat<f64>) -> Mat<f64> {
        let basis_size = self.columns.iter().max().map_or(0, |&c| c + 1);
        evaluate_monomials(points, basis_size, &self.translation_factor, &self.scale_factor)
    }
}

/// Evaluates `[1, x, y, z]` truncated to `basis_size` columns, in coordinates
/// scaled by `(x - translation) / scale`.
pub(crate) fn evaluate_monomials(
    points: &Mat<f64>,
    basis_size: usize,
    translation_factor: &[f64; 3],
    scale_factor: &[f64; 3],
) -> Mat<f64> {
    let mut scaled_points = points.clone();
    scale_points(&mut scaled_points, translation_factor, scale_factor);

    let n = scaled_points.nrows();
    let mut monomials = Mat::<f64>::zeros(n, basis_size);

    if basis_size == 0 {
        return monomials;
    }

    // constant column
    monomials.col_mut(0).fill(1.0);

    // linear columns
    if basis_size > 1 {
        let d = (basis_size - 1).min(scaled_points.ncols());
        monomials
            .subcols_mut(1, d)
            .copy_from(scaled_points.subcols(0, d));
    }

    monomials
}

/// Translation and scale mapping the bounding box of `points` onto `[-1, 1]^3`.
///
/// Flat axes keep a scale of one.
pub(crate) fn get_cheb_cube_scaling_factors(points: &Mat<f64>) -> ([f64; 3], [f64; 3]) {
    let extents = get_pointarray_extents(points);
    if extents.len() != 6 {
        return ([0.0; 3], [1.0; 3]);
    }

    let translation_factor = std::array::from_fn(|d| (extents[d + 3] + extents[d]) / 2.0);
    let scale_factor = std::array::from_fn(|d| {
        let half_width = (extents[d + 3] - extents[d]) / 2.0;
        if half_width > 0.0 { half_width } else { 1.0 }
    });

    (translation_factor, scale_factor)
}

/// Applies `(x - translation_factor[d]) / scale_factor[d]` to every coordinate.
pub(crate) fn scale_points(points: &mut Mat<f64>, translation_factor: &[f64; 3], scale_factor: &[f64; 3]) {
    points.row_iter_mut().for_each(|row| {
        row.iter_mut().enumerate().for_each(|(col_idx, element)| {
            *element = (*element - translation_factor[col_idx]) / scale_factor[col_idx];
        });
    });
}

/// Indices of a linearly independent subset of monomial columns, ascending.
fn unisolvent_columns(monomials: &Mat<f64>) -> Vec<usize> {
    let qrc = monomials.col_piv_qr();
    let rc = qrc.thin_R();
    let (piv_fwd, _) = qrc.P().arrays();

    let thresh = UNISOLVENT_TOLERANCE * rc.get(0, 0).abs();

    let rank = rc
        .diagonal()
        .column_vector()
        .iter()
        .filter(|val| val.abs() > thresh)
        .count();

    let mut columns: Vec<usize> = piv_fwd[..rank].to_vec();
    columns.sort();
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::{mat, utils::approx::*};

    #[test]
    fn monomials_linear_3d() {
        let points = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        // Basis: [1, x, y, z]
        let expected = mat![[1.0, 1.0, 2.0, 3.0], [1.0, 4.0, 5.0, 6.0]];

        let monomials = evaluate_monomials(&points, 4, &[0.0; 3], &[1.0; 3]);

        let approx_eq = CwiseMat(ApproxEq::eps() * 128.0 * (2 as f64));
        assert!(&monomials ~ &expected);
    }

    #[test]
    fn monomials_constant_3d() {
        let points = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let expected = mat![[1.0], [1.0]];

        let monomials = evaluate_monomials(&points, 1, &[0.0; 3], &[1.0; 3]);

        let approx_eq = CwiseMat(ApproxEq::eps() * 128.0 * (2 as f64));
        assert!(&monomials ~ &expected);
    }

    #[test]
    fn scaling_maps_extents_onto_unit_cube() {
        let points = mat![[0.0, 10.0, 5.0], [4.0, 30.0, 5.0]];
        let (translation, scale) = get_cheb_cube_scaling_factors(&points);

        assert!(translation == [2.0, 20.0, 5.0]);
        // the flat z axis keeps a unit scale
        assert!(scale == [2.0, 10.0, 1.0]);

        let basis = DriftBasis::new(&points, Drift::Constant);
        assert!(basis.evaluate_point(&[4.0, 30.0, 5.0]) == vec![1.0]);
    }

    #[test]
    fn full_rank_points_keep_every_linear_column() {
        let points = mat![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let basis = DriftBasis::new(&points, Drift::Linear);
        assert!(basis.len() == 4);

        let at_corner = basis.evaluate_point(&[1.0, 1.0, 1.0]);
        assert!(at_corner == vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn collinear_points_drop_dependent_columns() {
        // a vertical hole: x and y are constant, z varies
        let points = Mat::from_fn(6, 3, |i, j| match j {
            2 => -(i as f64) * 5.0,
            _ => 100.0,
        });
        let basis = DriftBasis::new(&points, Drift::Linear);
        assert!(basis.len() == 2);

        let monomials = basis.evaluate(&points);
        assert!(monomials.ncols() == 2);
        assert!(monomials.nrows() == 6);
    }

    #[test]
    fn no_drift_is_empty() {
        let points = mat![[1.0, 2.0, 3.0]];
        let basis = DriftBasis::new(&points, Drift::None);
        assert!(basis.is_empty());
        assert!(basis.evaluate(&points).ncols() == 0);
        assert!(DriftBasis::none().is_empty());
    }
}
