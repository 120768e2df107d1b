/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the dense direct solve of RBF interpolation systems with singularity detection.
//
// Created on: 03 Feb 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::{linalg::solvers::Solve, Mat, Side};

use crate::error::RbfError;

/// Factorisation used to solve an interpolation system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Factorisation {
    /// LLᵀ, for symmetric positive definite systems.
    Cholesky,
    /// QR with column pivoting, for indefinite or saddle-point systems.
    PivotedQr,
}

/// Solves the square system `a · x = rhs`.
///
/// Cholesky is attempted first when `try_cholesky` is set. Otherwise, or when
/// the matrix is not numerically positive definite, a column-pivoted QR is used.
/// Its `R` factor doubles as a rank check: a diagonal entry below
/// `n · ε · |R₀₀|` means the system is singular and no solution is returned.
pub(crate) fn solve_system(
    a: &Mat<f64>,
    rhs: &Mat<f64>,
    try_cholesky: bool,
    smoothing: f64,
) -> Result<(Mat<f64>, Factorisation), RbfError> {
    let n = a.nrows();
    let singular = || RbfError::SingularSystem { size: n, smoothing };

    if n == 0 {
        return Ok((Mat::zeros(0, rhs.ncols()), Factorisation::Cholesky));
    }

    if try_cholesky {
        if let Ok(llt) = a.llt(Side::Lower) {
            let solution = llt.solve(rhs);
            if is_finite(&solution) {
                return Ok((solution, Factorisation::Cholesky));
            }
        }
    }

    let qr = a.col_piv_qr();
    let r = qr.thin_R();

    let thresh = n as f64 * f64::EPSILON * r.get(0, 0).abs();
    let rank = r
        .diagonal()
        .column_vector()
        .iter()
        .filter(|val| val.abs() > thresh)
        .count();

    if rank < n {
        tracing::debug!(size = n, rank, "interpolation system is rank deficient");
        return Err(singular());
    }

    let solution = qr.solve(rhs);
    if !is_finite(&solution) {
        return Err(singular());
    }

    Ok((solution, Factorisation::PivotedQr))
}

fn is_finite(m: &Mat<f64>) -> bool {
    m.col_iter().all(|col| col.iter().all(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::{mat, utils::approx::*};

    /// Deterministic SPD matrix: A = M M^T + alpha I.
    fn make_spd(n: usize, alpha: f64) -> Mat<f64> {
        let m = Mat::<f64>::from_fn(n, n, |i, j| {
            let x = (i as f64 + 1.0) * (j as f64 + 2.0);
            (x.sin() + 2.0 * x.cos()) / (1.0 + (i + j + 1) as f64)
        });
        let mut a = &m * m.transpose();
        for i in 0..n {
            a[(i, i)] += alpha;
        }
        a
    }

    #[test]
    fn spd_system_uses_cholesky() {
        let n = 8;
        let a = make_spd(n, 1e-2);
        let b = Mat::<f64>::from_fn(n, 1, |i, _| (i + 1) as f64);

        let (x, factorisation) = solve_system(&a, &b, true, 0.0).unwrap();
        assert!(factorisation == Factorisation::Cholesky);

        let approx_eq = CwiseMat(ApproxEq::eps() * 1024.0 * (n as f64));
        assert!(&a * &x ~ b);
    }

    #[test]
    fn indefinite_system_falls_back_to_qr() {
        // symmetric saddle-point shape [K P; P^T 0]
        let a = mat![
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
        ];
        let b = mat![[2.0], [3.0], [4.0]];

        let (x, factorisation) = solve_system(&a, &b, true, 0.0).unwrap();
        assert!(factorisation == Factorisation::PivotedQr);

        let approx_eq = CwiseMat(ApproxEq::eps() * 128.0 * 3.0);
        assert!(&a * &x ~ b);
    }

    #[test]
    fn duplicated_rows_are_singular() {
        let a = mat![
            [0.0, 2.0, 2.0],
            [2.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
        ];
        let b = mat![[1.0], [2.0], [3.0]];

        let err = solve_system(&a, &b, true, 0.0).unwrap_err();
        assert!(err == RbfError::SingularSystem { size: 3, smoothing: 0.0 });
    }
}
