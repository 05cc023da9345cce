//! Weighted least squares solver.
//!
//! Each fit pass solves a small linear regression problem of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and solve an ordinary least squares problem.
//! - We use SVD so tall design matrices (more rows than columns) solve robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The parameter covariance is the unscaled `(XᵀWX)⁻¹`: input errors are taken
//!   at face value, so parameter errors are not rescaled by `χ²/ndf`.

use nalgebra::{DMatrix, DVector};

/// Solution of a weighted least squares problem.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    pub beta: DVector<f64>,
    pub covariance: DMatrix<f64>,
}

impl LeastSquaresFit {
    /// Standard error of coefficient `i`.
    pub fn std_error(&self, i: usize) -> f64 {
        self.covariance[(i, i)].sqrt()
    }
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `minimize Σ w_i (y_i - x_i^T β)^2` and return β with its covariance.
///
/// Returns `None` for non-positive/non-finite weights, mismatched shapes, or a
/// singular normal matrix.
pub fn weighted_least_squares(x: &DMatrix<f64>, y: &DVector<f64>, w: &[f64]) -> Option<LeastSquaresFit> {
    let n = x.nrows();
    if y.len() != n || w.len() != n || n < x.ncols() {
        return None;
    }
    if w.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }

    let mut xw = x.clone();
    let mut yw = y.clone();
    for (i, wi) in w.iter().enumerate() {
        let sw = wi.sqrt();
        xw.row_mut(i).scale_mut(sw);
        yw[i] *= sw;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    let covariance = (xw.transpose() * &xw).try_inverse()?;
    if covariance.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(LeastSquaresFit { beta, covariance })
}
