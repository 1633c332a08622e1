//! Dense linear solvers.
//!
//! Two small problems show up in this crate:
//!
//! ```text
//! minimize ‖G c − f‖²        (gradient fit of the free-energy expansion)
//! (J Jᵗ) w = J p              (momentum projection onto the CV space)
//! ```
//!
//! - The least-squares matrix `G` only depends on the grid, so we factor it once
//!   and keep its pseudo-inverse. Every refit is then a matrix-vector product.
//! - `J Jᵗ` is symmetric positive-definite whenever the CV Jacobian has full
//!   row rank, so a Cholesky factorization is the natural solver. Degenerate
//!   Jacobians are caught by the eigenvalue ratio before factorizing.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoffs tried in order when building a pseudo-inverse.
const PINV_TOLERANCES: [f64; 3] = [1e-10, 1e-8, 1e-6];

/// Reciprocal condition number below which an SPD system is rejected.
const MIN_RCOND: f64 = 1e-12;

/// Moore–Penrose pseudo-inverse of a (typically tall) matrix via SVD.
///
/// Returns `None` if no tolerance on the ladder yields a finite inverse.
pub fn pseudo_inverse(x: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Some(DMatrix::zeros(x.ncols(), x.nrows()));
    }

    let svd = x.clone().svd(true, true);
    let s_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    if !s_max.is_finite() || s_max <= 0.0 {
        return None;
    }

    // Try progressively looser cutoffs if the strict one produces garbage.
    for &tol in &PINV_TOLERANCES {
        if let Ok(pinv) = svd.clone().pseudo_inverse(tol * s_max) {
            if pinv.iter().all(|v| v.is_finite()) {
                return Some(pinv);
            }
        }
    }

    None
}

/// Solve a symmetric positive-definite system with Cholesky.
///
/// Returns `None` if `a` is not positive-definite, its reciprocal condition
/// number (smallest over largest eigenvalue) is below `MIN_RCOND`, or the
/// solution is not finite.
pub fn solve_spd(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if a.is_empty() || !a.iter().all(|v| v.is_finite()) {
        return None;
    }

    let eigenvalues = a.clone().symmetric_eigenvalues();
    let lo = eigenvalues.min();
    let hi = eigenvalues.max();
    if hi <= 0.0 || lo / hi < MIN_RCOND {
        return None;
    }

    let x = a.cholesky()?.solve(b);
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
