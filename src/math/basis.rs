//! One-dimensional basis families on the reference interval `u ∈ [-1, 1]`.
//!
//! - Chebyshev polynomials `T_k(u)` for non-periodic CV axes.
//! - Fourier modes `1, cos(kπu), sin(kπu)` for periodic CV axes.
//!
//! Each family is addressed by a flat index `j` so that tensor products over
//! several CV dimensions can be built by the model code without caring which
//! family is in use. Index `0` is always the constant function.
//!
//! Numerical notes:
//! - `T_k` and `T_k'` are computed by the three-term recurrences
//!   (`T_{k+1} = 2u T_k - T_{k-1}`, `T_k' = k U_{k-1}`) rather than through
//!   `cos(k acos u)`, which loses the derivative at `u = ±1` and is undefined
//!   outside the interval.

use std::f64::consts::PI;

/// Which one-dimensional family spans a CV axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisFamily {
    Chebyshev,
    Fourier,
}

impl BasisFamily {
    /// Number of 1-D functions (constant included) for an axis with `nodes` mesh points.
    ///
    /// The count never exceeds `nodes`, so the gradient fit stays over-determined.
    pub fn count(self, nodes: usize) -> usize {
        match self {
            BasisFamily::Chebyshev => nodes.max(1),
            BasisFamily::Fourier => 1 + 2 * (nodes.saturating_sub(1) / 2),
        }
    }

    /// Value and derivative `(φ_j(u), φ_j'(u))`.
    pub fn value_and_derivative(self, j: usize, u: f64) -> (f64, f64) {
        match self {
            BasisFamily::Chebyshev => chebyshev(j, u),
            BasisFamily::Fourier => fourier(j, u),
        }
    }
}

/// `(T_k(u), T_k'(u))`.
pub fn chebyshev(k: usize, u: f64) -> (f64, f64) {
    if k == 0 {
        return (1.0, 0.0);
    }

    // T_{k-1}, T_k and U_{k-2}, U_{k-1}.
    let (mut t_prev, mut t) = (1.0, u);
    let (mut u_prev, mut u_cur) = (0.0, 1.0);
    for _ in 1..k {
        let t_next = 2.0 * u * t - t_prev;
        let u_next = 2.0 * u * u_cur - u_prev;
        t_prev = t;
        t = t_next;
        u_prev = u_cur;
        u_cur = u_next;
    }

    (t, k as f64 * u_cur)
}

/// Fourier mode `j`: `0 → 1`, `2m-1 → cos(mπu)`, `2m → sin(mπu)`.
pub fn fourier(j: usize, u: f64) -> (f64, f64) {
    if j == 0 {
        return (1.0, 0.0);
    }
    let m = j.div_ceil(2) as f64;
    let w = m * PI;
    let (s, c) = (w * u).sin_cos();
    if j % 2 == 1 {
        (c, -w * s)
    } else {
        (s, w * c)
    }
}
