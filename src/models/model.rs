//! Spectral expansion of the free energy and its gradient fit.
//!
//! The free energy is written as `A(x) = Σ_j c_j φ_j(u(x))` where each `φ_j` is a
//! tensor product of 1-D functions (Chebyshev or Fourier, see
//! [`crate::math::basis`]) and `u(x)` maps the grid box onto `[-1, 1]^d`.
//!
//! ABF only measures the *gradient* of `A`, so the coefficients are obtained
//! from a least-squares fit of `∇A` to the binned mean forces at the mesh
//! nodes. The design matrix of that fit depends only on the grid, so its
//! pseudo-inverse is computed once here and every refit is a single
//! matrix-vector product.
//!
//! The fitter relies on two primitive operations:
//! - fill the gradient rows of the design matrix at a point (for the fit)
//! - fill the value row at a point (for free-energy evaluation)

use nalgebra::{DMatrix, DVector};

use crate::error::AbfError;
use crate::grid::Grid;
use crate::math::{BasisFamily, pseudo_inverse};
use crate::models::Fun;

/// Least-squares gradient fit over a fixed spectral basis.
#[derive(Debug, Clone)]
pub struct SpectralGradientFit {
    grid: Grid,
    family: BasisFamily,
    /// Per basis function, the 1-D function index along each CV dimension.
    exponents: Vec<Vec<usize>>,
    /// `n_basis × (n_bins · dims)`.
    pinv: DMatrix<f64>,
}

impl SpectralGradientFit {
    pub fn new(grid: &Grid) -> Result<Self, AbfError> {
        grid.validate()?;
        let family = if grid.is_periodic() {
            BasisFamily::Fourier
        } else {
            BasisFamily::Chebyshev
        };
        let exponents = build_exponents(family, grid.shape());

        let dims = grid.dims();
        let mesh = grid.reference_mesh();
        let mut design = DMatrix::zeros(grid.n_bins() * dims, exponents.len());
        let mut rows = DMatrix::zeros(dims, exponents.len());
        for bin in 0..grid.n_bins() {
            let u = mesh.row(bin).transpose();
            fill_gradient_rows(family, grid, &exponents, &u, &mut rows);
            design.rows_mut(bin * dims, dims).copy_from(&rows);
        }

        let pinv = pseudo_inverse(&design).ok_or_else(|| {
            AbfError::configuration(format!(
                "gradient design matrix for grid shape {:?} could not be inverted",
                grid.shape()
            ))
        })?;

        Ok(Self {
            grid: grid.clone(),
            family,
            exponents,
            pinv,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn n_basis(&self) -> usize {
        self.exponents.len()
    }

    /// The expansion with all coefficients equal to zero.
    pub fn zero(&self) -> Fun {
        Fun::zeros(self.grid.is_periodic(), self.n_basis())
    }

    /// Fit coefficients whose gradient matches `field` at the mesh nodes.
    ///
    /// # Panics
    /// Panics if `field` is not `n_bins × dims`.
    pub fn fit(&self, field: &DMatrix<f64>) -> Fun {
        let dims = self.grid.dims();
        assert_eq!(
            field.shape(),
            (self.grid.n_bins(), dims),
            "force field does not match the grid"
        );
        let rhs = DVector::from_fn(field.nrows() * dims, |r, _| field[(r / dims, r % dims)]);
        let c = &self.pinv * rhs;
        Fun::new(self.grid.is_periodic(), c.iter().copied().collect())
    }

    /// Check that `fun` was fitted with this basis.
    pub fn check_fun(&self, fun: &Fun) -> Result<(), AbfError> {
        if fun.coefficients().len() != self.n_basis() || fun.is_periodic() != self.grid.is_periodic() {
            return Err(AbfError::configuration(format!(
                "expansion has {} coefficients (periodic={}) but the grid basis has {} (periodic={})",
                fun.coefficients().len(),
                fun.is_periodic(),
                self.n_basis(),
                self.grid.is_periodic()
            )));
        }
        Ok(())
    }

    /// `A(x)` for a CV value `x`.
    pub fn evaluate(&self, fun: &Fun, x: &DVector<f64>) -> f64 {
        debug_assert_eq!(fun.coefficients().len(), self.n_basis(), "coefficients do not match the basis");
        let u = self.grid.to_reference(x);
        let mut row = vec![0.0; self.n_basis()];
        fill_value_row(self.family, &self.exponents, &u, &mut row);
        row.iter().zip(fun.coefficients()).map(|(p, c)| p * c).sum()
    }

    /// `∇A(x)` for a CV value `x`.
    pub fn gradient(&self, fun: &Fun, x: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(fun.coefficients().len(), self.n_basis(), "coefficients do not match the basis");
        let u = self.grid.to_reference(x);
        let mut rows = DMatrix::zeros(self.grid.dims(), self.n_basis());
        fill_gradient_rows(self.family, &self.grid, &self.exponents, &u, &mut rows);
        rows * DVector::from_column_slice(fun.coefficients())
    }

    /// `A` at every row of `points` (one CV value per row).
    pub fn evaluate_rows(&self, fun: &Fun, points: &DMatrix<f64>) -> Vec<f64> {
        (0..points.nrows())
            .map(|i| self.evaluate(fun, &points.row(i).transpose()))
            .collect()
    }
}

/// Every tuple of 1-D indices except the all-constant one, row-major.
fn build_exponents(family: BasisFamily, shape: &[usize]) -> Vec<Vec<usize>> {
    let counts: Vec<usize> = shape.iter().map(|&n| family.count(n)).collect();
    let total: usize = counts.iter().product();

    let mut out = Vec::with_capacity(total.saturating_sub(1));
    for mut flat in 1..total {
        let mut tuple = vec![0; counts.len()];
        for d in (0..counts.len()).rev() {
            tuple[d] = flat % counts[d];
            flat /= counts[d];
        }
        out.push(tuple);
    }
    out
}

/// Per-dimension tables of 1-D values and derivatives at `u`.
fn tables(family: BasisFamily, exponents: &[Vec<usize>], u: &DVector<f64>) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let dims = u.len();
    let mut values = Vec::with_capacity(dims);
    let mut derivs = Vec::with_capacity(dims);
    for d in 0..dims {
        let len = exponents.iter().map(|e| e[d] + 1).max().unwrap_or(1);
        let (v, dv): (Vec<f64>, Vec<f64>) = (0..len)
            .map(|j| family.value_and_derivative(j, u[d]))
            .unzip();
        values.push(v);
        derivs.push(dv);
    }
    (values, derivs)
}

/// Fill `out[j] = φ_j(u)`.
fn fill_value_row(family: BasisFamily, exponents: &[Vec<usize>], u: &DVector<f64>, out: &mut [f64]) {
    let (values, _) = tables(family, exponents, u);
    for (slot, e) in out.iter_mut().zip(exponents) {
        *slot = e.iter().enumerate().map(|(d, &j)| values[d][j]).product();
    }
}

/// Fill `out[(d, j)] = ∂φ_j/∂x_d` (chain rule through `u = 2(x − lower)/size − 1`).
fn fill_gradient_rows(
    family: BasisFamily,
    grid: &Grid,
    exponents: &[Vec<usize>],
    u: &DVector<f64>,
    out: &mut DMatrix<f64>,
) {
    let (values, derivs) = tables(family, exponents, u);
    for d in 0..grid.dims() {
        let scale = 2.0 / grid.size(d);
        for (k, e) in exponents.iter().enumerate() {
            let mut g = scale * derivs[d][e[d]];
            for (other, &j) in e.iter().enumerate() {
                if other != d {
                    g *= values[other][j];
                }
            }
            out[(d, k)] = g;
        }
    }
}
