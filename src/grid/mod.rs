//! CV-space grids: geometry, bin lookup and mesh nodes.
//!
//! A grid covers the box `[lower, upper]` with `shape[d]` bins along each CV
//! dimension. Bins are stored flat in row-major order (last dimension fastest).
//!
//! Two node distributions are supported:
//!
//! - `Regular`: equally spaced bins. Used for periodic CVs.
//! - `Chebyshev`: bins bounded by `acos`-spaced nodes, denser near the box
//!   edges. Non-periodic grids are converted to this kind by the sampling
//!   method so the Chebyshev expansion is fitted on its natural nodes.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::AbfError;

/// Node distribution of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    #[default]
    Regular,
    Chebyshev,
}

/// A rectangular CV-space grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    lower: Vec<f64>,
    upper: Vec<f64>,
    shape: Vec<usize>,
    #[serde(default)]
    periodic: bool,
    #[serde(default)]
    kind: GridKind,
}

impl Grid {
    /// Build a regular grid, validating its geometry.
    pub fn new(
        lower: Vec<f64>,
        upper: Vec<f64>,
        shape: Vec<usize>,
        periodic: bool,
    ) -> Result<Self, AbfError> {
        let grid = Self {
            lower,
            upper,
            shape,
            periodic,
            kind: GridKind::Regular,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Check dimensions and bounds. Deserialized grids go through this too.
    pub fn validate(&self) -> Result<(), AbfError> {
        let dims = self.shape.len();
        if dims == 0 {
            return Err(AbfError::configuration("grid must have at least one dimension"));
        }
        if self.lower.len() != dims || self.upper.len() != dims {
            return Err(AbfError::configuration(format!(
                "grid bounds have lengths lower={}, upper={} but shape has {dims} dimensions",
                self.lower.len(),
                self.upper.len()
            )));
        }
        if let Some(d) = self.shape.iter().position(|&n| n == 0) {
            return Err(AbfError::configuration(format!("grid dimension {d} has zero bins")));
        }
        for d in 0..dims {
            let (lo, hi) = (self.lower[d], self.upper[d]);
            if !(lo.is_finite() && hi.is_finite() && hi > lo) {
                return Err(AbfError::configuration(format!(
                    "invalid grid bounds along dimension {d}: lower={lo}, upper={hi} (must be finite with upper>lower)"
                )));
            }
        }
        Ok(())
    }

    /// The same box and bin counts with Chebyshev-distributed nodes.
    pub fn into_chebyshev(self) -> Self {
        Self {
            kind: GridKind::Chebyshev,
            ..self
        }
    }

    pub fn dims(&self) -> usize {
        self.shape.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn kind(&self) -> GridKind {
        self.kind
    }

    /// Box length along dimension `d`.
    pub fn size(&self, d: usize) -> f64 {
        self.upper[d] - self.lower[d]
    }

    pub fn n_bins(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether `x` lies inside the box along dimension `d` (bounds inclusive).
    pub fn contains(&self, d: usize, x: f64) -> bool {
        x >= self.lower[d] && x <= self.upper[d]
    }

    /// Flat row-major position of a bin, or `None` if any coordinate is out of range.
    pub fn flat_index(&self, bin: &BinIndex) -> Option<usize> {
        if bin.coords.len() != self.dims() {
            return None;
        }
        let mut flat = 0usize;
        for (&i, &n) in bin.coords.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        Some(flat)
    }

    /// Inverse of [`Grid::flat_index`].
    pub fn unflatten(&self, mut flat: usize) -> BinIndex {
        let mut coords = vec![0; self.dims()];
        for d in (0..self.dims()).rev() {
            coords[d] = flat % self.shape[d];
            flat /= self.shape[d];
        }
        BinIndex { coords }
    }

    /// Mesh nodes of dimension `d` on the reference interval `[-1, 1]`.
    pub fn nodes(&self, d: usize) -> Vec<f64> {
        let n = self.shape[d];
        match self.kind {
            GridKind::Regular => {
                let h = 2.0 / n as f64;
                (0..n).map(|i| -1.0 + h / 2.0 + h * i as f64).collect()
            }
            GridKind::Chebyshev => (0..n)
                .map(|i| -(PI * (i as f64 + 0.5) / n as f64).cos())
                .collect(),
        }
    }

    /// Reference-interval mesh: one row per bin (flat order), one column per dimension.
    pub fn reference_mesh(&self) -> DMatrix<f64> {
        let nodes: Vec<Vec<f64>> = (0..self.dims()).map(|d| self.nodes(d)).collect();
        DMatrix::from_fn(self.n_bins(), self.dims(), |row, d| {
            nodes[d][self.unflatten(row).coords[d]]
        })
    }

    /// Mesh in CV units: `(node + 1) * size / 2 + lower`.
    pub fn mesh(&self) -> DMatrix<f64> {
        let mut mesh = self.reference_mesh();
        for d in 0..self.dims() {
            let (lower, size) = (self.lower[d], self.size(d));
            mesh.column_mut(d)
                .apply(|u| *u = (*u + 1.0) * size / 2.0 + lower);
        }
        mesh
    }

    /// Map a CV value to reference coordinates `u ∈ [-1, 1]` (unclamped).
    pub fn to_reference(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.dims(), |d, _| {
            2.0 * (x[d] - self.lower[d]) / self.size(d) - 1.0
        })
    }
}

/// A bin coordinate tuple. A coordinate equal to `shape[d]` marks "outside the grid".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinIndex {
    pub coords: Vec<usize>,
}

impl BinIndex {
    pub fn new(coords: Vec<usize>) -> Self {
        Self { coords }
    }

    /// Whether any coordinate lies outside `shape`.
    pub fn is_outside(&self, shape: &[usize]) -> bool {
        self.coords.iter().zip(shape).any(|(&i, &n)| i >= n)
    }
}

/// Maps CV values to bins of a fixed grid.
///
/// Built once from the grid and reused for every step.
#[derive(Debug, Clone)]
pub struct GridIndexer {
    grid: Grid,
}

impl GridIndexer {
    pub fn new(grid: &Grid) -> Self {
        Self { grid: grid.clone() }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn index(&self, xi: &DVector<f64>) -> BinIndex {
        let grid = &self.grid;
        let coords = (0..grid.dims())
            .map(|d| {
                let n = grid.shape[d];
                let x = xi.get(d).copied().unwrap_or(f64::NAN);
                match grid.kind {
                    GridKind::Regular => regular_index(x, grid.lower[d], grid.size(d), n, grid.periodic),
                    GridKind::Chebyshev => chebyshev_index(x, grid.lower[d], grid.size(d), n),
                }
            })
            .collect();
        BinIndex { coords }
    }
}

fn regular_index(x: f64, lower: f64, size: f64, n: usize, periodic: bool) -> usize {
    let h = size / n as f64;
    let raw = ((x - lower) / h).floor();
    if !raw.is_finite() {
        return n;
    }
    if periodic {
        return (raw as i64).rem_euclid(n as i64) as usize;
    }
    if raw < 0.0 || raw > (n - 1) as f64 {
        n
    } else {
        raw as usize
    }
}

fn chebyshev_index(x: f64, lower: f64, size: f64, n: usize) -> usize {
    // acos is NaN outside [-1, 1], which is exactly "outside the box".
    let v = 1.0 - 2.0 * (x - lower) / size;
    let raw = (n as f64 * v.acos() / PI).floor();
    if raw.is_nan() {
        n
    } else {
        (raw as usize).min(n)
    }
}
