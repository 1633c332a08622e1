//! Harmonic walls used when the CV leaves the grid.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::AbfError;
use crate::grid::Grid;

/// Per-dimension harmonic walls at `lower` and `upper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restraints {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub k_lower: Vec<f64>,
    pub k_upper: Vec<f64>,
}

impl Restraints {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>, k_lower: Vec<f64>, k_upper: Vec<f64>) -> Self {
        Self {
            lower,
            upper,
            k_lower,
            k_upper,
        }
    }

    /// Walls at the grid boundaries with the same stiffness everywhere.
    pub fn at_grid_bounds(grid: &Grid, k: f64) -> Self {
        let dims = grid.dims();
        Self::new(
            grid.lower().to_vec(),
            grid.upper().to_vec(),
            vec![k; dims],
            vec![k; dims],
        )
    }

    pub fn dims(&self) -> usize {
        self.lower.len()
    }

    /// The walls must match the grid dimensionality and sit inside its box.
    pub fn validate(&self, grid: &Grid) -> Result<(), AbfError> {
        let dims = grid.dims();
        let lengths = [
            self.lower.len(),
            self.upper.len(),
            self.k_lower.len(),
            self.k_upper.len(),
        ];
        if lengths.iter().any(|&n| n != dims) {
            return Err(AbfError::configuration(format!(
                "restraint vectors have lengths {lengths:?} but the grid has {dims} dimensions"
            )));
        }

        for d in 0..dims {
            let (lo, hi) = (self.lower[d], self.upper[d]);
            if !(lo.is_finite() && hi.is_finite() && hi > lo) {
                return Err(AbfError::configuration(format!(
                    "invalid restraint bounds along dimension {d}: lower={lo}, upper={hi}"
                )));
            }
            if !grid.contains(d, lo) || !grid.contains(d, hi) {
                return Err(AbfError::configuration(format!(
                    "restraint bounds [{lo}, {hi}] along dimension {d} lie outside the grid domain [{}, {}]",
                    grid.lower()[d],
                    grid.upper()[d]
                )));
            }
            for k in [self.k_lower[d], self.k_upper[d]] {
                if !(k.is_finite() && k >= 0.0) {
                    return Err(AbfError::configuration(format!(
                        "restraint stiffness along dimension {d} must be finite and non-negative (got {k})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Pseudo-force `k_lower·(lower − xi)` below the box, `k_upper·(upper − xi)` above it, zero inside.
    ///
    /// The sampler applies `bias = −Jᵗ·force`, so the resulting bias points
    /// away from the box: the walls push an escaped CV further out, and the
    /// physical potential has to bring it back.
    pub fn force(&self, xi: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.dims(), |d, _| {
            let x = xi[d];
            if x < self.lower[d] {
                self.k_lower[d] * (self.lower[d] - x)
            } else if x > self.upper[d] {
                self.k_upper[d] * (self.upper[d] - x)
            } else {
                0.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(vec![0.0], vec![10.0], vec![10], false).unwrap()
    }

    #[test]
    fn force_is_piecewise_harmonic() {
        let r = Restraints::new(vec![2.0], vec![8.0], vec![3.0], vec![4.0]);
        assert_eq!(r.force(&DVector::from_element(1, -1.0))[0], 9.0);
        assert_eq!(r.force(&DVector::from_element(1, 12.0))[0], -16.0);
        assert_eq!(r.force(&DVector::from_element(1, 5.0))[0], 0.0);
        assert_eq!(r.force(&DVector::from_element(1, 2.0))[0], 0.0);
    }

    #[test]
    fn bounds_outside_grid_are_rejected() {
        let r = Restraints::new(vec![-1.0], vec![8.0], vec![1.0], vec![1.0]);
        assert!(matches!(r.validate(&grid()), Err(AbfError::Configuration(_))));

        let r = Restraints::new(vec![1.0], vec![10.5], vec![1.0], vec![1.0]);
        assert!(matches!(r.validate(&grid()), Err(AbfError::Configuration(_))));
    }

    #[test]
    fn mismatched_dimensions_and_negative_stiffness_are_rejected() {
        let r = Restraints::new(vec![1.0, 1.0], vec![8.0, 8.0], vec![1.0, 1.0], vec![1.0, 1.0]);
        assert!(r.validate(&grid()).is_err());

        let r = Restraints::new(vec![1.0], vec![8.0], vec![-1.0], vec![1.0]);
        assert!(r.validate(&grid()).is_err());
    }

    #[test]
    fn walls_at_grid_bounds_validate() {
        let r = Restraints::at_grid_bounds(&grid(), 25.0);
        assert!(r.validate(&grid()).is_ok());
        assert_eq!(r.k_upper, vec![25.0]);
    }

    #[test]
    fn bias_from_the_walls_points_away_from_the_box() {
        let r = Restraints::new(vec![2.0], vec![8.0], vec![3.0], vec![4.0]);
        // Unit Jacobian: the bias along the CV is the negated force.
        for (xi, outward) in [(12.0, 1.0), (-1.0, -1.0)] {
            let bias = -r.force(&DVector::from_element(1, xi))[0];
            assert!(bias * outward > 0.0, "xi = {xi}, bias = {bias}");
        }
    }
}
