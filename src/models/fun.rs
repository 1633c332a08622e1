//! Coefficients of a fitted basis-function expansion.

use serde::{Deserialize, Serialize};

/// Coefficients of the free-energy expansion produced by one fit.
///
/// A `Fun` is never modified after construction: a refit builds a new value and
/// the sampler swaps the shared handle, so older states keep the coefficients
/// they were computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fun {
    periodic: bool,
    coefficients: Vec<f64>,
}

impl Fun {
    pub fn new(periodic: bool, coefficients: Vec<f64>) -> Self {
        Self {
            periodic,
            coefficients,
        }
    }

    pub fn zeros(periodic: bool, n: usize) -> Self {
        Self::new(periodic, vec![0.0; n])
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|&c| c == 0.0)
    }
}
