//! Gated refit of the free-energy expansion.
//!
//! Given the accumulated grids of a state and a gate flag, either:
//! - normalize `fsum` by the visit counts (empty bins count as one visit) and
//!   fit a fresh set of coefficients, or
//! - hand back the previous coefficients untouched.
//!
//! The fitter keeps no counters; deciding *when* to refit is the sampler's job.

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::method::accumulator::average_forces;
use crate::models::{Fun, SpectralGradientFit};

#[derive(Debug, Clone)]
pub struct FreeEnergyFitter {
    model: Arc<SpectralGradientFit>,
}

impl FreeEnergyFitter {
    pub fn new(model: Arc<SpectralGradientFit>) -> Self {
        Self { model }
    }

    /// Coefficients fitted to `fsum / max(hist, 1)`.
    pub fn fit(&self, hist: &[u64], fsum: &DMatrix<f64>) -> Fun {
        let mean_forces = average_forces(hist, fsum, 1);
        self.model.fit(&mean_forces)
    }

    /// Refit when `gate` is set, otherwise share `previous`.
    pub fn fit_forces(
        &self,
        hist: &[u64],
        fsum: &DMatrix<f64>,
        previous: &Arc<Fun>,
        gate: bool,
    ) -> Arc<Fun> {
        if gate {
            let fun = self.fit(hist, fsum);
            log::debug!(
                "refitted free-energy expansion ({} coefficients, {} visits)",
                fun.coefficients().len(),
                hist.iter().sum::<u64>()
            );
            Arc::new(fun)
        } else {
            Arc::clone(previous)
        }
    }
}
