//! Per-replica sampler state.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Vector3};

use crate::grid::BinIndex;
use crate::models::Fun;

/// Spectral ABF state of one replica.
///
/// Produced by `Sampler::initialize` and replaced by every `Sampler::update`;
/// the update loop of a replica is its only owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAbfState {
    /// Last CV value recorded in the simulation.
    pub xi: DVector<f64>,
    /// Biasing force on each particle.
    pub bias: Vec<Vector3<f64>>,
    /// Visits per bin (flat, row-major).
    pub hist: Vec<u64>,
    /// Cumulative generalized force, `n_bins × dims`.
    pub fsum: DMatrix<f64>,
    /// Force estimate of the last step (CV space).
    pub force: DVector<f64>,
    /// Estimate of `W p`, with `W` the Moore–Penrose inverse of the CV Jacobian.
    pub wp: DVector<f64>,
    /// `wp` of the previous step.
    pub wp_prev: DVector<f64>,
    /// Coefficients of the free-energy expansion.
    pub fun: Arc<Fun>,
    /// Number of the next update, starting at 1.
    pub nstep: u64,
}

impl SpectralAbfState {
    /// Total number of accumulated visits.
    pub fn visits(&self) -> u64 {
        self.hist.iter().sum()
    }

    /// Number of bins visited at least once.
    pub fn visited_bins(&self) -> usize {
        self.hist.iter().filter(|&&h| h > 0).count()
    }
}

/// Read-only view handed to the force estimator within one step.
#[derive(Debug, Clone, Copy)]
pub struct PartialSpectralAbfState<'a> {
    pub xi: &'a DVector<f64>,
    pub hist: &'a [u64],
    pub fsum: &'a DMatrix<f64>,
    pub bin: &'a BinIndex,
    pub fun: &'a Fun,
    pub in_fitting_regime: bool,
}
