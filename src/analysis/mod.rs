//! Post-run analysis of Spectral ABF states.
//!
//! For every replica this turns the accumulated grids into:
//!
//! - the visit histogram
//! - the binned mean force `fsum / max(hist, 1)`
//! - the fitted free-energy expansion, evaluated over the grid mesh
//! - a callable bound to that fit, for evaluating the surface anywhere
//!
//! A single replica yields plain values; several replicas yield one value per
//! replica in input order.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AbfError;
use crate::method::accumulator::average_forces;
use crate::method::{SpectralAbf, SpectralAbfState};
use crate::models::{Fun, SpectralGradientFit};

/// A value for a single replica, or one value per replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Unwraps single-element vectors.
    pub fn from_vec(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(value) = values.pop() {
                return OneOrMany::One(value);
            }
        }
        OneOrMany::Many(values)
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// The free-energy surface of one fit, evaluable at arbitrary CV values.
#[derive(Clone)]
pub struct FreeEnergyFn {
    model: Arc<SpectralGradientFit>,
    fun: Arc<Fun>,
}

impl FreeEnergyFn {
    pub fn new(model: Arc<SpectralGradientFit>, fun: Arc<Fun>) -> Self {
        Self { model, fun }
    }

    pub fn call(&self, x: &DVector<f64>) -> f64 {
        self.model.evaluate(&self.fun, x)
    }

    /// Evaluate at every row of `points`.
    pub fn call_rows(&self, points: &DMatrix<f64>) -> Vec<f64> {
        self.model.evaluate_rows(&self.fun, points)
    }

    /// Gradient of the surface, i.e. the fitted mean force.
    pub fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        self.model.gradient(&self.fun, x)
    }

    pub fn fun(&self) -> &Arc<Fun> {
        &self.fun
    }
}

impl fmt::Debug for FreeEnergyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeEnergyFn")
            .field("n_basis", &self.model.n_basis())
            .field("periodic", &self.fun.is_periodic())
            .finish()
    }
}

/// Analysis of one replica.
#[derive(Debug, Clone)]
pub struct ReplicaAnalysis {
    pub histogram: Vec<u64>,
    /// `n_bins × dims`.
    pub mean_force: DMatrix<f64>,
    /// Expansion evaluated at each mesh row.
    pub free_energy: Vec<f64>,
    pub fun: Arc<Fun>,
    pub fes_fn: FreeEnergyFn,
}

/// Result of [`analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Physical CV coordinates of the bin nodes, one row per bin.
    pub mesh: DMatrix<f64>,
    pub histogram: OneOrMany<Vec<u64>>,
    pub mean_force: OneOrMany<DMatrix<f64>>,
    pub free_energy: OneOrMany<Vec<f64>>,
    pub fun: OneOrMany<Arc<Fun>>,
    pub fes_fn: OneOrMany<FreeEnergyFn>,
}

impl Analysis {
    pub fn replicas(&self) -> usize {
        self.histogram.len()
    }
}

/// Analyze the final states of one or more replicas.
///
/// The surfaces come from each state's last fitted expansion; grids accumulated
/// after that refit show up in `histogram` and `mean_force` only.
pub fn analyze(method: &SpectralAbf, states: &[SpectralAbfState]) -> Result<Analysis, AbfError> {
    if states.is_empty() {
        return Err(AbfError::configuration("no states to analyze"));
    }
    let grid = method.grid();
    for (r, state) in states.iter().enumerate() {
        if state.hist.len() != grid.n_bins() || state.fsum.shape() != (grid.n_bins(), grid.dims()) {
            return Err(AbfError::configuration(format!(
                "state of replica {r} does not match the method grid (hist {} bins, fsum {:?})",
                state.hist.len(),
                state.fsum.shape()
            )));
        }
    }

    let mesh = grid.mesh();
    let model = method.model();
    let replicas: Vec<ReplicaAnalysis> = states
        .par_iter()
        .map(|state| analyze_replica(model, &mesh, state))
        .collect();

    let mut histogram = Vec::with_capacity(replicas.len());
    let mut mean_force = Vec::with_capacity(replicas.len());
    let mut free_energy = Vec::with_capacity(replicas.len());
    let mut fun = Vec::with_capacity(replicas.len());
    let mut fes_fn = Vec::with_capacity(replicas.len());
    for replica in replicas {
        histogram.push(replica.histogram);
        mean_force.push(replica.mean_force);
        free_energy.push(replica.free_energy);
        fun.push(replica.fun);
        fes_fn.push(replica.fes_fn);
    }

    Ok(Analysis {
        mesh,
        histogram: OneOrMany::from_vec(histogram),
        mean_force: OneOrMany::from_vec(mean_force),
        free_energy: OneOrMany::from_vec(free_energy),
        fun: OneOrMany::from_vec(fun),
        fes_fn: OneOrMany::from_vec(fes_fn),
    })
}

fn analyze_replica(
    model: &Arc<SpectralGradientFit>,
    mesh: &DMatrix<f64>,
    state: &SpectralAbfState,
) -> ReplicaAnalysis {
    let fun = Arc::clone(&state.fun);
    let fes_fn = FreeEnergyFn::new(Arc::clone(model), Arc::clone(&fun));

    ReplicaAnalysis {
        histogram: state.hist.clone(),
        mean_force: average_forces(&state.hist, &state.fsum, 1),
        free_energy: fes_fn.call_rows(mesh),
        fun,
        fes_fn,
    }
}
