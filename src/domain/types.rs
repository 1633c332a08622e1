//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - handed between the host integrator and the sampling method every step
//! - filled from CLI flags / environment variables
//! - exported next to the analysis results (`ProfileFile`)

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

use crate::method::SpectralAbfConfig;
use crate::models::Fun;

/// What the host simulation hands to the sampling method every step.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub positions: Vec<Vector3<f64>>,
    /// Momenta `m·v`, one per particle.
    pub momenta: Vec<Vector3<f64>>,
    /// Integration timestep of this replica.
    pub dt: f64,
}

impl Snapshot {
    pub fn natoms(&self) -> usize {
        self.positions.len()
    }
}

/// External potential driving the demo particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PotentialKind {
    /// `U(x) = barrier · ((x/x0)² − 1)²` with harmonic confinement on y/z.
    DoubleWell,
    /// `U(x) = barrier · (1 − cos(2πx/period)) / 2`, meant for periodic grids.
    Cosine,
    /// No force on x; only the y/z confinement.
    Flat,
}

/// Parameters of the Langevin host simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub potential: PotentialKind,
    /// Barrier height (energy units).
    pub barrier: f64,
    /// Position of the double-well minima / period of the cosine potential.
    pub length: f64,
    /// Harmonic stiffness keeping y and z near zero.
    pub confinement: f64,
    pub mass: f64,
    pub temperature: f64,
    /// Langevin friction coefficient.
    pub gamma: f64,
    pub dt: f64,
    pub steps: usize,
    /// Starting x coordinate.
    pub x0: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            potential: PotentialKind::DoubleWell,
            barrier: 5.0,
            length: 1.0,
            confinement: 10.0,
            mass: 1.0,
            temperature: 1.0,
            gamma: 1.0,
            dt: 0.005,
            steps: 20_000,
            x0: -1.0,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults and an optional method file).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub method: SpectralAbfConfig,
    pub simulation: SimulationConfig,
    pub replicas: usize,
    pub seed: u64,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_profile: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

/// Exported results of one replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaProfile {
    pub seed: u64,
    pub histogram: Vec<u64>,
    /// `n_bins × dims`, rows in mesh order.
    pub mean_force: DMatrix<f64>,
    /// Fitted expansion at each mesh row.
    pub free_energy: Vec<f64>,
    pub fun: Arc<Fun>,
}

/// Profile JSON: everything needed to re-plot or re-evaluate a run's surfaces.
///
/// `method` holds the grid actually sampled (Chebyshev-converted when not
/// periodic), so the basis can be rebuilt from the file alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub method: SpectralAbfConfig,
    pub simulation: SimulationConfig,
    pub mesh: DMatrix<f64>,
    pub replicas: Vec<ReplicaProfile>,
}
