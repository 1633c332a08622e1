//! Analytic external potentials for the demo simulation.
//!
//! All potentials act on the x coordinate of every particle and keep y and z
//! near the origin with a harmonic confinement, so a `Component(atom, 0)` CV
//! sees a one-dimensional landscape with a known free energy.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::domain::{PotentialKind, SimulationConfig};

/// A conservative force field.
pub trait Potential: std::fmt::Debug + Send + Sync {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64;

    /// `−∇U`, one entry per particle.
    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>>;
}

/// `barrier · ((x/minimum)² − 1)²`: wells at `±minimum`, barrier at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleWell {
    pub barrier: f64,
    pub minimum: f64,
    pub confinement: f64,
}

/// `barrier · (1 − cos(2πx/period)) / 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cosine {
    pub barrier: f64,
    pub period: f64,
    pub confinement: f64,
}

/// Free diffusion along x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flat {
    pub confinement: f64,
}

/// A potential along x plus the shared y/z confinement.
trait AxialPotential {
    fn energy_x(&self, x: f64) -> f64;
    fn force_x(&self, x: f64) -> f64;
    fn confinement(&self) -> f64;
}

impl AxialPotential for DoubleWell {
    fn energy_x(&self, x: f64) -> f64 {
        let s = x / self.minimum;
        self.barrier * (s * s - 1.0).powi(2)
    }

    fn force_x(&self, x: f64) -> f64 {
        let s = x / self.minimum;
        -4.0 * self.barrier * s * (s * s - 1.0) / self.minimum
    }

    fn confinement(&self) -> f64 {
        self.confinement
    }
}

impl AxialPotential for Cosine {
    fn energy_x(&self, x: f64) -> f64 {
        self.barrier * (1.0 - (2.0 * PI * x / self.period).cos()) / 2.0
    }

    fn force_x(&self, x: f64) -> f64 {
        -self.barrier * PI / self.period * (2.0 * PI * x / self.period).sin()
    }

    fn confinement(&self) -> f64 {
        self.confinement
    }
}

impl AxialPotential for Flat {
    fn energy_x(&self, _x: f64) -> f64 {
        0.0
    }

    fn force_x(&self, _x: f64) -> f64 {
        0.0
    }

    fn confinement(&self) -> f64 {
        self.confinement
    }
}

fn axial_energy(p: &impl AxialPotential, positions: &[Vector3<f64>]) -> f64 {
    let k = p.confinement();
    positions
        .iter()
        .map(|r| p.energy_x(r.x) + 0.5 * k * (r.y * r.y + r.z * r.z))
        .sum()
}

fn axial_forces(p: &impl AxialPotential, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let k = p.confinement();
    positions
        .iter()
        .map(|r| Vector3::new(p.force_x(r.x), -k * r.y, -k * r.z))
        .collect()
}

impl Potential for DoubleWell {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        axial_energy(self, positions)
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        axial_forces(self, positions)
    }
}

impl Potential for Cosine {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        axial_energy(self, positions)
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        axial_forces(self, positions)
    }
}

impl Potential for Flat {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        axial_energy(self, positions)
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        axial_forces(self, positions)
    }
}

/// The potential selected by a simulation config.
pub fn potential_from_config(config: &SimulationConfig) -> Box<dyn Potential> {
    match config.potential {
        PotentialKind::DoubleWell => Box::new(DoubleWell {
            barrier: config.barrier,
            minimum: config.length,
            confinement: config.confinement,
        }),
        PotentialKind::Cosine => Box::new(Cosine {
            barrier: config.barrier,
            period: config.length,
            confinement: config.confinement,
        }),
        PotentialKind::Flat => Box::new(Flat {
            confinement: config.confinement,
        }),
    }
}
