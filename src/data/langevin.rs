//! Langevin dynamics host for the sampling method.
//!
//! Euler–Maruyama integration of
//! `m dv = (F(x) + bias − γ m v) dt + sqrt(2 γ m kT) dW`, all particles sharing
//! one mass. Each replica owns its own seeded generator, so a run is fully
//! reproducible from `(config, seed)`.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::data::potential::Potential;
use crate::domain::{SimulationConfig, Snapshot};
use crate::error::AppError;

#[derive(Debug)]
pub struct Langevin {
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
    forces: Vec<Vector3<f64>>,
    potential: Box<dyn Potential>,
    mass: f64,
    gamma: f64,
    temperature: f64,
    dt: f64,
    rng: StdRng,
}

impl Langevin {
    /// One particle at `(x0, 0, 0)`, velocities drawn from Maxwell–Boltzmann.
    pub fn new(config: &SimulationConfig, potential: Box<dyn Potential>, seed: u64) -> Result<Self, AppError> {
        validate(config)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let positions = vec![Vector3::new(config.x0, 0.0, 0.0)];
        let sigma = (config.temperature / config.mass).sqrt();
        let velocities = positions
            .iter()
            .map(|_| gaussian_vector(&mut rng) * sigma)
            .collect();
        let forces = potential.forces(&positions);

        Ok(Self {
            positions,
            velocities,
            forces,
            potential,
            mass: config.mass,
            gamma: config.gamma,
            temperature: config.temperature,
            dt: config.dt,
            rng,
        })
    }

    /// Current positions and momenta, as handed to the sampler.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            positions: self.positions.clone(),
            momenta: self.velocities.iter().map(|v| v * self.mass).collect(),
            dt: self.dt,
        }
    }

    /// Advance one timestep with an extra force `bias` on each particle.
    ///
    /// # Panics
    /// Panics if `bias` does not have one entry per particle.
    pub fn step(&mut self, bias: &[Vector3<f64>]) {
        assert_eq!(bias.len(), self.positions.len(), "bias must have one entry per particle");
        let inv_m = 1.0 / self.mass;
        let noise_scale = (2.0 * self.gamma * self.temperature * inv_m).sqrt() * self.dt.sqrt();

        for i in 0..self.positions.len() {
            let deterministic = (self.forces[i] + bias[i]) * inv_m - self.velocities[i] * self.gamma;
            let stochastic = gaussian_vector(&mut self.rng) * noise_scale;
            self.velocities[i] += deterministic * self.dt + stochastic;
            self.positions[i] += self.velocities[i] * self.dt;
        }
        self.forces = self.potential.forces(&self.positions);
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn potential_energy(&self) -> f64 {
        self.potential.energy(&self.positions)
    }

    /// Instantaneous kinetic temperature (`k_B = 1`).
    pub fn kinetic_temperature(&self) -> f64 {
        let kinetic: f64 = self
            .velocities
            .iter()
            .map(|v| 0.5 * self.mass * v.norm_squared())
            .sum();
        2.0 * kinetic / (3 * self.positions.len()) as f64
    }
}

fn gaussian_vector(rng: &mut StdRng) -> Vector3<f64> {
    Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    )
}

fn validate(config: &SimulationConfig) -> Result<(), AppError> {
    let positive = [
        ("mass", config.mass),
        ("temperature", config.temperature),
        ("gamma", config.gamma),
        ("dt", config.dt),
        ("length", config.length),
    ];
    for (name, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(AppError::new(2, format!("Simulation {name} must be finite and > 0 (got {value}).")));
        }
    }
    if !(config.barrier.is_finite() && config.confinement.is_finite() && config.confinement >= 0.0) {
        return Err(AppError::new(2, "Invalid barrier or confinement settings."));
    }
    if !config.x0.is_finite() {
        return Err(AppError::new(2, "Starting position must be finite."));
    }
    Ok(())
}
