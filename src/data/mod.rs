//! Demo host simulation: analytic potentials and a Langevin integrator.

pub mod langevin;
pub mod potential;

pub use langevin::*;
pub use potential::*;
