//! `spectral-abf` library crate.
//!
//! Spectral Adaptive Biasing Force: an enhanced-sampling method that biases a
//! simulation with a running estimate of the mean force along a set of
//! collective variables, switching from binned averages to a spectral fit of the
//! free energy once enough statistics have accumulated.
//!
//! The binary (`sabf`) is a thin wrapper around this library so that:
//!
//! - the sampler is testable without spawning processes
//! - any host integrator can drive [`method::Sampler`], not just the demo one
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod cli;
pub mod cv;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod grid;
pub mod io;
pub mod math;
pub mod method;
pub mod models;
pub mod plot;
pub mod report;
