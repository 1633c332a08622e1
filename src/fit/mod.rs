//! Free-energy fitting.
//!
//! Responsibilities:
//!
//! - normalize the accumulated force grid into mean forces
//! - refit the spectral expansion on gated steps, share it otherwise

pub mod fitter;

pub use fitter::*;
