//! Basis-function model of the free energy.
//!
//! Models are kept as a small, pure fit/evaluate API so the sampling method can
//! stay agnostic of the basis in use.

pub mod fun;
pub mod model;

pub use fun::*;
pub use model::*;
