//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the per-step host data handed to the sampler (`Snapshot`)
//! - demo simulation settings (`PotentialKind`, `SimulationConfig`)
//! - the full run configuration (`RunConfig`)
//! - the exported profile schema (`ProfileFile`)

pub mod types;

pub use types::*;
