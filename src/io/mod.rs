//! Input/output helpers.
//!
//! - method configuration files (`config`)
//! - per-bin CSV exports (`export`)
//! - profile JSON read/write (`profile`)

pub mod config;
pub mod export;
pub mod profile;

pub use config::*;
pub use export::*;
pub use profile::*;
