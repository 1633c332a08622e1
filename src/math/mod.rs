//! Mathematical utilities: 1-D basis families and dense linear solvers.

pub mod basis;
pub mod ols;

pub use basis::*;
pub use ols::*;
