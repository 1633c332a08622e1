//! Error types.
//!
//! - `AbfError` is what the sampling library returns. Every failure of
//!   construction, `update` or analysis is one of three kinds.
//! - `AppError` is what the `sabf` binary reports: a message plus the process
//!   exit code.

use thiserror::Error;

/// Errors raised by the sampling method.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbfError {
    /// Invalid grid, restraint or method setup. Raised before any state exists.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Singular projection systems, invalid timesteps, degenerate CV geometry.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A CV value fell outside the grid and there is no restraint to fall back on.
    #[error("grid index {index:?} is outside grid shape {shape:?} and no restraints are configured")]
    Index { index: Vec<usize>, shape: Vec<usize> },
}

impl AbfError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AbfError::Configuration(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        AbfError::Numerical(message.into())
    }
}

/// What the `sabf` binary reports: a message and the process exit code.
///
/// Exit codes: 2 for configuration and I/O problems, 4 for numerical failures,
/// 5 when the CV leaves an unrestrained grid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AbfError> for AppError {
    fn from(err: AbfError) -> Self {
        let exit_code = match err {
            AbfError::Configuration(_) => 2,
            AbfError::Numerical(_) => 4,
            AbfError::Index { .. } => 5,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abf_errors_map_to_distinct_exit_codes() {
        let config: AppError = AbfError::configuration("bad grid").into();
        let numeric: AppError = AbfError::numerical("singular").into();
        let index: AppError = AbfError::Index {
            index: vec![10],
            shape: vec![10],
        }
        .into();

        assert_eq!(config.exit_code(), 2);
        assert_eq!(numeric.exit_code(), 4);
        assert_eq!(index.exit_code(), 5);
        assert!(index.to_string().contains("[10]"));
    }
}
