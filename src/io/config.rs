//! Method configuration files.
//!
//! A method file is the JSON form of `SpectralAbfConfig`; only `grid` is
//! required:
//!
//! ```json
//! {
//!   "grid": { "lower": [-2.0], "upper": [2.0], "shape": [32] },
//!   "N": 200,
//!   "fit_freq": 50,
//!   "restraints": { "lower": [-2.0], "upper": [2.0], "k_lower": [10.0], "k_upper": [10.0] }
//! }
//! ```

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::method::SpectralAbfConfig;

/// Read and validate a method configuration file.
pub fn read_method_config(path: &Path) -> Result<SpectralAbfConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open method config '{}': {e}", path.display())))?;
    let config: SpectralAbfConfig = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid method config '{}': {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
