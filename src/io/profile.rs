//! Read/write profile JSON files.
//!
//! Profile JSON is the "portable" representation of a finished run:
//! - the method configuration (with the grid actually sampled)
//! - the simulation settings
//! - the mesh, and per replica the histogram, mean force, free energy and
//!   expansion coefficients
//!
//! The schema is defined by `domain::ProfileFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::app::pipeline::RunOutput;
use crate::domain::{ProfileFile, ReplicaProfile, RunConfig};
use crate::error::AppError;
use crate::models::SpectralGradientFit;

/// Collect the exportable parts of a run.
pub fn build_profile(run: &RunOutput, config: &RunConfig) -> ProfileFile {
    let analysis = &run.analysis;
    let replicas = run
        .replicas
        .iter()
        .enumerate()
        .map(|(r, replica)| ReplicaProfile {
            seed: replica.seed,
            histogram: analysis.histogram.as_slice()[r].clone(),
            mean_force: analysis.mean_force.as_slice()[r].clone(),
            free_energy: analysis.free_energy.as_slice()[r].clone(),
            fun: analysis.fun.as_slice()[r].clone(),
        })
        .collect();

    ProfileFile {
        tool: "sabf".to_string(),
        created_at: Utc::now(),
        method: run.method.config().clone(),
        simulation: config.simulation.clone(),
        mesh: analysis.mesh.clone(),
        replicas,
    }
}

/// Write a profile JSON file.
pub fn write_profile_json(path: &Path, profile: &ProfileFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create profile JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, profile)
        .map_err(|e| AppError::new(2, format!("Failed to write profile JSON: {e}")))?;
    log::info!("wrote profile to {}", path.display());
    Ok(())
}

/// Read a profile JSON file.
pub fn read_profile_json(path: &Path) -> Result<ProfileFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open profile JSON '{}': {e}", path.display())))?;
    let profile: ProfileFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid profile JSON: {e}")))?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Every replica must match the grid stored in the profile, coefficients included.
pub fn validate_profile(profile: &ProfileFile) -> Result<(), AppError> {
    profile.method.validate()?;
    let grid = &profile.method.grid;
    let (n_bins, dims) = (grid.n_bins(), grid.dims());
    if profile.mesh.shape() != (n_bins, dims) {
        return Err(AppError::new(
            2,
            format!("Profile mesh has shape {:?}; the grid needs ({n_bins}, {dims}).", profile.mesh.shape()),
        ));
    }

    let model = SpectralGradientFit::new(grid)?;
    for (r, replica) in profile.replicas.iter().enumerate() {
        let shapes_match = replica.histogram.len() == n_bins
            && replica.free_energy.len() == n_bins
            && replica.mean_force.shape() == (n_bins, dims);
        if !shapes_match {
            return Err(AppError::new(
                2,
                format!("Profile replica {r} does not match the grid shape {:?}.", grid.shape()),
            ));
        }
        model
            .check_fun(&replica.fun)
            .map_err(|e| AppError::new(2, format!("Profile replica {r}: {e}")))?;
    }
    Ok(())
}
