//! Export per-bin results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts:
//! one row per (replica, bin), mesh coordinates first.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::analysis::Analysis;
use crate::error::AppError;
use crate::report::relative_free_energy;

/// Write per-bin results to a CSV file.
pub fn write_profile_csv(path: &Path, analysis: &Analysis) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_profile_rows(&mut file, analysis)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))?;
    log::info!("wrote per-bin results to {}", path.display());
    Ok(())
}

fn write_profile_rows(out: &mut impl Write, analysis: &Analysis) -> std::io::Result<()> {
    let mesh = &analysis.mesh;
    let dims = mesh.ncols();

    // Header
    let mut header = vec!["replica".to_string(), "bin".to_string()];
    header.extend((0..dims).map(|d| format!("xi_{d}")));
    header.push("histogram".to_string());
    header.extend((0..dims).map(|d| format!("mean_force_{d}")));
    header.push("free_energy".to_string());
    header.push("relative_free_energy".to_string());
    writeln!(out, "{}", header.join(","))?;

    let histograms = analysis.histogram.as_slice();
    let mean_forces = analysis.mean_force.as_slice();
    let free_energies = analysis.free_energy.as_slice();
    for (r, ((hist, mean_force), free_energy)) in histograms.iter().zip(mean_forces).zip(free_energies).enumerate() {
        let relative = relative_free_energy(free_energy);
        for bin in 0..mesh.nrows() {
            let mut row = vec![r.to_string(), bin.to_string()];
            row.extend((0..dims).map(|d| format!("{:.10}", mesh[(bin, d)])));
            row.push(hist[bin].to_string());
            row.extend((0..dims).map(|d| format!("{:.10}", mean_force[(bin, d)])));
            row.push(format!("{:.10}", free_energy[bin]));
            row.push(format!("{:.10}", relative[bin]));
            writeln!(out, "{}", row.join(","))?;
        }
    }
    Ok(())
}
