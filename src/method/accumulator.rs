//! Histogram and cumulative-force grids.
//!
//! The grids live in [`SpectralAbfState`](crate::method::SpectralAbfState);
//! these helpers are the only code that writes or normalizes them.

use nalgebra::{DMatrix, DVector};

/// Record one visit to `bin` carrying the generalized force `addend`.
///
/// # Panics
/// Panics if `bin` is out of range or `addend` does not have one entry per CV dimension.
pub fn accumulate(hist: &mut [u64], fsum: &mut DMatrix<f64>, bin: usize, addend: &DVector<f64>) {
    hist[bin] += 1;
    let mut row = fsum.row_mut(bin);
    row += addend.transpose();
}

/// `fsum[bin] / max(hist[bin], floor)`.
pub fn average_force_at(hist: &[u64], fsum: &DMatrix<f64>, bin: usize, floor: u64) -> DVector<f64> {
    let denom = hist[bin].max(floor) as f64;
    fsum.row(bin).transpose() / denom
}

/// `fsum / max(hist, floor)` for every bin, broadcast across the CV axis.
pub fn average_forces(hist: &[u64], fsum: &DMatrix<f64>, floor: u64) -> DMatrix<f64> {
    let mut out = fsum.clone();
    for (bin, mut row) in out.row_iter_mut().enumerate() {
        let denom = hist.get(bin).copied().unwrap_or(0).max(floor) as f64;
        row /= denom;
    }
    out
}
