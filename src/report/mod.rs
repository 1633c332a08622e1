//! Reporting utilities: per-replica summaries and relative free energies.

use crate::app::pipeline::RunOutput;

pub mod format;

pub use format::*;

/// Headline numbers of one replica.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSummary {
    pub seed: u64,
    pub visits: u64,
    pub visited_bins: usize,
    pub n_bins: usize,
    pub restrained_steps: u64,
    /// Highest point of the relative free energy over the mesh.
    pub max_free_energy: f64,
}

/// `max(F) − F`: the fitted expansion tracks the mean force, i.e. minus the
/// free-energy gradient, so flipping it against its maximum gives a free energy
/// whose global minimum is zero.
pub fn relative_free_energy(fitted: &[f64]) -> Vec<f64> {
    let max = fitted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![0.0; fitted.len()];
    }
    fitted.iter().map(|&f| max - f).collect()
}

/// Summarize every replica of a run, in replica order.
pub fn summarize_replicas(run: &RunOutput) -> Vec<ReplicaSummary> {
    let free_energies = run.analysis.free_energy.as_slice();
    run.replicas
        .iter()
        .zip(free_energies)
        .map(|(replica, free_energy)| ReplicaSummary {
            seed: replica.seed,
            visits: replica.state.visits(),
            visited_bins: replica.state.visited_bins(),
            n_bins: replica.state.hist.len(),
            restrained_steps: replica.restrained_steps,
            max_free_energy: relative_free_energy(free_energy)
                .into_iter()
                .fold(0.0, f64::max),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_free_energy_has_zero_minimum() {
        let rel = relative_free_energy(&[1.0, 3.0, -2.0]);
        assert_eq!(rel, vec![2.0, 0.0, 5.0]);
    }

    #[test]
    fn relative_free_energy_of_nothing_is_nothing() {
        assert!(relative_free_energy(&[]).is_empty());
        assert_eq!(relative_free_energy(&[f64::NAN, f64::NAN]), vec![0.0, 0.0]);
    }
}
