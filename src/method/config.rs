//! Construction-time configuration of the sampling method.

use serde::{Deserialize, Serialize};

use crate::error::AbfError;
use crate::grid::Grid;
use crate::method::Restraints;

pub const DEFAULT_VISIT_THRESHOLD: u64 = 500;
pub const DEFAULT_FIT_FREQ: u64 = 100;
pub const DEFAULT_FIT_THRESHOLD: u64 = 500;

fn default_visit_threshold() -> u64 {
    DEFAULT_VISIT_THRESHOLD
}

fn default_fit_freq() -> u64 {
    DEFAULT_FIT_FREQ
}

fn default_fit_threshold() -> u64 {
    DEFAULT_FIT_THRESHOLD
}

/// Immutable settings of a Spectral ABF run.
///
/// Can be written by hand as JSON; every field except `grid` has a default:
///
/// ```json
/// { "grid": { "lower": [-2.0], "upper": [2.0], "shape": [32] }, "fit_freq": 50 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralAbfConfig {
    pub grid: Grid,

    /// Visits a bin needs before its force average is used undamped (`N`).
    ///
    /// Below this count the average is divided by `N` instead of the visit
    /// count, which scales down noisy early estimates.
    #[serde(default = "default_visit_threshold", alias = "N")]
    pub visit_threshold: u64,

    /// Refit the expansion every `fit_freq` steps once fitting has started.
    #[serde(default = "default_fit_freq")]
    pub fit_freq: u64,

    /// Number of steps of plain ABF before the expansion is fitted and used.
    #[serde(default = "default_fit_threshold")]
    pub fit_threshold: u64,

    /// Harmonic walls applied whenever the CV leaves the grid.
    #[serde(default)]
    pub restraints: Option<Restraints>,
}

impl SpectralAbfConfig {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            visit_threshold: DEFAULT_VISIT_THRESHOLD,
            fit_freq: DEFAULT_FIT_FREQ,
            fit_threshold: DEFAULT_FIT_THRESHOLD,
            restraints: None,
        }
    }

    pub fn with_visit_threshold(mut self, n: u64) -> Self {
        self.visit_threshold = n;
        self
    }

    pub fn with_fit_freq(mut self, fit_freq: u64) -> Self {
        self.fit_freq = fit_freq;
        self
    }

    pub fn with_fit_threshold(mut self, fit_threshold: u64) -> Self {
        self.fit_threshold = fit_threshold;
        self
    }

    pub fn with_restraints(mut self, restraints: Restraints) -> Self {
        self.restraints = Some(restraints);
        self
    }

    pub fn validate(&self) -> Result<(), AbfError> {
        self.grid.validate()?;
        if self.visit_threshold == 0 {
            return Err(AbfError::configuration("visit threshold N must be >= 1"));
        }
        if self.fit_freq == 0 {
            return Err(AbfError::configuration("fit_freq must be >= 1"));
        }
        if let Some(restraints) = &self.restraints {
            restraints.validate(&self.grid)?;
        }
        Ok(())
    }

    /// Steps past `fit_threshold` use the fitted expansion.
    pub fn in_fitting_regime(&self, nstep: u64) -> bool {
        nstep > self.fit_threshold
    }

    /// Steps on which the expansion is refitted.
    pub fn is_fitting_step(&self, nstep: u64) -> bool {
        self.in_fitting_regime(nstep) && nstep % self.fit_freq == 1
    }

    /// How many refits happen while `update` runs with `nstep = 1..=steps`.
    pub fn refit_count(&self, steps: u64) -> u64 {
        // `nstep % 1` is never 1, so a frequency of one never refits.
        if self.fit_freq < 2 {
            return 0;
        }
        // Values n <= limit with n % fit_freq == 1.
        let count_upto = |limit: u64| -> u64 {
            if limit == 0 {
                0
            } else {
                (limit - 1) / self.fit_freq + 1
            }
        };
        let lower = self.fit_threshold.min(steps);
        count_upto(steps) - count_upto(lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(vec![0.0], vec![10.0], vec![10], false).unwrap()
    }

    #[test]
    fn json_defaults_match_documented_values() {
        let json = r#"{ "grid": { "lower": [0.0], "upper": [10.0], "shape": [10] } }"#;
        let config: SpectralAbfConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.visit_threshold, 500);
        assert_eq!(config.fit_freq, 100);
        assert_eq!(config.fit_threshold, 500);
        assert!(config.restraints.is_none());
        assert!(!config.grid.is_periodic());
    }

    #[test]
    fn n_alias_is_accepted() {
        let json = r#"{ "grid": { "lower": [0.0], "upper": [1.0], "shape": [4] }, "N": 7 }"#;
        let config: SpectralAbfConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.visit_threshold, 7);
    }

    #[test]
    fn zero_fit_freq_is_rejected() {
        let config = SpectralAbfConfig::new(grid()).with_fit_freq(0);
        assert!(matches!(config.validate(), Err(AbfError::Configuration(_))));
    }

    #[test]
    fn fitting_steps_follow_threshold_and_frequency() {
        let config = SpectralAbfConfig::new(grid())
            .with_fit_freq(2)
            .with_fit_threshold(0);
        let steps: Vec<u64> = (1..=6).filter(|&n| config.is_fitting_step(n)).collect();
        assert_eq!(steps, vec![1, 3, 5]);
        assert_eq!(config.refit_count(6), 3);

        let config = SpectralAbfConfig::new(grid());
        assert!(!config.is_fitting_step(401));
        assert!(!config.is_fitting_step(500));
        assert!(config.is_fitting_step(501));
        assert!(!config.is_fitting_step(502));
        assert_eq!(config.refit_count(500), 0);
        assert_eq!(config.refit_count(1000), 5);
    }

    #[test]
    fn refit_count_agrees_with_step_predicate() {
        for &(freq, threshold) in &[(1, 0), (3, 4), (7, 2), (100, 500)] {
            let config = SpectralAbfConfig::new(grid())
                .with_fit_freq(freq)
                .with_fit_threshold(threshold);
            for steps in [0, 1, 5, 17, 250, 1203] {
                let brute = (1..=steps).filter(|&n| config.is_fitting_step(n)).count() as u64;
                assert_eq!(config.refit_count(steps), brute, "freq={freq} threshold={threshold} steps={steps}");
            }
        }
    }
}
