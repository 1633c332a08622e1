//! Spectral Adaptive Biasing Force.
//!
//! Spectral ABF learns the generalized mean force (and the free energy) along a
//! set of collective variables. Early on it behaves like plain ABF: the force
//! applied to a bin is the running average of the generalized force recorded
//! there. Once `fit_threshold` steps have passed, the binned averages are fitted
//! every `fit_freq` steps by a spectral expansion of the free energy, and the
//! simulation is biased with the gradient of that continuous approximation.
//!
//! Usage:
//!
//! ```ignore
//! let method = SpectralAbf::new(SpectralAbfConfig::new(grid))?;
//! let sampler = method.build(Component::new(0, 0), &snapshot)?;
//! let mut state = sampler.initialize();
//! for snapshot in trajectory {
//!     state = sampler.update(&state, &snapshot)?;
//!     // apply `state.bias` to the particles
//! }
//! let analysis = analyze(&method, &[state])?;
//! ```

use std::sync::Arc;

use crate::cv::CollectiveVariable;
use crate::domain::Snapshot;
use crate::error::AbfError;
use crate::fit::FreeEnergyFitter;
use crate::grid::{Grid, GridIndexer, GridKind};
use crate::models::SpectralGradientFit;

pub mod accumulator;
pub mod config;
pub mod estimator;
pub mod restraints;
pub mod sampler;
pub mod state;

pub use config::*;
pub use estimator::*;
pub use restraints::*;
pub use sampler::*;
pub use state::*;

/// A configured Spectral ABF method.
///
/// Construction validates the configuration, switches non-periodic grids to
/// Chebyshev nodes and factors the gradient-fit design matrix once.
#[derive(Debug, Clone)]
pub struct SpectralAbf {
    config: SpectralAbfConfig,
    model: Arc<SpectralGradientFit>,
}

impl SpectralAbf {
    pub fn new(mut config: SpectralAbfConfig) -> Result<Self, AbfError> {
        config.validate()?;
        if !config.grid.is_periodic() && config.grid.kind() != GridKind::Chebyshev {
            config.grid = config.grid.into_chebyshev();
        }
        let model = Arc::new(SpectralGradientFit::new(&config.grid)?);
        log::debug!(
            "spectral ABF: grid shape {:?} ({:?}), {} basis functions, N={}, fit_freq={}, fit_threshold={}",
            config.grid.shape(),
            config.grid.kind(),
            model.n_basis(),
            config.visit_threshold,
            config.fit_freq,
            config.fit_threshold
        );
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &SpectralAbfConfig {
        &self.config
    }

    /// The grid actually used (Chebyshev-converted when not periodic).
    pub fn grid(&self) -> &Grid {
        &self.config.grid
    }

    pub fn model(&self) -> &Arc<SpectralGradientFit> {
        &self.model
    }

    /// Bind the method to a CV and to the particle layout of `snapshot`.
    pub fn build<C: CollectiveVariable>(&self, cv: C, snapshot: &Snapshot) -> Result<Sampler<C>, AbfError> {
        let natoms = snapshot.natoms();
        if natoms == 0 {
            return Err(AbfError::configuration("snapshot contains no atoms"));
        }
        if snapshot.momenta.len() != natoms {
            return Err(AbfError::configuration(format!(
                "snapshot has {natoms} positions but {} momenta",
                snapshot.momenta.len()
            )));
        }
        if cv.dims() != self.grid().dims() {
            return Err(AbfError::configuration(format!(
                "CV has {} dimensions but the grid has {}",
                cv.dims(),
                self.grid().dims()
            )));
        }
        let value = cv.evaluate(&snapshot.positions)?;
        if value.jacobian.shape() != (cv.dims(), 3 * natoms) {
            return Err(AbfError::configuration(format!(
                "CV Jacobian has shape {:?}, expected ({}, {})",
                value.jacobian.shape(),
                cv.dims(),
                3 * natoms
            )));
        }

        Ok(Sampler::new(
            cv,
            natoms,
            self.config.clone(),
            GridIndexer::new(self.grid()),
            FreeEnergyFitter::new(Arc::clone(&self.model)),
            ForceEstimator::new(
                Arc::clone(&self.model),
                self.config.visit_threshold,
                self.config.restraints.clone(),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::Component;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn snapshot(x: f64, px: f64) -> Snapshot {
        Snapshot {
            positions: vec![Vector3::new(x, 0.0, 0.0)],
            momenta: vec![Vector3::new(px, 0.0, 0.0)],
            dt: 0.001,
        }
    }

    fn grid_10() -> Grid {
        Grid::new(vec![0.0], vec![10.0], vec![10], false).unwrap()
    }

    #[test]
    fn non_periodic_grids_become_chebyshev() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10())).unwrap();
        assert_eq!(method.grid().kind(), GridKind::Chebyshev);

        let periodic = Grid::new(vec![0.0], vec![1.0], vec![8], true).unwrap();
        let method = SpectralAbf::new(SpectralAbfConfig::new(periodic)).unwrap();
        assert_eq!(method.grid().kind(), GridKind::Regular);
    }

    #[test]
    fn restraints_outside_the_grid_fail_construction() {
        let config = SpectralAbfConfig::new(grid_10()).with_restraints(Restraints::new(
            vec![-5.0],
            vec![5.0],
            vec![1.0],
            vec![1.0],
        ));
        assert!(matches!(SpectralAbf::new(config), Err(AbfError::Configuration(_))));
    }

    #[test]
    fn build_rejects_cv_grid_dimension_mismatch() {
        let grid = Grid::new(vec![0.0, 0.0], vec![1.0, 1.0], vec![4, 4], false).unwrap();
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid)).unwrap();
        assert!(matches!(
            method.build(Component::new(0, 0), &snapshot(0.5, 0.0)),
            Err(AbfError::Configuration(_))
        ));
    }

    #[test]
    fn initial_state_is_zero_with_step_one() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10())).unwrap();
        let sampler = method.build(Component::new(0, 0), &snapshot(1.0, 0.0)).unwrap();
        let state = sampler.initialize();

        assert_eq!(state.nstep, 1);
        assert_eq!(state.visits(), 0);
        assert_eq!(state.hist.len(), 10);
        assert_eq!(state.fsum.shape(), (10, 1));
        assert!(state.fun.is_zero());
        assert_eq!(state.bias, vec![Vector3::zeros()]);
        assert_eq!(state.xi[0], 0.0);
    }

    #[test]
    fn momentum_projection_of_a_cartesian_cv_is_the_momentum() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10())).unwrap();
        let data = snapshot(4.0, 2.0);
        let sampler = method.build(Component::new(0, 0), &data).unwrap();
        let state = sampler.update(&sampler.initialize(), &data).unwrap();

        assert_eq!(state.wp.as_slice(), &[2.0]);
        assert_eq!(state.wp_prev.as_slice(), &[0.0]);
        // dWp/dt = 1.5 * 2 / 0.001 at the first step.
        let bin = method.grid().flat_index(&GridIndexer::new(method.grid()).index(&state.xi)).unwrap();
        assert!((state.fsum[(bin, 0)] - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn accumulation_adds_the_previous_force_estimate() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10()).with_visit_threshold(1)).unwrap();
        let data = snapshot(4.0, 0.0);
        let sampler = method.build(Component::new(0, 0), &data).unwrap();

        let mut state = sampler.initialize();
        state.force[0] = 7.0;
        let next = sampler.update(&state, &data).unwrap();

        let bin = method.grid().flat_index(&GridIndexer::new(method.grid()).index(&next.xi)).unwrap();
        // Momenta are zero, so the whole addend is the carried force.
        assert_eq!(next.fsum[(bin, 0)], 7.0);
        // With N = 1 the new estimate is the plain average of that single sample.
        assert_eq!(next.force[0], 7.0);
        assert_eq!(next.bias[0], Vector3::new(-7.0, 0.0, 0.0));
    }

    #[test]
    fn wp_history_shifts_by_one_each_step() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10())).unwrap();
        let sampler = method.build(Component::new(0, 0), &snapshot(4.0, 1.0)).unwrap();

        let s1 = sampler.update(&sampler.initialize(), &snapshot(4.0, 1.0)).unwrap();
        let s2 = sampler.update(&s1, &snapshot(4.1, 3.0)).unwrap();
        let s3 = sampler.update(&s2, &snapshot(4.2, 6.0)).unwrap();

        assert_eq!(s3.wp[0], 6.0);
        assert_eq!(s3.wp_prev[0], 3.0);
        assert_eq!(s3.nstep, 4);

        // dWp/dt at s3 = (1.5*6 - 2*3 + 0.5*1) / 0.001
        let expected = (1.5 * 6.0 - 2.0 * 3.0 + 0.5 * 1.0) / 0.001;
        let dt = backward_difference(&s3.wp, &s2.wp, &s1.wp, 0.001).unwrap();
        assert!((dt[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn histogram_counts_every_in_range_step() {
        let method = SpectralAbf::new(
            SpectralAbfConfig::new(grid_10())
                .with_fit_freq(7)
                .with_fit_threshold(20),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let sampler = method.build(Component::new(0, 0), &snapshot(5.0, 0.0)).unwrap();

        let mut state = sampler.initialize();
        let steps = 60;
        for _ in 0..steps {
            let data = snapshot(rng.gen_range(0.1..9.9), rng.gen_range(-1.0..1.0));
            state = sampler.update(&state, &data).unwrap();
        }
        assert_eq!(state.visits(), steps);
        assert_eq!(state.nstep, steps + 1);
        for (bin, &h) in state.hist.iter().enumerate() {
            if h == 0 {
                assert_eq!(state.fsum[(bin, 0)], 0.0);
            }
        }
    }

    #[test]
    fn alternating_bins_scenario_refits_on_odd_steps() {
        let method = SpectralAbf::new(
            SpectralAbfConfig::new(grid_10())
                .with_visit_threshold(5)
                .with_fit_freq(2)
                .with_fit_threshold(0),
        )
        .unwrap();
        let mesh = method.grid().mesh();
        let (x3, x7) = (mesh[(3, 0)], mesh[(7, 0)]);
        let sampler = method.build(Component::new(0, 0), &snapshot(x3, 0.0)).unwrap();

        let mut state = sampler.initialize();
        let mut refits = Vec::new();
        for step in 1..=6u64 {
            let x = if step % 2 == 1 { x3 } else { x7 };
            let next = sampler.update(&state, &snapshot(x, 0.0)).unwrap();
            if !Arc::ptr_eq(&state.fun, &next.fun) {
                refits.push(step);
            }
            state = next;
        }

        assert_eq!(state.hist[3], 3);
        assert_eq!(state.hist[7], 3);
        assert_eq!(state.visits(), 6);
        assert_eq!(refits, vec![1, 3, 5]);
    }

    #[test]
    fn fun_is_shared_until_the_fit_threshold() {
        let method = SpectralAbf::new(
            SpectralAbfConfig::new(grid_10())
                .with_fit_freq(3)
                .with_fit_threshold(5),
        )
        .unwrap();
        let sampler = method.build(Component::new(0, 0), &snapshot(2.0, 0.5)).unwrap();

        let mut state = sampler.initialize();
        let mut refits = Vec::new();
        for step in 1..=12u64 {
            let next = sampler.update(&state, &snapshot(2.0 + 0.1 * step as f64, 0.5)).unwrap();
            if !Arc::ptr_eq(&state.fun, &next.fun) {
                refits.push(step);
            }
            state = next;
        }
        assert_eq!(refits, vec![7, 10]);
    }

    #[test]
    fn leaving_the_grid_without_restraints_is_fatal() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10())).unwrap();
        let sampler = method.build(Component::new(0, 0), &snapshot(5.0, 0.0)).unwrap();
        let state = sampler.initialize();
        assert!(matches!(
            sampler.update(&state, &snapshot(-0.5, 0.0)),
            Err(AbfError::Index { .. })
        ));
    }

    #[test]
    fn leaving_the_grid_with_restraints_applies_the_wall_without_accumulating() {
        let config = SpectralAbfConfig::new(grid_10())
            .with_restraints(Restraints::new(vec![1.0], vec![9.0], vec![2.0], vec![3.0]));
        let method = SpectralAbf::new(config).unwrap();
        let sampler = method.build(Component::new(0, 0), &snapshot(5.0, 0.0)).unwrap();

        let s1 = sampler.update(&sampler.initialize(), &snapshot(5.0, 1.0)).unwrap();
        let s2 = sampler.update(&s1, &snapshot(11.0, 1.0)).unwrap();

        assert_eq!(s2.force[0], 3.0 * (9.0 - 11.0));
        assert_eq!(s2.bias[0], Vector3::new(6.0, 0.0, 0.0));
        assert_eq!(s2.visits(), 1);
        assert_eq!(s2.hist, s1.hist);
        assert_eq!(s2.fsum, s1.fsum);
    }

    #[test]
    fn invalid_timestep_is_numerical_error() {
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid_10())).unwrap();
        let mut data = snapshot(5.0, 0.0);
        let sampler = method.build(Component::new(0, 0), &data).unwrap();
        data.dt = 0.0;
        assert!(matches!(
            sampler.update(&sampler.initialize(), &data),
            Err(AbfError::Numerical(_))
        ));
    }
}
