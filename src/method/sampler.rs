//! The per-step update loop.
//!
//! Each call to [`Sampler::update`] performs, in order:
//!
//! 1. decide whether this step is in the fitting regime / a refit step
//! 2. refit (or carry) the free-energy expansion from the previous grids
//! 3. evaluate the CV and its Jacobian
//! 4. project the momenta onto CV space: `Wp = (J Jᵗ)⁻¹ J p`
//! 5. differentiate `Wp` with a second-order backward difference
//! 6. locate the bin of `xi`
//! 7. accumulate `dWp/dt` plus the *previous* force estimate into that bin
//!    (adding the old estimate back removes the bias it introduced)
//! 8. estimate the new force
//! 9. map it back to particles: `bias = −Jᵗ force`
//!
//! All fallible work happens before the new grids are written, so a failed
//! step never produces a half-updated state.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Vector3};

use crate::cv::{CollectiveVariable, CvValue, flatten, unflatten};
use crate::domain::Snapshot;
use crate::error::AbfError;
use crate::fit::FreeEnergyFitter;
use crate::grid::GridIndexer;
use crate::math::solve_spd;
use crate::method::accumulator::accumulate;
use crate::method::{ForceEstimator, PartialSpectralAbfState, SpectralAbfConfig, SpectralAbfState};

/// A Spectral ABF update loop bound to one CV and one particle count.
///
/// Built by [`SpectralAbf::build`](crate::method::SpectralAbf::build). The sampler
/// is immutable and can be shared by reference across threads; each replica
/// owns its own [`SpectralAbfState`].
#[derive(Debug)]
pub struct Sampler<C> {
    cv: C,
    natoms: usize,
    config: SpectralAbfConfig,
    indexer: GridIndexer,
    fitter: FreeEnergyFitter,
    estimator: ForceEstimator,
}

impl<C: CollectiveVariable> Sampler<C> {
    pub(crate) fn new(
        cv: C,
        natoms: usize,
        config: SpectralAbfConfig,
        indexer: GridIndexer,
        fitter: FreeEnergyFitter,
        estimator: ForceEstimator,
    ) -> Self {
        Self {
            cv,
            natoms,
            config,
            indexer,
            fitter,
            estimator,
        }
    }

    pub fn cv(&self) -> &C {
        &self.cv
    }

    pub fn natoms(&self) -> usize {
        self.natoms
    }

    pub fn indexer(&self) -> &GridIndexer {
        &self.indexer
    }

    /// Fresh state: everything zero, `nstep = 1`.
    pub fn initialize(&self) -> SpectralAbfState {
        let grid = self.indexer.grid();
        let dims = grid.dims();
        let hist = vec![0; grid.n_bins()];
        let fsum = DMatrix::zeros(grid.n_bins(), dims);
        let fun = Arc::new(self.fitter.fit(&hist, &fsum));

        SpectralAbfState {
            xi: DVector::zeros(dims),
            bias: vec![Vector3::zeros(); self.natoms],
            hist,
            fsum,
            force: DVector::zeros(dims),
            wp: DVector::zeros(dims),
            wp_prev: DVector::zeros(dims),
            fun,
            nstep: 1,
        }
    }

    /// Advance `state` by one simulation step.
    pub fn update(&self, state: &SpectralAbfState, data: &Snapshot) -> Result<SpectralAbfState, AbfError> {
        let nstep = state.nstep;
        let in_fitting_regime = self.config.in_fitting_regime(nstep);
        let in_fitting_step = self.config.is_fitting_step(nstep);

        let fun = self
            .fitter
            .fit_forces(&state.hist, &state.fsum, &state.fun, in_fitting_step);

        self.check_snapshot(data)?;
        let CvValue { xi, jacobian } = self.cv.evaluate(&data.positions)?;
        self.check_cv(&xi, &jacobian)?;

        let p = flatten(&data.momenta);
        let wp = momentum_projection(&jacobian, &p)?;
        let dwp_dt = backward_difference(&wp, &state.wp, &state.wp_prev, data.dt)?;

        let bin = self.indexer.index(&xi);
        let slot = self.indexer.grid().flat_index(&bin);
        if slot.is_none() && !self.estimator.has_restraints() {
            return Err(AbfError::Index {
                index: bin.coords,
                shape: self.indexer.grid().shape().to_vec(),
            });
        }

        let mut hist = state.hist.clone();
        let mut fsum = state.fsum.clone();
        if let Some(i) = slot {
            accumulate(&mut hist, &mut fsum, i, &(dwp_dt + &state.force));
        }

        let force = self.estimator.estimate(&PartialSpectralAbfState {
            xi: &xi,
            hist: &hist,
            fsum: &fsum,
            bin: &bin,
            fun: &fun,
            in_fitting_regime,
        })?;
        let bias = unflatten(&-(jacobian.transpose() * &force));

        Ok(SpectralAbfState {
            xi,
            bias,
            hist,
            fsum,
            force,
            wp_prev: state.wp.clone(),
            wp,
            fun,
            nstep: nstep + 1,
        })
    }

    fn check_snapshot(&self, data: &Snapshot) -> Result<(), AbfError> {
        if data.positions.len() != self.natoms || data.momenta.len() != self.natoms {
            return Err(AbfError::configuration(format!(
                "snapshot has {} positions and {} momenta but the sampler was built for {} atoms",
                data.positions.len(),
                data.momenta.len(),
                self.natoms
            )));
        }
        Ok(())
    }

    fn check_cv(&self, xi: &DVector<f64>, jacobian: &DMatrix<f64>) -> Result<(), AbfError> {
        let dims = self.indexer.grid().dims();
        if xi.len() != dims || jacobian.shape() != (dims, 3 * self.natoms) {
            return Err(AbfError::configuration(format!(
                "CV returned {} values and a {:?} Jacobian; expected {dims} values and a ({dims}, {}) Jacobian",
                xi.len(),
                jacobian.shape(),
                3 * self.natoms
            )));
        }
        Ok(())
    }
}

/// `Wp = solve(J Jᵗ, J p)`, the momentum conjugate to the CV.
pub fn momentum_projection(jacobian: &DMatrix<f64>, p: &DVector<f64>) -> Result<DVector<f64>, AbfError> {
    if jacobian.ncols() != p.len() {
        return Err(AbfError::configuration(format!(
            "Jacobian has {} columns but the momentum vector has {} entries",
            jacobian.ncols(),
            p.len()
        )));
    }
    let metric = jacobian * jacobian.transpose();
    solve_spd(metric, &(jacobian * p)).ok_or_else(|| {
        AbfError::numerical("J·Jᵗ is singular or ill-conditioned (reciprocal condition below 1e-12)")
    })
}

/// `(1.5·Wp − 2·Wp_prev + 0.5·Wp_prevprev) / dt`.
pub fn backward_difference(
    wp: &DVector<f64>,
    wp_prev: &DVector<f64>,
    wp_prevprev: &DVector<f64>,
    dt: f64,
) -> Result<DVector<f64>, AbfError> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(AbfError::numerical(format!("timestep must be finite and positive (got {dt})")));
    }
    Ok((wp * 1.5 - wp_prev * 2.0 + wp_prevprev * 0.5) / dt)
}
