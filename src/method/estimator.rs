//! Force estimation: restraint, interpolation or discrete average.

use std::sync::Arc;

use nalgebra::DVector;

use crate::error::AbfError;
use crate::method::PartialSpectralAbfState;
use crate::method::Restraints;
use crate::method::accumulator::average_force_at;
use crate::models::SpectralGradientFit;

/// Which estimate a step uses. Selected in this priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceBranch<'a> {
    /// The CV left the grid: harmonic wall force from these walls.
    Restrained(&'a Restraints),
    /// Past the fit threshold: gradient of the fitted expansion.
    Interpolated,
    /// Early sampling: damped running average of the visited bin.
    Averaged { bin: usize },
}

#[derive(Debug, Clone)]
pub struct ForceEstimator {
    model: Arc<SpectralGradientFit>,
    visit_threshold: u64,
    restraints: Option<Restraints>,
}

impl ForceEstimator {
    pub fn new(
        model: Arc<SpectralGradientFit>,
        visit_threshold: u64,
        restraints: Option<Restraints>,
    ) -> Self {
        Self {
            model,
            visit_threshold,
            restraints,
        }
    }

    pub fn has_restraints(&self) -> bool {
        self.restraints.is_some()
    }

    /// Pick the branch for this step.
    ///
    /// An out-of-grid bin without restraints has no meaningful estimate and is an error.
    pub fn branch(&self, state: &PartialSpectralAbfState<'_>) -> Result<ForceBranch<'_>, AbfError> {
        let grid = self.model.grid();
        let Some(bin) = grid.flat_index(state.bin) else {
            return match &self.restraints {
                Some(restraints) => Ok(ForceBranch::Restrained(restraints)),
                None => Err(AbfError::Index {
                    index: state.bin.coords.clone(),
                    shape: grid.shape().to_vec(),
                }),
            };
        };

        if state.in_fitting_regime {
            Ok(ForceBranch::Interpolated)
        } else {
            Ok(ForceBranch::Averaged { bin })
        }
    }

    pub fn estimate(&self, state: &PartialSpectralAbfState<'_>) -> Result<DVector<f64>, AbfError> {
        let force = match self.branch(state)? {
            ForceBranch::Restrained(restraints) => restraints.force(state.xi),
            ForceBranch::Interpolated => self.model.gradient(state.fun, state.xi),
            ForceBranch::Averaged { bin } => {
                average_force_at(state.hist, state.fsum, bin, self.visit_threshold)
            }
        };
        Ok(force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{BinIndex, Grid, GridIndexer};
    use crate::models::Fun;
    use nalgebra::DMatrix;

    fn model() -> Arc<SpectralGradientFit> {
        let grid = Grid::new(vec![0.0], vec![10.0], vec![10], false)
            .unwrap()
            .into_chebyshev();
        Arc::new(SpectralGradientFit::new(&grid).unwrap())
    }

    fn restraints() -> Restraints {
        Restraints::new(vec![2.0], vec![8.0], vec![3.0], vec![4.0])
    }

    /// A fun whose gradient is 1 everywhere: A(x) = x, i.e. 5·T_1(u) on [0, 10].
    fn linear_fun(model: &SpectralGradientFit) -> Fun {
        let mut c = vec![0.0; model.n_basis()];
        c[0] = 5.0;
        Fun::new(false, c)
    }

    #[test]
    fn restraint_force_ignores_statistics_outside_the_grid() {
        let model = model();
        let estimator = ForceEstimator::new(model.clone(), 5, Some(restraints()));
        let indexer = GridIndexer::new(model.grid());
        let fun = linear_fun(&model);
        let hist = vec![100; 10];
        let fsum = DMatrix::from_element(10, 1, 1234.0);

        for (x, expected) in [(-1.0, 9.0), (12.0, -16.0)] {
            let xi = DVector::from_element(1, x);
            let bin = indexer.index(&xi);
            for in_fitting_regime in [false, true] {
                let state = PartialSpectralAbfState {
                    xi: &xi,
                    hist: &hist,
                    fsum: &fsum,
                    bin: &bin,
                    fun: &fun,
                    in_fitting_regime,
                };
                assert_eq!(estimator.branch(&state).unwrap(), ForceBranch::Restrained(&restraints()));
                assert_eq!(estimator.estimate(&state).unwrap()[0], expected);
            }
        }
    }

    #[test]
    fn out_of_grid_without_restraints_is_index_error() {
        let model = model();
        let estimator = ForceEstimator::new(model.clone(), 5, None);
        let xi = DVector::from_element(1, -3.0);
        let bin = BinIndex::new(vec![10]);
        let fun = model.zero();
        let state = PartialSpectralAbfState {
            xi: &xi,
            hist: &[0; 10],
            fsum: &DMatrix::zeros(10, 1),
            bin: &bin,
            fun: &fun,
            in_fitting_regime: false,
        };
        assert!(matches!(
            estimator.estimate(&state),
            Err(AbfError::Index { .. })
        ));
    }

    #[test]
    fn average_branch_is_used_before_fitting_regardless_of_fit() {
        let model = model();
        let estimator = ForceEstimator::new(model.clone(), 5, Some(restraints()));
        let fun = linear_fun(&model);
        let xi = DVector::from_element(1, 5.0);
        let bin = GridIndexer::new(model.grid()).index(&xi);
        let flat = model.grid().flat_index(&bin).unwrap();

        let mut hist = vec![0; 10];
        let mut fsum = DMatrix::zeros(10, 1);
        hist[flat] = 2;
        fsum[(flat, 0)] = 4.0;

        let mut state = PartialSpectralAbfState {
            xi: &xi,
            hist: &hist,
            fsum: &fsum,
            bin: &bin,
            fun: &fun,
            in_fitting_regime: false,
        };
        assert_eq!(estimator.branch(&state).unwrap(), ForceBranch::Averaged { bin: flat });
        // Two visits, floored at N = 5.
        assert!((estimator.estimate(&state).unwrap()[0] - 0.8).abs() < 1e-15);

        state.in_fitting_regime = true;
        assert_eq!(estimator.branch(&state).unwrap(), ForceBranch::Interpolated);
        assert!((estimator.estimate(&state).unwrap()[0] - 1.0).abs() < 1e-12);
    }
}
