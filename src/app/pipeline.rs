//! Shared "run pipeline" logic used by the CLI front-end.
//!
//! The workflow is:
//! method construction -> per-replica Langevin + Spectral ABF loop -> analysis
//!
//! Replicas are independent, so they run in parallel; each owns its integrator,
//! its random stream and its sampler state, and only the immutable method is
//! shared.

use rayon::prelude::*;

use crate::analysis::{Analysis, analyze};
use crate::cv::Component;
use crate::data::{Langevin, potential_from_config};
use crate::domain::{RunConfig, SimulationConfig};
use crate::error::{AbfError, AppError};
use crate::method::{SpectralAbf, SpectralAbfState};

/// Final state of one replica.
#[derive(Debug, Clone)]
pub struct ReplicaOutput {
    pub seed: u64,
    pub state: SpectralAbfState,
    /// Steps on which the CV was outside the grid (restrained, not accumulated).
    pub restrained_steps: u64,
}

/// All computed outputs of a single `sabf run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub method: SpectralAbf,
    pub replicas: Vec<ReplicaOutput>,
    pub analysis: Analysis,
}

/// Execute the full run: simulate every replica, then analyze the final states.
pub fn run_replicas(config: &RunConfig) -> Result<RunOutput, AppError> {
    if config.replicas == 0 {
        return Err(AppError::new(2, "Replica count must be > 0."));
    }
    let method = SpectralAbf::new(config.method.clone())?;
    log::info!(
        "running {} replica(s) x {} steps on grid {:?} ({:?})",
        config.replicas,
        config.simulation.steps,
        method.grid().shape(),
        method.grid().kind()
    );

    let replicas = (0..config.replicas)
        .into_par_iter()
        .map(|r| {
            let seed = config.seed.wrapping_add(r as u64);
            run_replica(&method, &config.simulation, seed)
                .map_err(|err| AppError::new(err.exit_code(), format!("replica {r} (seed {seed}): {err}")))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let states: Vec<SpectralAbfState> = replicas.iter().map(|r| r.state.clone()).collect();
    let analysis = analyze(&method, &states)?;

    Ok(RunOutput {
        method,
        replicas,
        analysis,
    })
}

/// Simulate one replica with a `Component(0, x)` CV.
pub fn run_replica(method: &SpectralAbf, simulation: &SimulationConfig, seed: u64) -> Result<ReplicaOutput, AppError> {
    let mut sim = Langevin::new(simulation, potential_from_config(simulation), seed)?;
    let sampler = method.build(Component::new(0, 0), &sim.snapshot())?;
    let grid = method.grid();

    let mut state = sampler.initialize();
    let mut restrained_steps = 0u64;
    for step in 0..simulation.steps {
        state = sampler
            .update(&state, &sim.snapshot())
            .map_err(|err| step_error(err, step))?;
        if grid.flat_index(&sampler.indexer().index(&state.xi)).is_none() {
            restrained_steps += 1;
        }
        sim.step(&state.bias);
    }

    if restrained_steps > 0 {
        log::warn!("replica with seed {seed}: CV left the grid on {restrained_steps} step(s)");
    }
    log::info!(
        "replica with seed {seed} done: {} visits over {} bins, final x={:.3}",
        state.visits(),
        state.visited_bins(),
        sim.positions()[0].x
    );

    Ok(ReplicaOutput {
        seed,
        state,
        restrained_steps,
    })
}

fn step_error(err: AbfError, step: usize) -> AppError {
    let app = AppError::from(err);
    AppError::new(app.exit_code(), format!("step {step}: {app}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PotentialKind;
    use crate::grid::Grid;
    use crate::method::{Restraints, SpectralAbfConfig};

    fn run_config(replicas: usize) -> RunConfig {
        let grid = Grid::new(vec![-2.0], vec![2.0], vec![16], false).unwrap();
        let restraints = Restraints::at_grid_bounds(&grid, 10.0);
        RunConfig {
            method: SpectralAbfConfig::new(grid)
                .with_fit_freq(50)
                .with_fit_threshold(200)
                .with_visit_threshold(20)
                .with_restraints(restraints),
            simulation: SimulationConfig {
                potential: PotentialKind::DoubleWell,
                steps: 1_000,
                ..SimulationConfig::default()
            },
            replicas,
            seed: 7,
            plot: false,
            plot_width: 60,
            plot_height: 15,
            export_profile: None,
            export_csv: None,
        }
    }

    #[test]
    fn replicas_are_reproducible_and_ordered() {
        let config = run_config(3);
        let a = run_replicas(&config).unwrap();
        let b = run_replicas(&config).unwrap();

        assert_eq!(a.replicas.len(), 3);
        assert_eq!(a.analysis.replicas(), 3);
        for (r, (x, y)) in a.replicas.iter().zip(&b.replicas).enumerate() {
            assert_eq!(x.seed, 7 + r as u64);
            assert_eq!(x.state.hist, y.state.hist);
            assert_eq!(x.state.visits() + x.restrained_steps, 1_000);
        }
    }

    #[test]
    fn zero_replicas_is_a_configuration_error() {
        let err = run_replicas(&run_config(0)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn multi_dimensional_grid_is_rejected_for_the_scalar_cv() {
        let mut config = run_config(1);
        config.method = SpectralAbfConfig::new(
            Grid::new(vec![-2.0, -2.0], vec![2.0, 2.0], vec![4, 4], false).unwrap(),
        );
        let err = run_replicas(&config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn leaving_an_unrestrained_grid_reports_an_index_error() {
        let mut config = run_config(1);
        config.method = SpectralAbfConfig::new(Grid::new(vec![-2.0], vec![-1.9], vec![4], false).unwrap());
        config.simulation.x0 = 0.0;
        let err = run_replicas(&config).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("step 0"));
    }
}
