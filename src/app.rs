//! The `sabf` driver behind `src/main.rs`.
//!
//! Loads `.env`, initializes logging, parses the command line and dispatches to
//! either a sampling run (simulate, analyze, report, export) or a re-plot of a
//! saved profile.

use clap::Parser;

use crate::cli::{Command, PlotArgs, RunArgs};
use crate::domain::{RunConfig, SimulationConfig};
use crate::error::AppError;
use crate::grid::Grid;
use crate::method::{Restraints, SpectralAbfConfig};

pub mod pipeline;

/// Entry point for the `sabf` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // `sabf` and `sabf --steps 1000` mean `sabf run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_replicas(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));

    if config.plot {
        let analysis = &run.analysis;
        match crate::plot::render_profile_plot(
            &analysis.mesh,
            &analysis.free_energy.as_slice()[0],
            &analysis.fes_fn.as_slice()[0],
            config.plot_width,
            config.plot_height,
        ) {
            Some(plot) => println!("{plot}"),
            None => log::warn!("skipping plot: only one-dimensional profiles can be drawn"),
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_csv {
        crate::io::export::write_profile_csv(path, &run.analysis)?;
    }
    if let Some(path) = &config.export_profile {
        let profile = crate::io::profile::build_profile(&run, &config);
        crate::io::profile::write_profile_json(path, &profile)?;
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let profile = crate::io::profile::read_profile_json(&args.profile)?;
    let plot = crate::plot::render_profile_file(&profile, args.replica, args.width, args.height)?;

    println!("{plot}");
    Ok(())
}

/// Build the run configuration: simulation from flags, method from flags or a JSON file.
pub fn run_config_from_args(args: &RunArgs) -> Result<RunConfig, AppError> {
    let method = match &args.config {
        Some(path) => crate::io::config::read_method_config(path)?,
        None => method_config_from_args(args)?,
    };

    Ok(RunConfig {
        method,
        simulation: SimulationConfig {
            potential: args.potential,
            barrier: args.barrier,
            length: args.length,
            confinement: args.confinement,
            mass: args.mass,
            temperature: args.temperature,
            gamma: args.gamma,
            dt: args.dt,
            steps: args.steps,
            x0: args.x0,
        },
        replicas: args.replicas,
        seed: args.seed,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_profile: args.export_profile.clone(),
        export_csv: args.export.clone(),
    })
}

fn method_config_from_args(args: &RunArgs) -> Result<SpectralAbfConfig, AppError> {
    let grid = Grid::new(vec![args.lower], vec![args.upper], vec![args.bins], args.periodic)?;
    let mut method = SpectralAbfConfig::new(grid.clone())
        .with_visit_threshold(args.visit_threshold)
        .with_fit_freq(args.fit_freq)
        .with_fit_threshold(args.fit_threshold);
    if !args.no_restraints && !args.periodic {
        method = method.with_restraints(Restraints::at_grid_bounds(&grid, args.restraint_k));
    }
    method.validate()?;
    Ok(method)
}

/// Insert the `run` subcommand when argv starts with a run flag or is empty.
///
/// Top-level `--help`/`--version` and explicit subcommands pass through.
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let insert_run = match argv.get(1).map(String::as_str) {
        None => true,
        Some("-h" | "--help" | "-V" | "--version" | "help" | "run" | "plot") => false,
        Some(first) => first.starts_with('-'),
    };
    if insert_run {
        argv.insert(1.min(argv.len()), "run".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut all = vec!["sabf", "run"];
        all.extend_from_slice(extra);
        match crate::cli::Cli::parse_from(all).command {
            Command::Run(args) => args,
            Command::Plot(_) => panic!("expected run"),
        }
    }

    #[test]
    fn bare_invocation_and_flags_default_to_run() {
        assert_eq!(rewrite_args(argv(&["sabf"])), argv(&["sabf", "run"]));
        assert_eq!(
            rewrite_args(argv(&["sabf", "--steps", "10"])),
            argv(&["sabf", "run", "--steps", "10"])
        );
        assert_eq!(rewrite_args(argv(&["sabf", "--help"])), argv(&["sabf", "--help"]));
        assert_eq!(
            rewrite_args(argv(&["sabf", "plot", "--profile", "p.json"])),
            argv(&["sabf", "plot", "--profile", "p.json"])
        );
    }

    #[test]
    fn flags_build_a_restrained_method_by_default() {
        let config = run_config_from_args(&run_args(&["--bins", "16", "--no-plot"])).unwrap();
        assert_eq!(config.method.grid.shape(), &[16]);
        assert!(config.method.restraints.is_some());
        assert!(!config.plot);
        assert_eq!(config.simulation.x0, -1.0);
    }

    #[test]
    fn periodic_or_unrestrained_runs_have_no_walls() {
        let config = run_config_from_args(&run_args(&["--periodic"])).unwrap();
        assert!(config.method.restraints.is_none());
        let config = run_config_from_args(&run_args(&["--no-restraints"])).unwrap();
        assert!(config.method.restraints.is_none());
    }

    #[test]
    fn invalid_grid_flags_are_configuration_errors() {
        let err = run_config_from_args(&run_args(&["--lower", "1", "--upper", "1"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = run_config_from_args(&run_args(&["--fit-freq", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
