//! Command-line parsing for the Spectral ABF demo driver.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the sampling/math code. Every run flag can also be set through
//! a `SABF_*` environment variable (or a `.env` file).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::PotentialKind;
use crate::method::{DEFAULT_FIT_FREQ, DEFAULT_FIT_THRESHOLD, DEFAULT_VISIT_THRESHOLD};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "sabf",
    version,
    about = "Spectral Adaptive Biasing Force on a Langevin particle"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate biased replicas, print the summary and optionally plot/export the profile.
    Run(RunArgs),
    /// Plot a previously exported profile JSON.
    Plot(PlotArgs),
}

/// Options for a sampling run.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// External potential along x.
    #[arg(long, value_enum, default_value_t = PotentialKind::DoubleWell, env = "SABF_POTENTIAL")]
    pub potential: PotentialKind,

    /// Barrier height (kT units at temperature 1).
    #[arg(long, default_value_t = 5.0, env = "SABF_BARRIER")]
    pub barrier: f64,

    /// Well position (double well) or period (cosine).
    #[arg(long, default_value_t = 1.0, env = "SABF_LENGTH")]
    pub length: f64,

    /// Harmonic stiffness confining y and z.
    #[arg(long, default_value_t = 10.0, env = "SABF_CONFINEMENT")]
    pub confinement: f64,

    #[arg(long, default_value_t = 1.0, env = "SABF_MASS")]
    pub mass: f64,

    #[arg(long, default_value_t = 1.0, env = "SABF_TEMPERATURE")]
    pub temperature: f64,

    /// Langevin friction.
    #[arg(long, default_value_t = 1.0, env = "SABF_GAMMA")]
    pub gamma: f64,

    /// Integration timestep.
    #[arg(long, default_value_t = 0.005, env = "SABF_DT")]
    pub dt: f64,

    /// Steps per replica.
    #[arg(short = 's', long, default_value_t = 20_000, env = "SABF_STEPS")]
    pub steps: usize,

    /// Starting x coordinate.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true, env = "SABF_X0")]
    pub x0: f64,

    /// Number of independent replicas (run in parallel).
    #[arg(short = 'r', long, default_value_t = 1, env = "SABF_REPLICAS")]
    pub replicas: usize,

    /// Random seed of replica 0; replica r uses seed + r.
    #[arg(long, default_value_t = 42, env = "SABF_SEED")]
    pub seed: u64,

    /// JSON method configuration (grid, N, fit_freq, fit_threshold, restraints).
    ///
    /// When given, the grid and method flags below are ignored.
    #[arg(short = 'c', long, value_name = "JSON", env = "SABF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lower bound of the CV grid.
    #[arg(long, default_value_t = -2.0, allow_negative_numbers = true, env = "SABF_LOWER")]
    pub lower: f64,

    /// Upper bound of the CV grid.
    #[arg(long, default_value_t = 2.0, allow_negative_numbers = true, env = "SABF_UPPER")]
    pub upper: f64,

    /// Number of grid bins.
    #[arg(long, default_value_t = 32, env = "SABF_BINS")]
    pub bins: usize,

    /// Treat the CV as periodic over [lower, upper).
    #[arg(long, env = "SABF_PERIODIC")]
    pub periodic: bool,

    /// Visits a bin needs before its raw average is used undamped (N).
    #[arg(short = 'N', long, default_value_t = DEFAULT_VISIT_THRESHOLD, env = "SABF_VISIT_THRESHOLD")]
    pub visit_threshold: u64,

    /// Refit the free-energy expansion every this many steps.
    #[arg(long, default_value_t = DEFAULT_FIT_FREQ, env = "SABF_FIT_FREQ")]
    pub fit_freq: u64,

    /// Steps of plain ABF before the expansion is used.
    #[arg(long, default_value_t = DEFAULT_FIT_THRESHOLD, env = "SABF_FIT_THRESHOLD")]
    pub fit_threshold: u64,

    /// Stiffness of the harmonic walls placed at the grid bounds.
    ///
    /// The wall bias points away from the grid; the potential must confine the particle.
    #[arg(long, default_value_t = 10.0, env = "SABF_RESTRAINT_K")]
    pub restraint_k: f64,

    /// Run without walls (leaving the grid is then an error).
    #[arg(long, env = "SABF_NO_RESTRAINTS")]
    pub no_restraints: bool,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-bin results to CSV.
    #[arg(long, env = "SABF_EXPORT")]
    pub export: Option<PathBuf>,

    /// Export the profile (config + mesh + surfaces + coefficients) to JSON.
    #[arg(long = "export-profile", env = "SABF_EXPORT_PROFILE")]
    pub export_profile: Option<PathBuf>,
}

/// Options for plotting a saved profile.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Profile JSON file produced by `sabf run --export-profile`.
    #[arg(long, value_name = "JSON")]
    pub profile: PathBuf,

    /// Replica to plot.
    #[arg(long, default_value_t = 0)]
    pub replica: usize,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_parse() {
        let cli = Cli::parse_from(["sabf", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.bins, 32);
        assert_eq!(args.lower, -2.0);
        assert_eq!(args.visit_threshold, 500);
        assert_eq!(args.potential, PotentialKind::DoubleWell);
        assert!(args.plot && !args.no_plot);
    }

    #[test]
    fn negative_bounds_and_method_flags_parse() {
        let cli = Cli::parse_from([
            "sabf", "run", "--lower", "-3.5", "--upper", "3", "-N", "20", "--fit-freq", "10", "--potential", "cosine",
            "--periodic",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.lower, -3.5);
        assert_eq!(args.upper, 3.0);
        assert_eq!(args.visit_threshold, 20);
        assert_eq!(args.fit_freq, 10);
        assert_eq!(args.potential, PotentialKind::Cosine);
        assert!(args.periodic);
    }
}
