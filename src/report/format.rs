//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the sampling/analysis code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::RunOutput;
use crate::domain::RunConfig;
use crate::grid::Grid;
use crate::method::SpectralAbfConfig;
use crate::report::{ReplicaSummary, summarize_replicas};

/// Format the full run summary (simulation + method + per-replica table).
pub fn format_run_summary(run: &RunOutput, config: &RunConfig) -> String {
    let mut out = String::new();
    let sim = &config.simulation;
    let method = run.method.config();

    out.push_str("=== sabf - Spectral ABF ===\n");
    out.push_str(&format!(
        "Potential: {:?} | barrier={:.3} length={:.3} confinement={:.3}\n",
        sim.potential, sim.barrier, sim.length, sim.confinement
    ));
    out.push_str(&format!(
        "Dynamics: T={:.3} gamma={:.3} mass={:.3} dt={:.5} steps={}\n",
        sim.temperature, sim.gamma, sim.mass, sim.dt, sim.steps
    ));
    out.push_str(&format!("Grid: {}\n", fmt_grid(&method.grid)));
    out.push_str(&format!("Method: {}\n", fmt_method(method)));
    out.push_str(&format!(
        "Refits per replica: {}\n",
        method.refit_count(sim.steps as u64)
    ));

    out.push('\n');
    out.push_str(&format_replica_table(&summarize_replicas(run)));
    out
}

/// One line per replica.
pub fn format_replica_table(rows: &[ReplicaSummary]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>7} {:>12} {:>10} {:>11} {:>12} {:>10}\n",
            "replica", "seed", "visits", "bins", "restrained", "max_A"
        )
        .trim_end(),
    );
    out.push('\n');

    out.push_str(
        format!(
            "{:->7} {:->12} {:->10} {:->11} {:->12} {:->10}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (r, row) in rows.iter().enumerate() {
        out.push_str(
            format!(
                "{:>7} {:>12} {:>10} {:>11} {:>12} {:>10.3}\n",
                r,
                row.seed,
                row.visits,
                format!("{}/{}", row.visited_bins, row.n_bins),
                row.restrained_steps,
                row.max_free_energy,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_grid(grid: &Grid) -> String {
    format!(
        "lower={} upper={} shape={:?} kind={:?}{}",
        fmt_vec(grid.lower()),
        fmt_vec(grid.upper()),
        grid.shape(),
        grid.kind(),
        if grid.is_periodic() { " periodic" } else { "" }
    )
}

fn fmt_method(method: &SpectralAbfConfig) -> String {
    let restraints = match &method.restraints {
        Some(r) => format!(
            "walls at {}/{} k={}/{}",
            fmt_vec(&r.lower),
            fmt_vec(&r.upper),
            fmt_vec(&r.k_lower),
            fmt_vec(&r.k_upper)
        ),
        None => "none".to_string(),
    };
    format!(
        "N={} fit_freq={} fit_threshold={} | restraints: {restraints}",
        method.visit_threshold, method.fit_freq, method.fit_threshold
    )
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
    format!("[{}]", parts.join(", "))
}
