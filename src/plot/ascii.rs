//! Terminal plots of free-energy profiles.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - free energy at the mesh nodes: `o`
//! - interpolated free-energy curve: `-` line
//!
//! Only one-dimensional profiles are drawn.

use nalgebra::{DMatrix, DVector};

use crate::analysis::FreeEnergyFn;
use crate::domain::ProfileFile;
use crate::error::AppError;
use crate::models::SpectralGradientFit;
use crate::report::relative_free_energy;

/// Render the relative free energy of one replica from an in-memory analysis.
pub fn render_profile_plot(
    mesh: &DMatrix<f64>,
    free_energy: &[f64],
    fes_fn: &FreeEnergyFn,
    width: usize,
    height: usize,
) -> Option<String> {
    if mesh.ncols() != 1 {
        return None;
    }
    let xs: Vec<f64> = mesh.column(0).iter().copied().collect();
    let (x_min, x_max) = value_range(xs.iter().copied()).unwrap_or((0.0, 1.0));
    let samples = sample_curve(|x| fes_fn.call(&DVector::from_element(1, x)), x_min, x_max, width.max(2));
    Some(render_relative(&xs, free_energy, &samples, x_min, x_max, width, height))
}

/// Render one replica of a saved profile, rebuilding the basis from its grid.
pub fn render_profile_file(profile: &ProfileFile, replica: usize, width: usize, height: usize) -> Result<String, AppError> {
    let Some(data) = profile.replicas.get(replica) else {
        return Err(AppError::new(
            2,
            format!("Profile has {} replica(s); replica {replica} does not exist.", profile.replicas.len()),
        ));
    };
    if profile.mesh.ncols() != 1 {
        return Err(AppError::new(2, "Only one-dimensional profiles can be plotted."));
    }
    let model = SpectralGradientFit::new(&profile.method.grid)?;
    model.check_fun(&data.fun)?;
    let xs: Vec<f64> = profile.mesh.column(0).iter().copied().collect();
    let (x_min, x_max) = value_range(xs.iter().copied()).unwrap_or((0.0, 1.0));
    let samples = sample_curve(
        |x| model.evaluate(&data.fun, &DVector::from_element(1, x)),
        x_min,
        x_max,
        width.max(2),
    );
    Ok(render_relative(&xs, &data.free_energy, &samples, x_min, x_max, width, height))
}

/// Shift node values and the curve by the same maximum so both read as `max(F) − F`.
fn render_relative(
    xs: &[f64],
    free_energy: &[f64],
    samples: &[(f64, f64)],
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
) -> String {
    let mut all: Vec<f64> = free_energy.to_vec();
    all.extend(samples.iter().map(|&(_, f)| f));
    let shifted = relative_free_energy(&all);
    let (nodes, curve) = shifted.split_at(free_energy.len());

    let points: Vec<(f64, f64)> = xs.iter().copied().zip(nodes.iter().copied()).collect();
    let curve: Vec<(f64, f64)> = samples
        .iter()
        .zip(curve)
        .map(|(&(x, _), &a)| (x, a))
        .collect();
    render_plot(&points, Some(&curve), x_min, x_max, width, height)
}

fn render_plot(
    points: &[(f64, f64)],
    curve_points: Option<&[(f64, f64)]>,
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
) -> String {
    let ys = points.iter().chain(curve_points.unwrap_or(&[])).map(|&(_, y)| y);
    let (y_min, y_max) = value_range(ys).unwrap_or((0.0, 1.0));
    let span = (y_max - y_min).abs();
    let pad = (span * 0.05).max(1e-12);

    let mut canvas = Canvas::new(width.max(10), height.max(5), (x_min, x_max), (y_min - pad, y_max + pad));

    // Curve first so the nodes overlay it.
    if let Some(curve) = curve_points {
        canvas.polyline(curve, '-');
    }
    for &(x, a) in points {
        if a.is_finite() {
            canvas.mark(x, a, 'o');
        }
    }

    canvas.render()
}

/// Smallest and largest finite-span range of `values`, if there is one.
fn value_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

fn sample_curve(f: impl Fn(f64) -> f64, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let step = (x_max - x_min) / (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = x_min + step * i as f64;
            (x, f(x))
        })
        .collect()
}

/// Fixed-size character grid with row 0 at the top.
struct Canvas {
    cells: Vec<Vec<char>>,
    x: (f64, f64),
    y: (f64, f64),
}

impl Canvas {
    fn new(width: usize, height: usize, x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            x,
            y,
        }
    }

    fn width(&self) -> usize {
        self.cells[0].len()
    }

    fn height(&self) -> usize {
        self.cells.len()
    }

    fn col(&self, x: f64) -> usize {
        cell(x, self.x, self.width())
    }

    fn row(&self, y: f64) -> usize {
        self.height() - 1 - cell(y, self.y, self.height())
    }

    /// Overwrite the cell under `(x, y)`.
    fn mark(&mut self, x: f64, y: f64, ch: char) {
        let (c, r) = (self.col(x), self.row(y));
        self.cells[r][c] = ch;
    }

    /// Connect consecutive finite points; a non-finite value breaks the line.
    fn polyline(&mut self, points: &[(f64, f64)], ch: char) {
        if points.len() < 2 {
            return;
        }
        let mut prev: Option<(usize, usize)> = None;
        for &(x, y) in points {
            if !y.is_finite() {
                prev = None;
                continue;
            }
            let here = (self.col(x), self.row(y));
            match prev {
                Some(from) => self.segment(from, here, ch),
                None => self.cells[here.1][here.0] = ch,
            }
            prev = Some(here);
        }
    }

    /// Fill blank cells along a straight segment between two cells.
    fn segment(&mut self, from: (usize, usize), to: (usize, usize), ch: char) {
        let dc = to.0 as f64 - from.0 as f64;
        let dr = to.1 as f64 - from.1 as f64;
        let steps = dc.abs().max(dr.abs()) as usize;
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            let c = (from.0 as f64 + t * dc).round() as usize;
            let r = (from.1 as f64 + t * dr).round() as usize;
            if let Some(slot) = self.cells.get_mut(r).and_then(|row| row.get_mut(c)) {
                if *slot == ' ' {
                    *slot = ch;
                }
            }
        }
    }

    fn render(&self) -> String {
        let mut out = format!(
            "Plot: xi=[{:.3}, {:.3}] | A=[{:.2}, {:.2}]\n",
            self.x.0, self.x.1, self.y.0, self.y.1
        );
        for row in &self.cells {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }
}

/// Position of `v` within `range`, as one of `n` cells.
fn cell(v: f64, range: (f64, f64), n: usize) -> usize {
    let u = ((v - range.0) / (range.1 - range.0)).clamp(0.0, 1.0);
    (u * (n.max(2) - 1) as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::cv::{Component, Stacked};
    use crate::domain::Snapshot;
    use crate::grid::Grid;
    use crate::method::{SpectralAbf, SpectralAbfConfig};
    use nalgebra::Vector3;

    #[test]
    fn plot_golden_snapshot_small() {
        let points = vec![(1.0, 0.0), (10.0, 10.0)];
        let curve = vec![(1.0, 0.0), (10.0, 0.0)];

        let txt = render_plot(&points, Some(&curve), 1.0, 10.0, 10, 5);
        let expected = concat!(
            "Plot: xi=[1.000, 10.000] | A=[-0.50, 10.50]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn relative_plot_puts_the_maximum_of_the_fit_at_zero() {
        // Fitted values rise towards the right, so the relative free energy falls.
        let xs = [0.0, 1.0];
        let txt = render_relative(&xs, &[0.0, 4.0], &[(0.0, 0.0), (1.0, 4.0)], 0.0, 1.0, 10, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], "Plot: xi=[0.000, 1.000] | A=[-0.20, 4.20]");
        assert!(lines[1].starts_with('o'));
        assert!(lines[5].ends_with('o'));
    }

    #[test]
    fn multi_dimensional_profiles_are_not_plotted() {
        let grid = Grid::new(vec![0.0, 0.0], vec![1.0, 1.0], vec![3, 3], false).unwrap();
        let method = SpectralAbf::new(SpectralAbfConfig::new(grid)).unwrap();
        let state = method
            .build(
                Stacked::new(Vec::new())
                    .push(Component::new(0, 0))
                    .push(Component::new(0, 1)),
                &Snapshot {
                    positions: vec![Vector3::new(0.5, 0.5, 0.0)],
                    momenta: vec![Vector3::zeros()],
                    dt: 0.1,
                },
            )
            .unwrap()
            .initialize();
        let analysis = analyze(&method, &[state]).unwrap();
        let fes = &analysis.fes_fn.as_slice()[0];
        assert!(render_profile_plot(&analysis.mesh, &analysis.free_energy.as_slice()[0], fes, 20, 8).is_none());
    }

    #[test]
    fn saved_profiles_with_foreign_coefficients_are_refused() {
        use crate::domain::{ReplicaProfile, SimulationConfig};
        use crate::models::Fun;
        use std::sync::Arc;

        let grid = Grid::new(vec![-1.0], vec![1.0], vec![16], false).unwrap().into_chebyshev();
        let mesh = DMatrix::from_fn(16, 1, |i, _| -1.0 + 2.0 * i as f64 / 15.0);
        let profile = ProfileFile {
            tool: "sabf".to_string(),
            created_at: chrono::Utc::now(),
            method: SpectralAbfConfig::new(grid),
            simulation: SimulationConfig::default(),
            mesh,
            replicas: vec![ReplicaProfile {
                seed: 1,
                histogram: vec![1; 16],
                mean_force: DMatrix::zeros(16, 1),
                free_energy: vec![0.0; 16],
                fun: Arc::new(Fun::zeros(false, 10)),
            }],
        };

        let err = render_profile_file(&profile, 0, 20, 8).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
