use anyhow::Result;
use steepest::{minimize, MuStrategy, NonlinearProblem, Options, ProgressMonitor};

/// Minimize x^2 + y^2 subject to x + y - 1 <= 0 and x, y >= 0.
///
/// The unconstrained minimum (0, 0) is feasible, so the solver should
/// walk there from the starting point (0.5, 0.5) on the constraint.
struct ConstrainedQuadratic {}

impl NonlinearProblem for ConstrainedQuadratic {
    fn num_variables(&self) -> usize {
        2
    }

    fn num_constraints(&self) -> usize {
        1
    }

    fn jacobian_nnz(&self) -> usize {
        2
    }

    fn hessian_nnz(&self) -> usize {
        2
    }

    fn objective(&self, x: &[f64]) -> f64 {
        x[0] * x[0] + x[1] * x[1]
    }

    fn gradient(&self, x: &[f64], grad_f: &mut [f64]) {
        grad_f[0] = 2.0 * x[0];
        grad_f[1] = 2.0 * x[1];
    }

    fn constraints(&self, x: &[f64], g: &mut [f64]) {
        g[0] = x[0] + x[1] - 1.0;
    }

    fn jacobian_indices(&self, rows: &mut [usize], cols: &mut [usize]) {
        rows.copy_from_slice(&[0, 0]);
        cols.copy_from_slice(&[0, 1]);
    }

    fn jacobian_values(&self, _x: &[f64], values: &mut [f64]) {
        values.copy_from_slice(&[1.0, 1.0]);
    }

    fn hessian_indices(&self, rows: &mut [usize], cols: &mut [usize]) {
        rows.copy_from_slice(&[0, 1]);
        cols.copy_from_slice(&[0, 1]);
    }

    fn hessian_values(&self, _x: &[f64], obj_factor: f64, _lambda: &[f64], values: &mut [f64]) {
        values[0] = 2.0 * obj_factor;
        values[1] = 2.0 * obj_factor;
    }
}

/// One line per iteration, in the column style of an interior point log.
struct IterationLog {}

impl ProgressMonitor for IterationLog {
    fn update(&self, i: usize, stationarity: f64, violation: f64, obj: f64, step_size: f64) {
        if i == 0 {
            println!(
                "{:>4}  {:>13}  {:>10}  {:>10}  {:>10}",
                "iter", "objective", "inf_pr", "inf_du", "alpha"
            );
        }
        println!(
            "{:4}  {:13.6e}  {:10.3e}  {:10.3e}  {:10.3e}",
            i, obj, violation, stationarity, step_size
        );
    }
}

fn main() -> Result<()> {
    let problem = ConstrainedQuadratic {};

    let x0 = [0.5, 0.5];
    let xmin = [0.0, 0.0];
    let xmax = [f64::INFINITY, f64::INFINITY];
    let gl = [f64::NEG_INFINITY];
    let gu = [0.0];

    let opt = Options {
        tol: 1e-7,
        mu_strategy: MuStrategy::Adaptive,
        print_level: 5,
        ..Default::default()
    };

    let log = IterationLog {};
    let progress: Option<&dyn ProgressMonitor> = if opt.print_level >= 5 {
        Some(&log)
    } else {
        None
    };

    let (x, f, status, _iterations) =
        minimize(&problem, &x0, &xmin, &xmax, &gl, &gu, &opt, progress)?;

    println!();
    println!("Solution status: {}", status);
    println!("Optimal point: x = {:.6}, y = {:.6}", x[0], x[1]);
    println!("Objective value: {:.6}", f);

    Ok(())
}
