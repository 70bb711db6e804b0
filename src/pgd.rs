use crate::common::{MuStrategy, Options, Status};
use crate::math::{dot, norm_inf};
use crate::traits::{NonlinearProblem, ProgressMonitor};
use anyhow::{bail, Result};
use itertools::izip;
use log::debug;
use sparsetools::csr::CSR;

/// Smallest step length tried before the line search gives up.
const ALPHA_MIN: f64 = 1e-12;
/// Largest step length the adaptive strategy may grow to.
const ALPHA_MAX: f64 = 1e10;
/// Armijo sufficient decrease constant.
const C1: f64 = 1e-4;

/// Projected gradient method. Minimize a function f(x) beginning from a
/// starting point `x0`, subject to inequality constraints and variable
/// bounds.
///
/// ```txt
///       min f(x)
///        x
/// ```
///
/// subject to
///
/// ```txt
///       gl <= g(x) <= gu    (inequality constraints)
///       xmin <= x <= xmax   (variable bounds)
/// ```
///
/// The `problem` supplies function values and derivatives through the
/// [`NonlinearProblem`] callbacks. The Hessian of the Lagrangian is only
/// consulted at the starting point, to size the initial step; constraint
/// rows that are active at an iterate have their Jacobian rows projected
/// out of the descent direction.
///
/// Returns the solution vector `x`, the final objective function value
/// `f`, the terminal [`Status`] and the number of iterations performed.
/// Only a malformed problem or option set is an error; every outcome of
/// the iteration itself, including failure to converge, is reported as a
/// [`Status`].
pub fn minimize<P: NonlinearProblem>(
    problem: &P,
    x0: &[f64],
    xmin: &[f64],
    xmax: &[f64],
    gl: &[f64],
    gu: &[f64],
    opt: &Options,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<(Vec<f64>, f64, Status, usize)> {
    let nx = problem.num_variables();
    let ng = problem.num_constraints();

    validate(x0, xmin, xmax, gl, gu, opt, nx, ng)?;

    // The sparsity structure is fixed; query it once.
    let nj = problem.jacobian_nnz();
    let mut jrows = vec![0usize; nj];
    let mut jcols = vec![0usize; nj];
    problem.jacobian_indices(&mut jrows, &mut jcols);
    for (&r, &c) in jrows.iter().zip(&jcols) {
        if r >= ng || c >= nx {
            bail!(
                "jacobian index ({}, {}) out of range for a {}x{} matrix",
                r,
                c,
                ng,
                nx
            );
        }
    }

    let nh = problem.hessian_nnz();
    let mut hrows = vec![0usize; nh];
    let mut hcols = vec![0usize; nh];
    problem.hessian_indices(&mut hrows, &mut hcols);
    for (&r, &c) in hrows.iter().zip(&hcols) {
        if r >= nx || c > r {
            bail!(
                "hessian index ({}, {}) is not in the lower triangle of a {}x{} matrix",
                r,
                c,
                nx,
                nx
            );
        }
    }

    // Start from the projection of x0 onto the variable bounds.
    let mut x = project(x0, xmin, xmax);
    let mut f = problem.objective(&x);
    let mut g = vec![0.0; ng];
    problem.constraints(&x, &mut g);
    if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
        return Ok((x, f, Status::InvalidNumberDetected, 0));
    }
    let mut viol = violation(&g, gl, gu);

    let alpha0 = initial_step(problem, &x, &hrows, &hcols);
    let mut alpha = alpha0;

    let mut grad = vec![0.0; nx];
    let mut jvals = vec![0.0; nj];
    let mut status = Status::MaximumIterationsExceeded;
    let mut iterations = 0;

    for it in 0..=opt.max_it {
        iterations = it;

        problem.gradient(&x, &mut grad);
        if grad.iter().any(|v| !v.is_finite()) {
            status = Status::InvalidNumberDetected;
            break;
        }
        problem.jacobian_values(&x, &mut jvals);
        let jac = assemble(ng, nx, &jrows, &jcols, &jvals);

        // Steepest descent direction, with the Jacobian rows of active
        // constraints projected out so that the direction stays in the
        // linearized feasible cone.
        let mut dir: Vec<f64> = grad.iter().map(|v| -v).collect();
        for i in 0..ng {
            let upper = g[i] >= gu[i] - opt.tol;
            let lower = g[i] <= gl[i] + opt.tol;
            if !upper && !lower {
                continue;
            }
            let mut jd = 0.0;
            let mut jj = 0.0;
            for (k, (&r, &c)) in jrows.iter().zip(&jcols).enumerate() {
                if r == i {
                    jd += jvals[k] * dir[c];
                    jj += jvals[k] * jvals[k];
                }
            }
            // TODO: successive projections are not exact when several
            // active rows overlap on the same variables
            if jj > f64::EPSILON && ((upper && jd > 0.0) || (lower && jd < 0.0)) {
                for (k, (&r, &c)) in jrows.iter().zip(&jcols).enumerate() {
                    if r == i {
                        dir[c] -= jd / jj * jvals[k];
                    }
                }
            }
        }

        // The full projected step vanishes at a critical point.
        let full: Vec<f64> = izip!(&x, &dir).map(|(xi, di)| xi + di).collect();
        let step: Vec<f64> = izip!(project(&full, xmin, xmax), &x)
            .map(|(pi, xi)| pi - xi)
            .collect();
        let stat = norm_inf(&step);

        if opt.print_level >= 5 {
            debug!(
                "{:4}  f {:13.6e}  stat {:9.3e}  viol {:9.3e}  alpha {:9.3e}",
                it, f, stat, viol, alpha
            );
        }
        if let Some(progress) = progress {
            progress.update(it, stat, viol, f, alpha);
        }

        if stat <= opt.tol && viol <= opt.tol {
            status = Status::SolveSucceeded;
            break;
        }
        if it == opt.max_it {
            break;
        }

        if opt.mu_strategy == MuStrategy::Monotone {
            alpha = alpha0;
        }

        // Backtracking line search. Candidate steps are checked against
        // the linearized constraints before paying for an evaluation.
        let mut accepted = false;
        let mut first_try = true;
        while alpha >= ALPHA_MIN {
            let trial: Vec<f64> = izip!(&x, &dir).map(|(xi, di)| xi + alpha * di).collect();
            let xt = project(&trial, xmin, xmax);
            let step: Vec<f64> = izip!(&xt, &x).map(|(ti, xi)| ti - xi).collect();
            if norm_inf(&step) == 0.0 {
                break;
            }

            let pred = linearized(&jac, &g, &step);
            if violation(&pred, gl, gu) > viol + opt.tol {
                alpha /= 2.0;
                first_try = false;
                continue;
            }

            let ft = problem.objective(&xt);
            let mut gt = vec![0.0; ng];
            problem.constraints(&xt, &mut gt);
            if !ft.is_finite() || gt.iter().any(|v| !v.is_finite()) {
                return Ok((x, f, Status::InvalidNumberDetected, it));
            }
            let violt = violation(&gt, gl, gu);

            if ft <= f + C1 * dot(&grad, &step) && violt <= viol + opt.tol {
                x = xt;
                f = ft;
                g = gt;
                viol = violt;
                accepted = true;
                break;
            }
            alpha /= 2.0;
            first_try = false;
        }

        if !accepted {
            status = Status::SearchDirectionTooSmall;
            break;
        }
        if first_try && opt.mu_strategy == MuStrategy::Adaptive {
            alpha = (2.0 * alpha).min(ALPHA_MAX);
        }
    }

    if opt.print_level > 0 {
        match status {
            Status::SolveSucceeded => debug!("converged in {} iterations", iterations),
            _ => debug!("stopped after {} iterations: {}", iterations, status),
        }
    }

    Ok((x, f, status, iterations))
}

fn validate(
    x0: &[f64],
    xmin: &[f64],
    xmax: &[f64],
    gl: &[f64],
    gu: &[f64],
    opt: &Options,
    nx: usize,
    ng: usize,
) -> Result<()> {
    if x0.len() != nx {
        bail!("starting point has length {}, expected {}", x0.len(), nx);
    }
    if xmin.len() != nx || xmax.len() != nx {
        bail!(
            "variable bounds have lengths {} and {}, expected {}",
            xmin.len(),
            xmax.len(),
            nx
        );
    }
    if gl.len() != ng || gu.len() != ng {
        bail!(
            "constraint bounds have lengths {} and {}, expected {}",
            gl.len(),
            gu.len(),
            ng
        );
    }
    if x0.iter().any(|v| !v.is_finite()) {
        bail!("starting point must be finite");
    }
    for (i, (&li, &ui)) in xmin.iter().zip(xmax).enumerate() {
        if li > ui {
            bail!("variable bound {} is empty: {} > {}", i, li, ui);
        }
    }
    for (i, (&li, &ui)) in gl.iter().zip(gu).enumerate() {
        if li > ui {
            bail!("constraint bound {} is empty: {} > {}", i, li, ui);
        }
        if (ui - li).abs() <= f64::EPSILON {
            bail!("constraint {} is an equality, only inequalities are supported", i);
        }
    }
    if !(opt.tol.is_finite() && opt.tol > 0.0) {
        bail!("tol ({}) must be positive", opt.tol);
    }
    if opt.max_it == 0 {
        bail!("max_it must be at least 1");
    }
    if opt.print_level > 12 {
        bail!("print_level ({}) must be between 0 and 12", opt.print_level);
    }
    Ok(())
}

/// Euclidean projection of `x` onto the variable bounds.
fn project(x: &[f64], xmin: &[f64], xmax: &[f64]) -> Vec<f64> {
    izip!(x, xmin, xmax)
        .map(|(&xi, &li, &ui)| xi.max(li).min(ui))
        .collect()
}

/// Maximum violation of `gl <= g <= gu`. Zero when every constraint
/// holds (and for an empty constraint set).
fn violation(g: &[f64], gl: &[f64], gu: &[f64]) -> f64 {
    izip!(g, gl, gu)
        .map(|(gi, li, ui)| (gi - ui).max(li - gi).max(0.0))
        .fold(0.0, f64::max)
}

/// Constraint values predicted by the linearization `g + J*d`.
fn linearized(jac: &CSR<usize, f64>, g: &[f64], d: &[f64]) -> Vec<f64> {
    izip!(g, jac * &d).map(|(gi, ji)| gi + ji).collect()
}

/// Assembles triplet entries into a CSR matrix, summing duplicates.
fn assemble(rows: usize, cols: usize, ri: &[usize], ci: &[usize], values: &[f64]) -> CSR<usize, f64> {
    if ri.is_empty() {
        return CSR::with_size(rows, cols);
    }
    let mut dense = vec![vec![0.0; cols]; rows];
    for (k, (&r, &c)) in ri.iter().zip(ci).enumerate() {
        dense[r][c] += values[k];
    }
    CSR::from_dense(&dense)
}

/// Initial step length from a Gershgorin row-sum bound on the largest
/// eigenvalue of the Hessian of the Lagrangian at the starting point.
/// Unit step when no second derivatives are available.
fn initial_step<P: NonlinearProblem>(
    problem: &P,
    x: &[f64],
    hrows: &[usize],
    hcols: &[usize],
) -> f64 {
    if hrows.is_empty() {
        return 1.0;
    }
    let lambda = vec![0.0; problem.num_constraints()];
    let mut values = vec![0.0; hrows.len()];
    problem.hessian_values(x, 1.0, &lambda, &mut values);

    // Mirror the lower triangle before summing the rows.
    let mut rowsum = vec![0.0; problem.num_variables()];
    for (k, (&r, &c)) in hrows.iter().zip(hcols).enumerate() {
        rowsum[r] += values[k].abs();
        if r != c {
            rowsum[c] += values[k].abs();
        }
    }
    let lmax = norm_inf(&rowsum);
    if lmax.is_finite() && lmax > f64::EPSILON {
        1.0 / lmax
    } else {
        1.0
    }
}
