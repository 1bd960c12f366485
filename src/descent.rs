//! Steepest descent with Armijo backtracking.
//!
//! First-order baseline for the Newton drivers; shares their report type
//! and stopping rule.

use crate::line_search::backtracking_line_search;
use crate::newton::finish;
use crate::problem::Objective;
use crate::types::{check_eps, check_len, squared_norm, GradientDescentOptions, SolveFailure, SolveReport, SpringError};
use tracing::{debug, info, warn};

pub fn solve<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    eps: f64,
    max_iters: usize,
) -> Result<SolveReport, SpringError> {
    let options = GradientDescentOptions {
        eps,
        max_iterations: max_iters,
        ..GradientDescentOptions::default()
    };
    solve_with_options(objective, initial_x, &options)
}

/// Iterate `x ← x − t ∇f(x)` until `‖g‖² < 2 eps²`.
pub fn solve_with_options<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    options: &GradientDescentOptions,
) -> Result<SolveReport, SpringError> {
    let n = objective.n_unknowns();
    check_len(n, initial_x.len())?;
    check_eps(options.eps)?;
    options.line_search.validate()?;

    let e2 = 2.0 * options.eps * options.eps;
    let mut x = initial_x.to_vec();
    let mut g = vec![0.0; n];
    let mut direction = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;
    let mut failure = None;

    info!(unknowns = n, eps = options.eps, "gradient descent started");

    loop {
        objective.eval_gradient(&x, &mut g)?;
        if squared_norm(&g) < e2 {
            converged = true;
            break;
        }
        if iterations >= options.max_iterations {
            failure = Some(SolveFailure::MaxIterationsReached);
            break;
        }

        for (d, gi) in direction.iter_mut().zip(&g) {
            *d = -gi;
        }
        let ls = backtracking_line_search(objective, &x, &g, &direction, options.initial_step, &options.line_search)?;
        if !ls.accepted {
            warn!(iteration = iterations, "line search stalled along the negative gradient");
            failure = Some(SolveFailure::LineSearchStalled);
            break;
        }
        for (xi, di) in x.iter_mut().zip(&direction) {
            *xi += ls.step * di;
        }
        iterations += 1;
        debug!(iteration = iterations, energy = ls.energy, step = ls.step, "descent step");
    }

    finish(objective, x, &g, iterations, converged, failure, 0, None)
}
