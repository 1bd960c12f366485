//! Newton's method on an [`Objective`] with a sparse Hessian.
//!
//! Two drivers:
//!
//! 1. [`solve`]: exact Hessian, sparse Cholesky, Armijo line search.  Stops
//!    (and reports) as soon as the Hessian is not positive definite.
//! 2. [`solve_with_projected_hessian`]: Levenberg–Marquardt style diagonal
//!    shift `H + δI`.  A failed factorization grows `δ` by `γ` and retries;
//!    a successful one takes the full step and resets `δ`.
//!
//! Both return a [`SolveReport`] for every numeric outcome.  `Err` is
//! reserved for configuration problems (sizes, options, storage).

use crate::line_search::backtracking_line_search;
use crate::problem::Objective;
use crate::types::{
    check_eps, check_len, squared_norm, Cholesky, DampedNewtonOptions, NewtonOptions, SolveFailure,
    SolveReport, SpringError,
};
use sprs::{CsMat, TriMat};
use tracing::{debug, info, warn};

// ─────────────────────────────────────────────────────────────
//  Standard Newton
// ─────────────────────────────────────────────────────────────

/// Newton's method with default line-search settings.
pub fn solve<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    eps: f64,
    max_iters: usize,
) -> Result<SolveReport, SpringError> {
    let options = NewtonOptions {
        eps,
        max_iterations: max_iters,
        ..NewtonOptions::default()
    };
    solve_with_options(objective, initial_x, &options)
}

/// Newton's method.
///
/// Per iteration: converged if `‖g‖² < 2 eps²`; otherwise factorize the
/// exact Hessian, solve `H Δ = −g`, backtrack along `Δ` from `t = 1` and
/// move to `x + tΔ`.
pub fn solve_with_options<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    options: &NewtonOptions,
) -> Result<SolveReport, SpringError> {
    let n = objective.n_unknowns();
    check_len(n, initial_x.len())?;
    check_eps(options.eps)?;
    options.line_search.validate()?;

    let e2 = 2.0 * options.eps * options.eps;
    let mut x = initial_x.to_vec();
    let mut g = vec![0.0; n];
    let mut h = CsMat::zero((n, n));
    let mut iterations = 0;
    let mut converged = false;
    let mut failure = None;

    info!(unknowns = n, eps = options.eps, max_iterations = options.max_iterations, "newton solve started");

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

        objective.eval_hessian(&x, &mut h)?;
        let chol = match factorize(&h) {
            Ok(chol) => chol,
            Err(e) => {
                warn!(iteration = iterations, error = %e, "hessian is not positive definite; stopping");
                failure = Some(SolveFailure::FactorizationFailed);
                break;
            }
        };
        let rhs: Vec<f64> = g.iter().map(|v| -v).collect();
        let delta = chol.solve(&rhs);

        let ls = backtracking_line_search(objective, &x, &g, &delta, 1.0, &options.line_search)?;
        if !ls.accepted {
            warn!(iteration = iterations, step = ls.step, "line search found no sufficient decrease; stopping");
            failure = Some(SolveFailure::LineSearchStalled);
            break;
        }
        for (xi, di) in x.iter_mut().zip(&delta) {
            *xi += ls.step * di;
        }
        iterations += 1;

        debug!(
            iteration = iterations,
            energy = ls.energy,
            step = ls.step,
            pre_step_gradient_norm = squared_norm(&g).sqrt(),
            "newton step"
        );
    }

    finish(objective, x, &g, iterations, converged, failure, 0, None)
}

// ─────────────────────────────────────────────────────────────
//  Damped (projected-Hessian) Newton
// ─────────────────────────────────────────────────────────────

/// Damped Newton with default damping schedule.
pub fn solve_with_projected_hessian<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    gamma: f64,
    eps: f64,
    max_iters: usize,
) -> Result<SolveReport, SpringError> {
    let options = DampedNewtonOptions {
        gamma,
        eps,
        max_iterations: max_iters,
        ..DampedNewtonOptions::default()
    };
    solve_with_projected_hessian_options(objective, initial_x, &options)
}

/// Damped Newton.
///
/// Damping starts at `initial_damping_scale · |trace(H₀)| / n`.  Each
/// iteration factorizes `H + δI`:
///
/// * failure: `δ ← γ δ`, no step;
/// * success: `x ← x − (H + δI)⁻¹ g` (full step, no line search),
///   re-evaluate `g` and `H`, and set `δ ← reset_damping`.
///
/// Retries are charged to the iteration budget like accepted steps.  The
/// reset does not decay from the previous δ; it is the fixed value
/// `reset_damping` (0.1 by default).  Converged once `‖g‖ < eps`.
pub fn solve_with_projected_hessian_options<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    options: &DampedNewtonOptions,
) -> Result<SolveReport, SpringError> {
    let n = objective.n_unknowns();
    check_len(n, initial_x.len())?;
    options.validate()?;

    let mut x = initial_x.to_vec();
    let mut g = vec![0.0; n];
    let mut h = CsMat::zero((n, n));
    objective.eval_gradient(&x, &mut g)?;
    objective.eval_hessian(&x, &mut h)?;

    let mut damping = if n > 0 {
        options.initial_damping_scale * trace(&h).abs() / n as f64
    } else {
        0.0
    };
    let mut iterations = 0;
    let mut retries = 0;
    let mut converged = false;
    let mut failure = None;

    info!(unknowns = n, gamma = options.gamma, initial_damping = damping, "damped newton solve started");

    loop {
        if squared_norm(&g).sqrt() < options.eps {
            converged = true;
            break;
        }
        if iterations >= options.max_iterations {
            failure = Some(SolveFailure::MaxIterationsReached);
            break;
        }

        match factorize(&add_to_diagonal(&h, damping)) {
            Ok(chol) => {
                let rhs: Vec<f64> = g.iter().map(|v| -v).collect();
                let delta = chol.solve(&rhs);
                for (xi, di) in x.iter_mut().zip(&delta) {
                    *xi += di;
                }
                objective.eval_gradient(&x, &mut g)?;
                objective.eval_hessian(&x, &mut h)?;
                debug!(
                    iteration = iterations + 1,
                    damping,
                    gradient_norm = squared_norm(&g).sqrt(),
                    "damped newton step"
                );
                damping = options.reset_damping;
            }
            Err(e) => {
                damping = grow_damping(damping, options.gamma, options.reset_damping);
                retries += 1;
                debug!(iteration = iterations + 1, damping, error = %e, "factorization failed; increasing damping");
            }
        }
        iterations += 1;
    }

    finish(objective, x, &g, iterations, converged, failure, retries, Some(damping))
}

/// A successful factorization of `H + δI`.
#[derive(Debug)]
pub struct DampedFactorization {
    pub damping: f64,
    pub factorization: Cholesky,
    /// Attempts that failed before `damping` worked.
    pub failed_attempts: usize,
}

/// Grow `δ` by `gamma` from `initial_damping` until `h + δI` is SPD.
///
/// Gives up with the last factorization error after `max_attempts`.
pub fn factorize_with_damping(
    h: &CsMat<f64>,
    initial_damping: f64,
    gamma: f64,
    max_attempts: usize,
) -> Result<DampedFactorization, SpringError> {
    if !(gamma > 1.0) {
        return Err(SpringError::InvalidOption(format!("gamma must be > 1, got {gamma}")));
    }
    let mut damping = initial_damping;
    let mut last_error = None;
    for attempt in 0..max_attempts {
        match factorize(&add_to_diagonal(h, damping)) {
            Ok(factorization) => {
                return Ok(DampedFactorization {
                    damping,
                    factorization,
                    failed_attempts: attempt,
                })
            }
            Err(e) => {
                last_error = Some(e);
                damping = grow_damping(damping, gamma, crate::types::DAMPING_RESET);
            }
        }
    }
    match last_error {
        Some(e) => Err(SpringError::Linalg(e)),
        None => Err(SpringError::InvalidOption("max_attempts must be at least 1".into())),
    }
}

// ─────────────────────────────────────────────────────────────
//  Sparse helpers
// ─────────────────────────────────────────────────────────────

/// `δ ← γ δ`, restarting from `fallback` when δ is zero.
fn grow_damping(damping: f64, gamma: f64, fallback: f64) -> f64 {
    if damping > 0.0 {
        damping * gamma
    } else {
        fallback
    }
}

fn factorize(h: &CsMat<f64>) -> Result<Cholesky, sprs::errors::LinalgError> {
    if h.is_csc() {
        Cholesky::factorize(h.view())
    } else {
        Cholesky::factorize(h.to_csc().view())
    }
}

/// Sum of the diagonal entries.
pub fn trace(h: &CsMat<f64>) -> f64 {
    h.iter().filter(|(_, (r, c))| r == c).map(|(v, _)| *v).sum()
}

/// `h + δI` as a new CSC matrix.  Every diagonal entry is stored, even
/// where `h` has none.
pub fn add_to_diagonal(h: &CsMat<f64>, delta: f64) -> CsMat<f64> {
    let (rows, cols) = h.shape();
    let mut tri = TriMat::with_capacity((rows, cols), h.nnz() + rows.min(cols));
    for (&v, (r, c)) in h.iter() {
        tri.add_triplet(r, c, v);
    }
    for i in 0..rows.min(cols) {
        tri.add_triplet(i, i, delta);
    }
    tri.to_csc()
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn finish<O: Objective + ?Sized>(
    objective: &O,
    point: Vec<f64>,
    gradient: &[f64],
    iterations: usize,
    converged: bool,
    failure: Option<SolveFailure>,
    factorization_retries: usize,
    final_damping: Option<f64>,
) -> Result<SolveReport, SpringError> {
    let energy = objective.eval_energy(&point)?;
    let gradient_norm = squared_norm(gradient).sqrt();
    match failure {
        None => info!(iterations, energy, gradient_norm, "converged"),
        Some(SolveFailure::MaxIterationsReached) => {
            warn!(iterations, energy, gradient_norm, "maximum iterations reached without convergence")
        }
        Some(reason) => warn!(iterations, energy, gradient_norm, ?reason, "solve stopped early"),
    }
    Ok(SolveReport {
        point,
        iterations,
        converged,
        failure,
        energy,
        gradient_norm,
        factorization_retries,
        final_damping,
    })
}
