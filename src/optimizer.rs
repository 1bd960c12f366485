//! L-BFGS driver via the `argmin` crate.
//!
//! Wraps any [`Objective`] into argmin's `CostFunction` + `Gradient`
//! traits and runs L-BFGS with a More–Thuente line search.  Serves as a
//! Hessian-free baseline next to the Newton drivers.
//!
//! Uses `Vec<f64>` as the argmin parameter type, which is also the unknown
//! vector type of the rest of the crate.

use crate::problem::Objective;
use crate::types::{check_eps, check_len, squared_norm, LbfgsOptions, SolveFailure, SolveReport, SpringError};
use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::cell::RefCell;
use tracing::{info, warn};

// ─────────────────────────────────────────────────────────────
//  argmin problem wrapper
// ─────────────────────────────────────────────────────────────

/// Adapts an [`Objective`] for argmin.
///
/// argmin calls `cost(x)` and `gradient(x)` separately, often at the same
/// `x`.  The last `(x, gradient)` pair is cached so repeated gradient
/// requests at one point assemble only once.
struct ArgminObjective<'a, O: ?Sized> {
    objective: &'a O,
    last_gradient: RefCell<Option<(Vec<f64>, Vec<f64>)>>,
}

impl<'a, O: Objective + ?Sized> ArgminObjective<'a, O> {
    fn new(objective: &'a O) -> Self {
        Self {
            objective,
            last_gradient: RefCell::new(None),
        }
    }
}

impl<'a, O: Objective + ?Sized> CostFunction for ArgminObjective<'a, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        self.objective
            .eval_energy(x)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl<'a, O: Objective + ?Sized> Gradient for ArgminObjective<'a, O> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        if let Some((cached_x, cached_g)) = self.last_gradient.borrow().as_ref() {
            if cached_x == x {
                return Ok(cached_g.clone());
            }
        }
        let mut g = vec![0.0; x.len()];
        self.objective
            .eval_gradient(x, &mut g)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        *self.last_gradient.borrow_mut() = Some((x.clone(), g.clone()));
        Ok(g)
    }
}

// ─────────────────────────────────────────────────────────────
//  Entry point
// ─────────────────────────────────────────────────────────────

/// Minimise `objective` from `initial_x` with L-BFGS.
pub fn minimize_lbfgs<O: Objective + ?Sized>(
    objective: &O,
    initial_x: &[f64],
    options: &LbfgsOptions,
) -> Result<SolveReport, SpringError> {
    let n = objective.n_unknowns();
    check_len(n, initial_x.len())?;
    check_eps(options.eps)?;

    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, options.memory).with_tolerance_grad(options.eps)?;

    info!(unknowns = n, memory = options.memory, "l-bfgs solve started");

    let result = Executor::new(ArgminObjective::new(objective), solver)
        .configure(|config| {
            config
                .param(initial_x.to_vec())
                .max_iters(options.max_iterations)
                .target_cost(f64::NEG_INFINITY)
        })
        .run()?;

    let state = result.state();
    let point = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| SpringError::Solver("L-BFGS returned no best parameters".into()))?;
    let iterations = state.get_iter() as usize;
    let reason = state.get_termination_reason().cloned();

    let converged = matches!(reason, Some(TerminationReason::SolverConverged));
    let failure = match reason {
        _ if converged => None,
        Some(TerminationReason::MaxItersReached) => Some(SolveFailure::MaxIterationsReached),
        _ => Some(SolveFailure::LineSearchStalled),
    };

    let energy = objective.eval_energy(&point)?;
    let mut g = vec![0.0; n];
    objective.eval_gradient(&point, &mut g)?;
    let gradient_norm = squared_norm(&g).sqrt();

    if converged {
        info!(iterations, energy, gradient_norm, "l-bfgs converged");
    } else {
        warn!(iterations, energy, gradient_norm, ?reason, "l-bfgs stopped without convergence");
    }

    Ok(SolveReport {
        point,
        iterations,
        converged,
        failure,
        energy,
        gradient_norm,
        factorization_retries: 0,
        final_damping: None,
    })
}
