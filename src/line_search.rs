//! Backtracking line search with the Armijo sufficient-decrease test.

use crate::problem::Objective;
use crate::types::{check_len, dot, LineSearchOptions, SpringError};
use tracing::trace;

/// Result of one line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome {
    /// Accepted step; the last trial step, or 0 for a non-descent direction,
    /// when `accepted` is false.
    pub step: f64,
    /// Whether `step` satisfies the sufficient-decrease condition.
    pub accepted: bool,
    /// Number of rejected trials.
    pub backtracks: usize,
    /// Energy at `x + step · direction` if accepted, at `x` otherwise.
    pub energy: f64,
}

/// Shrink `t` from `initial_step` until
///
///   f(x + t d) <= f(x) + c1 · t · ∇f(x)·d
///
/// After `options.max_backtracks` rejected trials the search stops and
/// returns `accepted = false` together with the last trial step.  A
/// non-descent direction (`∇f·d >= 0`, or NaN) is rejected before any trial
/// with `step = 0`.  Both are soft failures; the caller decides what to do
/// with them.
///
/// `initial_step` must be finite and positive.
pub fn backtracking_line_search<O: Objective + ?Sized>(
    objective: &O,
    x: &[f64],
    gradient: &[f64],
    direction: &[f64],
    initial_step: f64,
    options: &LineSearchOptions,
) -> Result<LineSearchOutcome, SpringError> {
    options.validate()?;
    if !(initial_step.is_finite() && initial_step > 0.0) {
        return Err(SpringError::InvalidOption(format!(
            "initial step must be finite and positive, got {initial_step}"
        )));
    }
    let n = objective.n_unknowns();
    check_len(n, x.len())?;
    check_len(n, gradient.len())?;
    check_len(n, direction.len())?;

    let f0 = objective.eval_energy(x)?;
    let slope = dot(gradient, direction);
    // round-off would eventually accept a tiny step along an ascent direction
    if !(slope < 0.0) {
        trace!(slope, "not a descent direction");
        return Ok(LineSearchOutcome {
            step: 0.0,
            accepted: false,
            backtracks: 0,
            energy: f0,
        });
    }
    let mut trial = vec![0.0; n];
    let mut t = initial_step;

    for backtracks in 0..=options.max_backtracks {
        for ((xt, &xi), &di) in trial.iter_mut().zip(x).zip(direction) {
            *xt = xi + t * di;
        }
        let f = objective.eval_energy(&trial)?;
        // NaN energies compare false and count as rejections
        if f <= f0 + options.c1 * t * slope {
            trace!(step = t, backtracks, energy = f, "armijo step accepted");
            return Ok(LineSearchOutcome {
                step: t,
                accepted: true,
                backtracks,
                energy: f,
            });
        }
        if backtracks < options.max_backtracks {
            t *= options.shrink;
        }
    }

    Ok(LineSearchOutcome {
        step: t,
        accepted: false,
        backtracks: options.max_backtracks + 1,
        energy: f0,
    })
}
