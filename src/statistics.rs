//! Evaluation counting for any [`Objective`].

use crate::problem::Objective;
use crate::types::SpringError;
use sprs::CsMat;
use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::info;

/// Counts of each evaluation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationCounts {
    pub energy: usize,
    pub gradient: usize,
    pub hessian: usize,
}

/// Wraps an objective and counts how often each quantity is evaluated.
///
/// `Cell` counters keep the `&self` evaluation contract; the wrapper is
/// meant for one solve on one thread.
#[derive(Debug)]
pub struct EvaluationCounter<O> {
    inner: O,
    energy: Cell<usize>,
    gradient: Cell<usize>,
    hessian: Cell<usize>,
    started: Cell<Option<Instant>>,
}

impl<O: Objective> EvaluationCounter<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            energy: Cell::new(0),
            gradient: Cell::new(0),
            hessian: Cell::new(0),
            started: Cell::new(None),
        }
    }

    /// Zero the counters and restart the clock.
    pub fn start_recording(&self) {
        self.energy.set(0);
        self.gradient.set(0);
        self.hessian.set(0);
        self.started.set(Some(Instant::now()));
    }

    pub fn counts(&self) -> EvaluationCounts {
        EvaluationCounts {
            energy: self.energy.get(),
            gradient: self.gradient.get(),
            hessian: self.hessian.get(),
        }
    }

    /// Time since [`start_recording`](Self::start_recording), if started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started.get().map(|t| t.elapsed())
    }

    /// Log the counters at `info` level.
    pub fn log_statistics(&self) {
        let counts = self.counts();
        info!(
            energy_evaluations = counts.energy,
            gradient_evaluations = counts.gradient,
            hessian_evaluations = counts.hessian,
            elapsed_ms = self.elapsed().map(|d| d.as_secs_f64() * 1e3),
            "evaluation statistics"
        );
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Objective> Objective for EvaluationCounter<O> {
    fn n_unknowns(&self) -> usize {
        self.inner.n_unknowns()
    }

    fn eval_energy(&self, x: &[f64]) -> Result<f64, SpringError> {
        self.energy.set(self.energy.get() + 1);
        self.inner.eval_energy(x)
    }

    fn eval_gradient(&self, x: &[f64], g: &mut [f64]) -> Result<(), SpringError> {
        self.gradient.set(self.gradient.get() + 1);
        self.inner.eval_gradient(x, g)
    }

    fn eval_hessian(&self, x: &[f64], h: &mut CsMat<f64>) -> Result<(), SpringError> {
        self.hessian.set(self.hessian.get() + 1);
        self.inner.eval_hessian(x, h)
    }
}
