use sprs::{CsMatView, FillInReduction, SymmetryCheck};
use sprs_ldl::{Ldl, LdlNumeric};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Only configuration problems surface as `Err`.  Numeric outcomes of a
/// solve (failed factorization, stalled line search, exhausted budget) are
/// reported through [`SolveReport`] instead.
#[derive(Debug, Error)]
pub enum SpringError {
    /// A node index passed to the problem builder does not exist.
    #[error("node index {index} out of range for a network of {n_nodes} nodes")]
    IndexOutOfRange { index: usize, n_nodes: usize },
    /// A vector argument has the wrong length.
    #[error("dimension mismatch: expected {expected} entries, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// Dense and sparse Hessian contracts were mixed.
    #[error("hessian storage mismatch: problem assembles {found:?}, caller requested {expected:?}")]
    StorageMismatch {
        expected: HessianStorage,
        found: HessianStorage,
    },
    /// A solver or element option is outside its valid range.
    #[error("invalid option: {0}")]
    InvalidOption(String),
    /// Linear algebra failure (singular / not-SPD matrix, etc.).
    #[error("linear algebra error: {0}")]
    Linalg(#[from] sprs::errors::LinalgError),
    /// Argmin solver returned an error.
    #[error("solver error: {0}")]
    Solver(String),
}

impl From<argmin::core::Error> for SpringError {
    fn from(e: argmin::core::Error) -> Self {
        Self::Solver(e.to_string())
    }
}

/// Fail fast when a vector does not match the problem size.
pub(crate) fn check_len(expected: usize, found: usize) -> Result<(), SpringError> {
    if expected != found {
        return Err(SpringError::DimensionMismatch { expected, found });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
//  Constants
// ─────────────────────────────────────────────────────────────

/// Smallest eigenvalue kept by the PSD-projected spring element.
pub const PSD_EIGENVALUE_FLOOR: f64 = 1e-7;
/// Sufficient-decrease constant of the Armijo condition.
pub const ARMIJO_C1: f64 = 1e-4;
/// Default growth factor for the damping parameter.
pub const DEFAULT_GAMMA: f64 = 10.0;
/// Damping value used after every accepted damped Newton step.
pub const DAMPING_RESET: f64 = 0.1;
/// Weight of the pins added by the grid scenarios.
pub const CONSTRAINT_WEIGHT: f64 = 1e5;
pub const DEFAULT_EPS: f64 = 1e-4;
pub const DEFAULT_MAX_ITERATIONS: usize = 1_000_000;

// ─────────────────────────────────────────────────────────────
//  Hessian storage strategy
// ─────────────────────────────────────────────────────────────

/// How a problem accumulates its global Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianStorage {
    /// Direct writes into an `n × n` dense matrix.  Debugging only.
    Dense,
    /// Triplet accumulation compressed into a CSC matrix.
    Sparse,
}

// ─────────────────────────────────────────────────────────────
//  Solver options
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct LineSearchOptions {
    /// Armijo constant `c1` in `f(x + t d) <= f(x) + c1 t g·d`.
    pub c1: f64,
    /// Factor applied to the step after each rejected trial, in (0, 1).
    pub shrink: f64,
    /// Number of rejected trials after which the search gives up.
    pub max_backtracks: usize,
}

impl Default for LineSearchOptions {
    fn default() -> Self {
        Self {
            c1: ARMIJO_C1,
            shrink: 0.5,
            max_backtracks: 60,
        }
    }
}

impl LineSearchOptions {
    pub fn validate(&self) -> Result<(), SpringError> {
        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            return Err(SpringError::InvalidOption(format!("c1 must lie in (0, 1), got {}", self.c1)));
        }
        if !(self.shrink > 0.0 && self.shrink < 1.0) {
            return Err(SpringError::InvalidOption(format!(
                "shrink factor must lie in (0, 1), got {}",
                self.shrink
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewtonOptions {
    /// Converged once `‖g‖² < 2 eps²`.
    pub eps: f64,
    pub max_iterations: usize,
    pub line_search: LineSearchOptions,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            line_search: LineSearchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DampedNewtonOptions {
    /// Growth factor applied to the damping after a failed factorization.
    pub gamma: f64,
    /// Converged once `‖g‖ < eps`.
    pub eps: f64,
    /// Budget shared by accepted steps and factorization retries.
    pub max_iterations: usize,
    /// Initial damping is `initial_damping_scale · |trace(H)| / n`.
    pub initial_damping_scale: f64,
    /// Damping restored after every accepted step.
    pub reset_damping: f64,
}

impl Default for DampedNewtonOptions {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            eps: DEFAULT_EPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_damping_scale: 1e-3,
            reset_damping: DAMPING_RESET,
        }
    }
}

impl DampedNewtonOptions {
    pub fn validate(&self) -> Result<(), SpringError> {
        if !(self.gamma > 1.0) {
            return Err(SpringError::InvalidOption(format!("gamma must be > 1, got {}", self.gamma)));
        }
        check_eps(self.eps)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GradientDescentOptions {
    pub eps: f64,
    pub max_iterations: usize,
    /// First trial step of every line search.
    pub initial_step: f64,
    pub line_search: LineSearchOptions,
}

impl Default for GradientDescentOptions {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_step: 1.0,
            line_search: LineSearchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LbfgsOptions {
    /// Gradient-norm tolerance handed to L-BFGS.
    pub eps: f64,
    pub max_iterations: u64,
    /// Number of correction pairs kept.
    pub memory: usize,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            max_iterations: 500,
            memory: 10,
        }
    }
}

pub(crate) fn check_eps(eps: f64) -> Result<(), SpringError> {
    if !(eps > 0.0) {
        return Err(SpringError::InvalidOption(format!("eps must be positive, got {eps}")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
//  Solve report
// ─────────────────────────────────────────────────────────────

/// Why a solve stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveFailure {
    /// The Hessian was not positive definite (standard Newton only).
    FactorizationFailed,
    /// No step satisfied the sufficient-decrease condition.
    LineSearchStalled,
    /// The iteration budget ran out.
    MaxIterationsReached,
}

/// Outcome of a solve.  `point` is always the last accepted iterate.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub point: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub failure: Option<SolveFailure>,
    /// Energy at `point`.
    pub energy: f64,
    /// Euclidean norm of the gradient at `point`.
    pub gradient_norm: f64,
    /// Failed factorization attempts (damped Newton only).
    pub factorization_retries: usize,
    /// Damping in effect when the solve stopped (damped Newton only).
    pub final_damping: Option<f64>,
}

// ─────────────────────────────────────────────────────────────
//  Sparse Cholesky
// ─────────────────────────────────────────────────────────────

/// Numeric Cholesky factorization of a symmetric positive definite matrix.
///
/// Uses `sprs-ldl`'s `LdlNumeric` with RCM fill-in reduction and rejects
/// any pivot `D_ii <= 0`, so success certifies positive definiteness.
pub struct Cholesky(LdlNumeric<f64, usize>);

impl std::fmt::Debug for Cholesky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cholesky(n = {})", self.0.d().len())
    }
}

impl Cholesky {
    /// Factorize `a`.  Fails with `SingularMatrix` if `a` is not SPD.
    pub fn factorize(a: CsMatView<f64>) -> Result<Self, sprs::errors::LinalgError> {
        let ldl = Ldl::new()
            .fill_in_reduction(FillInReduction::ReverseCuthillMcKee)
            .check_symmetry(SymmetryCheck::DontCheckSymmetry)
            .numeric(a)?;
        for (i, &di) in ldl.d().iter().enumerate() {
            // NaN pivots fail too
            if !(di > 0.0) {
                return Err(sprs::errors::LinalgError::SingularMatrix(
                    sprs::errors::SingularMatrixInfo {
                        index: i,
                        reason: "D <= 0 in Cholesky factorization (not SPD)",
                    },
                ));
            }
        }
        Ok(Self(ldl))
    }

    /// Solve `A x = rhs` using the stored factorization.
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        self.0.solve(rhs)
    }
}

// ─────────────────────────────────────────────────────────────
//  Small vector helpers
// ─────────────────────────────────────────────────────────────

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn squared_norm(v: &[f64]) -> f64 {
    dot(v, v)
}
