//! **springnet** — Newton-type energy minimisation for 2D mass-spring
//! networks.
//!
//! 1. **Elements** (`element`): spring potentials with analytic derivatives
//!    (with / without rest length, PSD-projected Hessian) and pin penalties.
//! 2. **Problem** (`problem`): local-to-global assembly of energy, gradient
//!    and dense or sparse Hessian; the `Objective` trait.
//! 3. **Line search** (`line_search`): Armijo backtracking.
//! 4. **Newton** (`newton`): exact-Hessian Newton and damped Newton on sparse
//!    Cholesky (`sprs-ldl`).
//! 5. **Baselines** (`descent`, `optimizer`): gradient descent and L-BFGS
//!    via `argmin`.
//! 6. **Tooling** (`grid`, `statistics`): grid networks with pin scenarios,
//!    evaluation counting.

pub mod types;
pub mod element;
pub mod problem;
pub mod line_search;
pub mod newton;
pub mod descent;
pub mod optimizer;
pub mod grid;
pub mod statistics;
