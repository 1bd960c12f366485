//! Global mass-spring objective: local-to-global assembly of energy,
//! gradient and Hessian.
//!
//! Node `i` owns unknowns `2i` (x) and `2i + 1` (y).  Every spring scatters
//! its 4-vector gradient and 4×4 Hessian onto the unknowns of its two
//! endpoints; every pin scatters a 2-vector and a 2×2 block.  Contributions
//! are additive, so a node shared by several springs receives the sum.

use crate::element::{Pin, SpringCoefficients, SpringElement};
use crate::types::{check_len, HessianStorage, SpringError};
use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};
use ndarray::Array2;
use sprs::{CsMat, TriMat};

// ─────────────────────────────────────────────────────────────
//  Objective trait  (the contract the solvers are written against)
// ─────────────────────────────────────────────────────────────

/// Smooth scalar function of `n_unknowns()` variables with a sparse Hessian.
///
/// Implementations must be pure: repeated evaluation at the same `x`
/// yields identical results.
pub trait Objective {
    fn n_unknowns(&self) -> usize;

    fn eval_energy(&self, x: &[f64]) -> Result<f64, SpringError>;

    /// Overwrite `g` with the gradient at `x`.
    fn eval_gradient(&self, x: &[f64], g: &mut [f64]) -> Result<(), SpringError>;

    /// Overwrite `h` with the (symmetric, CSC) Hessian at `x`.
    fn eval_hessian(&self, x: &[f64], h: &mut CsMat<f64>) -> Result<(), SpringError>;
}

impl<O: Objective + ?Sized> Objective for &O {
    fn n_unknowns(&self) -> usize {
        (**self).n_unknowns()
    }

    fn eval_energy(&self, x: &[f64]) -> Result<f64, SpringError> {
        (**self).eval_energy(x)
    }

    fn eval_gradient(&self, x: &[f64], g: &mut [f64]) -> Result<(), SpringError> {
        (**self).eval_gradient(x, g)
    }

    fn eval_hessian(&self, x: &[f64], h: &mut CsMat<f64>) -> Result<(), SpringError> {
        (**self).eval_hessian(x, h)
    }
}

// ─────────────────────────────────────────────────────────────
//  Problem definition
// ─────────────────────────────────────────────────────────────

/// One spring between nodes `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub coeffs: SpringCoefficients,
}

/// A global Hessian in whichever storage the problem assembles.
#[derive(Debug, Clone)]
pub enum Hessian {
    Dense(Array2<f64>),
    Sparse(CsMat<f64>),
}

impl Hessian {
    pub fn storage(&self) -> HessianStorage {
        match self {
            Self::Dense(_) => HessianStorage::Dense,
            Self::Sparse(_) => HessianStorage::Sparse,
        }
    }

    /// Entry `(row, col)`; structural zeros of the sparse form read as 0.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self {
            Self::Dense(m) => m[[row, col]],
            Self::Sparse(m) => m.get(row, col).copied().unwrap_or(0.0),
        }
    }

    /// Frobenius norm.
    pub fn norm(&self) -> f64 {
        let sum_sq: f64 = match self {
            Self::Dense(m) => m.iter().map(|v| v * v).sum(),
            Self::Sparse(m) => m.data().iter().map(|v| v * v).sum(),
        };
        sum_sq.sqrt()
    }
}

/// Mass-spring network objective over all node coordinates.
///
/// The element variant and the Hessian storage are fixed at construction.
/// Springs and pins are validated when added; evaluation never fails on
/// topology, only on vector sizes.
#[derive(Debug, Clone)]
pub struct MassSpringProblem {
    element: SpringElement,
    storage: HessianStorage,
    n_nodes: usize,
    springs: Vec<Spring>,
    pins: Vec<Pin>,
}

impl MassSpringProblem {
    pub fn new(element: SpringElement, n_nodes: usize, storage: HessianStorage) -> Self {
        Self {
            element,
            storage,
            n_nodes,
            springs: Vec::new(),
            pins: Vec::new(),
        }
    }

    /// Sparse-storage problem; what the Newton solvers expect.
    pub fn sparse(element: SpringElement, n_nodes: usize) -> Self {
        Self::new(element, n_nodes, HessianStorage::Sparse)
    }

    fn check_node(&self, index: usize) -> Result<(), SpringError> {
        if index >= self.n_nodes {
            return Err(SpringError::IndexOutOfRange {
                index,
                n_nodes: self.n_nodes,
            });
        }
        Ok(())
    }

    /// Add a spring between nodes `a` and `b`.
    pub fn add_element(&mut self, a: usize, b: usize, stiffness: f64, rest_length: f64) -> Result<(), SpringError> {
        self.check_node(a)?;
        self.check_node(b)?;
        self.springs.push(Spring {
            a,
            b,
            coeffs: SpringCoefficients::new(stiffness, rest_length),
        });
        Ok(())
    }

    /// Pin `node` towards `(target_x, target_y)` with penalty weight `weight`.
    pub fn add_constraint(&mut self, node: usize, weight: f64, target_x: f64, target_y: f64) -> Result<(), SpringError> {
        self.check_node(node)?;
        self.pins.push(Pin {
            node,
            weight,
            target: Vector2::new(target_x, target_y),
        });
        Ok(())
    }

    pub fn element(&self) -> SpringElement {
        self.element
    }

    pub fn storage(&self) -> HessianStorage {
        self.storage
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn n_elements(&self) -> usize {
        self.springs.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.pins.len()
    }

    pub fn elements(&self) -> &[Spring] {
        &self.springs
    }

    pub fn constraints(&self) -> &[Pin] {
        &self.pins
    }

    // ── Assembly ───────────────────────────────────────────

    /// Dense Hessian at `x`.  Requires [`HessianStorage::Dense`].
    pub fn eval_dense_hessian(&self, x: &[f64], h: &mut Array2<f64>) -> Result<(), SpringError> {
        self.require_storage(HessianStorage::Dense)?;
        check_len(2 * self.n_nodes, x.len())?;
        let n = 2 * self.n_nodes;
        if h.dim() != (n, n) {
            *h = Array2::zeros((n, n));
        } else {
            h.fill(0.0);
        }
        self.scatter_hessian(x, |row, col, v| h[[row, col]] += v);
        Ok(())
    }

    /// Hessian at `x` in this problem's own storage.
    pub fn assemble_hessian(&self, x: &[f64]) -> Result<Hessian, SpringError> {
        let n = 2 * self.n_nodes;
        match self.storage {
            HessianStorage::Dense => {
                let mut h = Array2::zeros((n, n));
                self.eval_dense_hessian(x, &mut h)?;
                Ok(Hessian::Dense(h))
            }
            HessianStorage::Sparse => {
                let mut h = CsMat::zero((n, n));
                self.eval_hessian(x, &mut h)?;
                Ok(Hessian::Sparse(h))
            }
        }
    }

    fn require_storage(&self, expected: HessianStorage) -> Result<(), SpringError> {
        if self.storage != expected {
            return Err(SpringError::StorageMismatch {
                expected,
                found: self.storage,
            });
        }
        Ok(())
    }

    /// Feed every local Hessian entry to `add(row, col, value)` at its
    /// global position.
    fn scatter_hessian(&self, x: &[f64], mut add: impl FnMut(usize, usize, f64)) {
        for spring in &self.springs {
            let h: Matrix4<f64> = self.element.eval_hessian(&local_positions(x, spring), &spring.coeffs);
            let idx = global_indices(spring);
            for (i, &row) in idx.iter().enumerate() {
                for (j, &col) in idx.iter().enumerate() {
                    add(row, col, h[(i, j)]);
                }
            }
        }
        for pin in &self.pins {
            let h: Matrix2<f64> = pin.eval_hessian();
            let base = 2 * pin.node;
            for i in 0..2 {
                for j in 0..2 {
                    add(base + i, base + j, h[(i, j)]);
                }
            }
        }
    }
}

impl Objective for MassSpringProblem {
    fn n_unknowns(&self) -> usize {
        2 * self.n_nodes
    }

    fn eval_energy(&self, x: &[f64]) -> Result<f64, SpringError> {
        check_len(self.n_unknowns(), x.len())?;
        let mut energy = 0.0;
        for spring in &self.springs {
            energy += self.element.eval_energy(&local_positions(x, spring), &spring.coeffs);
        }
        for pin in &self.pins {
            energy += pin.eval_energy(&node_position(x, pin.node));
        }
        Ok(energy)
    }

    fn eval_gradient(&self, x: &[f64], g: &mut [f64]) -> Result<(), SpringError> {
        check_len(self.n_unknowns(), x.len())?;
        check_len(self.n_unknowns(), g.len())?;
        g.fill(0.0);
        for spring in &self.springs {
            let local: Vector4<f64> = self.element.eval_gradient(&local_positions(x, spring), &spring.coeffs);
            for (i, &row) in global_indices(spring).iter().enumerate() {
                g[row] += local[i];
            }
        }
        for pin in &self.pins {
            let local = pin.eval_gradient(&node_position(x, pin.node));
            g[2 * pin.node] += local.x;
            g[2 * pin.node + 1] += local.y;
        }
        Ok(())
    }

    /// Triplet accumulation compressed to CSC.  Duplicate `(row, col)`
    /// entries from shared nodes are summed by the compression.
    fn eval_hessian(&self, x: &[f64], h: &mut CsMat<f64>) -> Result<(), SpringError> {
        self.require_storage(HessianStorage::Sparse)?;
        check_len(self.n_unknowns(), x.len())?;
        let n = self.n_unknowns();
        let nnz = 16 * self.springs.len() + 4 * self.pins.len();
        let mut tri = TriMat::with_capacity((n, n), nnz);
        self.scatter_hessian(x, |row, col, v| tri.add_triplet(row, col, v));
        *h = tri.to_csc();
        Ok(())
    }
}

#[inline]
fn node_position(x: &[f64], node: usize) -> Vector2<f64> {
    Vector2::new(x[2 * node], x[2 * node + 1])
}

#[inline]
fn local_positions(x: &[f64], spring: &Spring) -> Vector4<f64> {
    Vector4::new(x[2 * spring.a], x[2 * spring.a + 1], x[2 * spring.b], x[2 * spring.b + 1])
}

#[inline]
fn global_indices(spring: &Spring) -> [usize; 4] {
    [2 * spring.a, 2 * spring.a + 1, 2 * spring.b, 2 * spring.b + 1]
}
