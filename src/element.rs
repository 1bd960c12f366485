//! Local spring and pin potentials with hand-coded derivatives.
//!
//! A spring couples two 2D nodes.  Its local unknown vector is
//! `[x_a, y_a, x_b, y_b]`, so every spring yields a scalar energy, a
//! 4-vector gradient and a 4×4 Hessian.  All derivatives are analytic.
//!
//! With `d = p_a − p_b`, `L = ‖d‖`, stiffness `k` and rest length `l`:
//!
//!   WithoutLength:  E = ½ k L²         ∇_d E = k d
//!   WithLength:     E = ½ k (L − l)²   ∇_d E = k (L − l) d / L
//!
//! Both Hessians have the block pattern `[[B, −B], [−B, B]]` with `B` the
//! 2×2 second derivative w.r.t. `d`.

use crate::types::{SpringError, PSD_EIGENVALUE_FLOOR};
use nalgebra::{Matrix2, Matrix4, SymmetricEigen, Vector2, Vector4};

/// Below this separation the with-length spring is treated as collapsed.
const COLLAPSED_LENGTH: f64 = 1e-12;

// ─────────────────────────────────────────────────────────────
//  Coefficients
// ─────────────────────────────────────────────────────────────

/// Per-spring coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringCoefficients {
    pub stiffness: f64,
    /// Ignored by [`SpringElement::WithoutLength`].
    pub rest_length: f64,
}

impl SpringCoefficients {
    pub fn new(stiffness: f64, rest_length: f64) -> Self {
        Self { stiffness, rest_length }
    }
}

// ─────────────────────────────────────────────────────────────
//  Spring element variants
// ─────────────────────────────────────────────────────────────

/// The closed set of spring potentials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpringElement {
    /// `½ k ‖p_a − p_b‖²`.  Convex.
    WithoutLength,
    /// `½ k (‖p_a − p_b‖ − l)²`.  Hessian is indefinite for compressed springs.
    WithLength,
    /// `WithLength` energy and gradient, Hessian projected so that every
    /// eigenvalue is at least `eigenvalue_floor`.
    WithLengthPsd { eigenvalue_floor: f64 },
}

impl SpringElement {
    /// PSD-projected variant with the default floor [`PSD_EIGENVALUE_FLOOR`].
    pub fn with_length_psd() -> Self {
        Self::WithLengthPsd {
            eigenvalue_floor: PSD_EIGENVALUE_FLOOR,
        }
    }

    /// Map the legacy numeric selector (0, 1, 2) onto a variant.
    pub fn from_index(index: usize) -> Result<Self, SpringError> {
        match index {
            0 => Ok(Self::WithoutLength),
            1 => Ok(Self::WithLength),
            2 => Ok(Self::with_length_psd()),
            _ => Err(SpringError::InvalidOption(format!(
                "spring element index must be 0, 1 or 2, got {index}"
            ))),
        }
    }

    pub fn eval_energy(&self, x: &Vector4<f64>, coeffs: &SpringCoefficients) -> f64 {
        let d = separation(x);
        let k = coeffs.stiffness;
        match self {
            Self::WithoutLength => 0.5 * k * d.norm_squared(),
            Self::WithLength | Self::WithLengthPsd { .. } => {
                let stretch = d.norm() - coeffs.rest_length;
                0.5 * k * stretch * stretch
            }
        }
    }

    pub fn eval_gradient(&self, x: &Vector4<f64>, coeffs: &SpringCoefficients) -> Vector4<f64> {
        let d = separation(x);
        let k = coeffs.stiffness;
        let gd = match self {
            Self::WithoutLength => d * k,
            Self::WithLength | Self::WithLengthPsd { .. } => {
                let len = d.norm();
                if len < COLLAPSED_LENGTH {
                    Vector2::zeros()
                } else {
                    d * (k * (len - coeffs.rest_length) / len)
                }
            }
        };
        Vector4::new(gd.x, gd.y, -gd.x, -gd.y)
    }

    pub fn eval_hessian(&self, x: &Vector4<f64>, coeffs: &SpringCoefficients) -> Matrix4<f64> {
        let d = separation(x);
        let k = coeffs.stiffness;
        match self {
            Self::WithoutLength => expand_block(&(Matrix2::identity() * k)),
            Self::WithLength => expand_block(&with_length_block(&d, coeffs)),
            Self::WithLengthPsd { eigenvalue_floor } => {
                let exact = expand_block(&with_length_block(&d, coeffs));
                project_psd(&exact, *eigenvalue_floor)
            }
        }
    }
}

#[inline]
fn separation(x: &Vector4<f64>) -> Vector2<f64> {
    Vector2::new(x[0] - x[2], x[1] - x[3])
}

/// `B = k [ (1 − l/L) I + (l/L) d dᵀ / L² ]`, the second derivative of
/// `½ k (‖d‖ − l)²` w.r.t. `d`.
///
/// A collapsed spring (`L ≈ 0`) has no well-defined curvature; its block is
/// zero and the solver's factorization check deals with it.
fn with_length_block(d: &Vector2<f64>, coeffs: &SpringCoefficients) -> Matrix2<f64> {
    let len = d.norm();
    if len < COLLAPSED_LENGTH {
        return Matrix2::zeros();
    }
    let k = coeffs.stiffness;
    let ratio = coeffs.rest_length / len;
    let unit = d / len;
    (Matrix2::identity() * (1.0 - ratio) + unit * unit.transpose() * ratio) * k
}

/// `[[B, −B], [−B, B]]`
fn expand_block(b: &Matrix2<f64>) -> Matrix4<f64> {
    let mut h = Matrix4::zeros();
    h.fixed_view_mut::<2, 2>(0, 0).copy_from(b);
    h.fixed_view_mut::<2, 2>(2, 2).copy_from(b);
    h.fixed_view_mut::<2, 2>(0, 2).copy_from(&(-b));
    h.fixed_view_mut::<2, 2>(2, 0).copy_from(&(-b));
    h
}

// ─────────────────────────────────────────────────────────────
//  PSD projection
// ─────────────────────────────────────────────────────────────

/// Raise every eigenvalue of the symmetric matrix `h` to at least `floor`
/// and recompose `V diag(λ) Vᵀ`.
///
/// Matrices whose spectrum already sits at or above `floor` are returned
/// unchanged.
pub fn project_psd(h: &Matrix4<f64>, floor: f64) -> Matrix4<f64> {
    let mut eigen = SymmetricEigen::new(*h);
    if eigen.eigenvalues.iter().all(|&ev| ev >= floor) {
        return *h;
    }
    for ev in eigen.eigenvalues.iter_mut() {
        if *ev < floor {
            *ev = floor;
        }
    }
    let recomposed = eigen.recompose();
    // Round-off in V diag(λ) Vᵀ leaves a tiny skew part.
    (recomposed + recomposed.transpose()) * 0.5
}

// ─────────────────────────────────────────────────────────────
//  Pin penalty
// ─────────────────────────────────────────────────────────────

/// Quadratic penalty `½ w ‖p − t‖²` pulling one node towards a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pin {
    pub node: usize,
    pub weight: f64,
    pub target: Vector2<f64>,
}

impl Pin {
    pub fn eval_energy(&self, p: &Vector2<f64>) -> f64 {
        0.5 * self.weight * (p - self.target).norm_squared()
    }

    pub fn eval_gradient(&self, p: &Vector2<f64>) -> Vector2<f64> {
        (p - self.target) * self.weight
    }

    /// Constant `w I`.
    pub fn eval_hessian(&self) -> Matrix2<f64> {
        Matrix2::identity() * self.weight
    }
}
