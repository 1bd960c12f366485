//! Element-level tests: closed-form values of the spring potentials and the
//! properties of the PSD projection.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Matrix4, SymmetricEigen, Vector2, Vector4};
use springnet::element::{project_psd, Pin, SpringCoefficients, SpringElement};
use springnet::types::{SpringError, PSD_EIGENVALUE_FLOOR};

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

fn min_eigenvalue(m: &Matrix4<f64>) -> f64 {
    SymmetricEigen::new(*m).eigenvalues.min()
}

/// Deterministic symmetric 4×4 matrix with entries in [-2, 2].
fn symmetric_matrix(seed: u64) -> Matrix4<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) * 4.0 - 2.0
    };
    let mut m = Matrix4::zeros();
    for i in 0..4 {
        for j in i..4 {
            let v = next();
            m[(i, j)] = v;
            m[(j, i)] = v;
        }
    }
    m
}

// ─────────────────────────────────────────────────────────────
//  Spring without rest length
// ─────────────────────────────────────────────────────────────

#[test]
fn unit_spring_without_length() {
    let x = Vector4::new(0.0, 0.0, 1.0, 0.0);
    let c = SpringCoefficients::new(1.0, 0.0);
    let e = SpringElement::WithoutLength;

    assert_relative_eq!(e.eval_energy(&x, &c), 0.5);
    assert_eq!(e.eval_gradient(&x, &c), Vector4::new(-1.0, 0.0, 1.0, 0.0));

    // k [[I, -I], [-I, I]]; the y rows carry the same pattern as x
    let h = e.eval_hessian(&x, &c);
    #[rustfmt::skip]
    let expected = Matrix4::new(
         1.0,  0.0, -1.0,  0.0,
         0.0,  1.0,  0.0, -1.0,
        -1.0,  0.0,  1.0,  0.0,
         0.0, -1.0,  0.0,  1.0,
    );
    assert_eq!(h, expected);
}

#[test]
fn spring_without_length_ignores_rest_length() {
    let x = Vector4::new(0.5, -1.0, 2.0, 3.0);
    let e = SpringElement::WithoutLength;
    let a = SpringCoefficients::new(2.0, 0.0);
    let b = SpringCoefficients::new(2.0, 7.0);
    assert_eq!(e.eval_energy(&x, &a), e.eval_energy(&x, &b));
    assert_eq!(e.eval_gradient(&x, &a), e.eval_gradient(&x, &b));
    assert_eq!(e.eval_hessian(&x, &a), e.eval_hessian(&x, &b));
}

// ─────────────────────────────────────────────────────────────
//  Spring with rest length
// ─────────────────────────────────────────────────────────────

#[test]
fn spring_with_length_at_rest_is_stationary() {
    let c = SpringCoefficients::new(1.0, 1.0);
    let e = SpringElement::WithLength;
    for x in [
        Vector4::new(0.0, 0.0, 1.0, 0.0),
        Vector4::new(2.0, 3.0, 2.0, 4.0),
        Vector4::new(0.0, 0.0, 0.6, 0.8),
    ] {
        assert_abs_diff_eq!(e.eval_energy(&x, &c), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(e.eval_gradient(&x, &c).norm(), 0.0, epsilon = 1e-15);
    }
}

#[test]
fn spring_with_length_at_rest_hessian_pattern() {
    // At L = l only the axial direction is stiff: B = u uᵀ with u = e_x.
    let x = Vector4::new(0.0, 0.0, 1.0, 0.0);
    let h = SpringElement::WithLength.eval_hessian(&x, &SpringCoefficients::new(1.0, 1.0));
    #[rustfmt::skip]
    let expected = Matrix4::new(
         1.0, 0.0, -1.0, 0.0,
         0.0, 0.0,  0.0, 0.0,
        -1.0, 0.0,  1.0, 0.0,
         0.0, 0.0,  0.0, 0.0,
    );
    assert_eq!(h, expected);
}

#[test]
fn stretched_spring_with_length() {
    // L = 2, l = 1:  E = ½,  ∇ = [-1, 0, 1, 0],  B = diag(1, ½)
    let x = Vector4::new(0.0, 0.0, 2.0, 0.0);
    let c = SpringCoefficients::new(1.0, 1.0);
    let e = SpringElement::WithLength;

    assert_relative_eq!(e.eval_energy(&x, &c), 0.5);
    let g = e.eval_gradient(&x, &c);
    assert_relative_eq!(g, Vector4::new(-1.0, 0.0, 1.0, 0.0), epsilon = 1e-15);

    let h = e.eval_hessian(&x, &c);
    assert_relative_eq!(h[(0, 0)], 1.0, epsilon = 1e-15);
    assert_relative_eq!(h[(1, 1)], 0.5, epsilon = 1e-15);
    assert_relative_eq!(h[(0, 2)], -1.0, epsilon = 1e-15);
    assert_relative_eq!(h[(1, 3)], -0.5, epsilon = 1e-15);
    assert_abs_diff_eq!(h[(0, 1)], 0.0, epsilon = 1e-15);
}

#[test]
fn compressed_spring_hessian_is_indefinite() {
    // L = ½, l = 1:  B = diag(1, −1), so H has eigenvalues {2, −2, 0, 0}
    let x = Vector4::new(0.0, 0.0, 0.5, 0.0);
    let c = SpringCoefficients::new(1.0, 1.0);
    let h = SpringElement::WithLength.eval_hessian(&x, &c);
    assert_relative_eq!(min_eigenvalue(&h), -2.0, epsilon = 1e-12);
    assert_relative_eq!(SymmetricEigen::new(h).eigenvalues.max(), 2.0, epsilon = 1e-12);
}

#[test]
fn collapsed_spring_has_zero_derivatives() {
    let x = Vector4::new(1.0, 1.0, 1.0, 1.0);
    let c = SpringCoefficients::new(3.0, 2.0);
    let e = SpringElement::WithLength;
    assert_relative_eq!(e.eval_energy(&x, &c), 6.0);
    assert_eq!(e.eval_gradient(&x, &c), Vector4::zeros());
    assert_eq!(e.eval_hessian(&x, &c), Matrix4::zeros());
}

// ─────────────────────────────────────────────────────────────
//  PSD-projected variant
// ─────────────────────────────────────────────────────────────

#[test]
fn psd_variant_shares_energy_and_gradient() {
    let c = SpringCoefficients::new(2.5, 1.2);
    let exact = SpringElement::WithLength;
    let psd = SpringElement::with_length_psd();
    for x in [
        Vector4::new(0.0, 0.0, 0.3, 0.1),
        Vector4::new(-1.0, 2.0, 1.5, 0.5),
        Vector4::new(0.2, 0.2, 0.2, 1.4),
    ] {
        assert_eq!(exact.eval_energy(&x, &c), psd.eval_energy(&x, &c));
        assert_eq!(exact.eval_gradient(&x, &c), psd.eval_gradient(&x, &c));
    }
}

#[test]
fn psd_variant_hessian_respects_floor() {
    let x = Vector4::new(0.0, 0.0, 0.5, 0.0);
    let c = SpringCoefficients::new(1.0, 1.0);
    let h = SpringElement::with_length_psd().eval_hessian(&x, &c);

    assert_eq!(h, h.transpose());
    assert!(min_eigenvalue(&h) >= PSD_EIGENVALUE_FLOOR - 1e-12);
    // the positive mode survives
    assert_relative_eq!(SymmetricEigen::new(h).eigenvalues.max(), 2.0, epsilon = 1e-12);
}

#[test]
fn psd_variant_uses_configured_floor() {
    let x = Vector4::new(0.0, 0.0, 0.5, 0.0);
    let c = SpringCoefficients::new(1.0, 1.0);
    let h = SpringElement::WithLengthPsd { eigenvalue_floor: 0.25 }.eval_hessian(&x, &c);
    assert_relative_eq!(min_eigenvalue(&h), 0.25, epsilon = 1e-12);
}

#[test]
fn projection_of_indefinite_matrices() {
    let floor = PSD_EIGENVALUE_FLOOR;
    let mut indefinite_seen = 0;
    for seed in 0..50 {
        let m = symmetric_matrix(seed);
        if min_eigenvalue(&m) < 0.0 {
            indefinite_seen += 1;
        }
        let p = project_psd(&m, floor);
        assert_eq!(p, p.transpose(), "seed {seed}: projection is not symmetric");
        assert!(
            min_eigenvalue(&p) >= floor - 1e-12,
            "seed {seed}: min eigenvalue {} below floor",
            min_eigenvalue(&p)
        );
    }
    assert!(indefinite_seen > 0);
}

#[test]
fn projection_keeps_positive_definite_input() {
    #[rustfmt::skip]
    let m = Matrix4::new(
        4.0, 1.0, 0.0, 0.5,
        1.0, 3.0, 0.2, 0.0,
        0.0, 0.2, 2.0, 0.1,
        0.5, 0.0, 0.1, 1.0,
    );
    assert!(min_eigenvalue(&m) > PSD_EIGENVALUE_FLOOR);
    assert_eq!(project_psd(&m, PSD_EIGENVALUE_FLOOR), m);
}

#[test]
fn projection_lifts_semidefinite_null_space() {
    // The no-length Hessian is PSD with a two-dimensional null space.
    let h = SpringElement::WithoutLength.eval_hessian(&Vector4::new(0.0, 0.0, 1.0, 0.0), &SpringCoefficients::new(1.0, 0.0));
    let p = project_psd(&h, 1e-3);
    assert_relative_eq!(min_eigenvalue(&p), 1e-3, epsilon = 1e-12);
    assert_relative_eq!(SymmetricEigen::new(p).eigenvalues.max(), 2.0, epsilon = 1e-12);
}

// ─────────────────────────────────────────────────────────────
//  Pins and variant selection
// ─────────────────────────────────────────────────────────────

#[test]
fn pin_penalty_derivatives() {
    let pin = Pin {
        node: 0,
        weight: 4.0,
        target: Vector2::new(1.0, -1.0),
    };
    let p = Vector2::new(2.0, 1.0);
    assert_relative_eq!(pin.eval_energy(&p), 0.5 * 4.0 * 5.0);
    assert_eq!(pin.eval_gradient(&p), Vector2::new(4.0, 8.0));
    assert_eq!(pin.eval_hessian()[(0, 0)], 4.0);
    assert_eq!(pin.eval_hessian()[(0, 1)], 0.0);
}

#[test]
fn element_from_index() {
    assert_eq!(SpringElement::from_index(0).unwrap(), SpringElement::WithoutLength);
    assert_eq!(SpringElement::from_index(1).unwrap(), SpringElement::WithLength);
    assert_eq!(SpringElement::from_index(2).unwrap(), SpringElement::with_length_psd());
    assert!(matches!(SpringElement::from_index(3), Err(SpringError::InvalidOption(_))));
}
