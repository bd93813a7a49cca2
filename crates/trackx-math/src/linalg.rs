// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Linear Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Linear algebra utilities for track covariance matrices.
//!
//! Covariances are dense square `Array2<f64>`; the engine uses the 5x5
//! layout (loc0, loc1, phi, theta, q/p).

use ndarray::Array2;

/// Similarity transform J·C·Jᵀ, used for covariance transport.
///
/// Panics if the shapes are incompatible (caller bug, not a runtime input).
pub fn similarity(jacobian: &Array2<f64>, covariance: &Array2<f64>) -> Array2<f64> {
    let tmp = jacobian.dot(covariance);
    let mut out = tmp.dot(&jacobian.t());
    symmetrize(&mut out);
    out
}

/// Replace C by (C + Cᵀ)/2 to remove round-off asymmetry.
pub fn symmetrize(c: &mut Array2<f64>) {
    let n = c.nrows().min(c.ncols());
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (c[[i, j]] + c[[j, i]]);
            c[[i, j]] = avg;
            c[[j, i]] = avg;
        }
    }
}

/// True when C is square and symmetric within `tol` (absolute).
pub fn is_symmetric(c: &Array2<f64>, tol: f64) -> bool {
    let (m, n) = c.dim();
    if m != n {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if (c[[i, j]] - c[[j, i]]).abs() > tol {
                return false;
            }
        }
    }
    true
}

/// A valid covariance has finite entries and a non-negative diagonal.
pub fn is_valid_covariance(c: &Array2<f64>, tol: f64) -> bool {
    if c.iter().any(|v| !v.is_finite()) {
        return false;
    }
    if !is_symmetric(c, tol) {
        return false;
    }
    (0..c.nrows()).all(|i| c[[i, i]] >= 0.0)
}

/// Add `value` to the diagonal element `idx`, clamping at zero from below.
pub fn add_to_diagonal(c: &mut Array2<f64>, idx: usize, value: f64) {
    if idx < c.nrows() && idx < c.ncols() {
        c[[idx, idx]] = (c[[idx, idx]] + value).max(0.0);
    }
}
