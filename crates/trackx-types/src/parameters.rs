// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Track Parameters
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Immutable track state: position, unit direction, momentum magnitude,
//! charge, associated surface and optional 5x5 covariance.
//!
//! Every update produces a new value; nothing mutates a state in place.

use crate::constants::N_TRACK_PARAMETERS;
use crate::error::{ExtrapolationError, ExtrapolationResult};
use crate::ids::SurfaceId;
use ndarray::Array2;
use trackx_math::linalg::is_valid_covariance;
use trackx_math::Vector3;

const COVARIANCE_SYMMETRY_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackParameters {
    position: Vector3,
    direction: Vector3,
    momentum: f64,
    charge: f64,
    surface: Option<SurfaceId>,
    covariance: Option<Array2<f64>>,
}

impl TrackParameters {
    /// Free parameters at `position` [mm] moving along `direction` with
    /// momentum magnitude `momentum` [MeV] and `charge` [e].
    pub fn new(
        position: Vector3,
        direction: Vector3,
        momentum: f64,
        charge: f64,
    ) -> ExtrapolationResult<Self> {
        if !position.is_finite() {
            return Err(ExtrapolationError::InvalidParameters(
                "position components must be finite".to_string(),
            ));
        }
        let direction = direction.normalized().ok_or_else(|| {
            ExtrapolationError::InvalidParameters(
                "direction must be finite and non-null".to_string(),
            )
        })?;
        if !momentum.is_finite() || momentum <= 0.0 {
            return Err(ExtrapolationError::InvalidParameters(
                "momentum must be finite and > 0".to_string(),
            ));
        }
        if !charge.is_finite() {
            return Err(ExtrapolationError::InvalidParameters(
                "charge must be finite".to_string(),
            ));
        }
        Ok(TrackParameters {
            position,
            direction,
            momentum,
            charge,
            surface: None,
            covariance: None,
        })
    }

    /// Attach a 5x5 covariance (loc0, loc1, phi, theta, q/p).
    pub fn with_covariance(self, covariance: Array2<f64>) -> ExtrapolationResult<Self> {
        if covariance.dim() != (N_TRACK_PARAMETERS, N_TRACK_PARAMETERS) {
            return Err(ExtrapolationError::InvalidParameters(format!(
                "covariance must be {n}x{n}, got {:?}",
                covariance.dim(),
                n = N_TRACK_PARAMETERS
            )));
        }
        if !is_valid_covariance(&covariance, COVARIANCE_SYMMETRY_TOL) {
            return Err(ExtrapolationError::InvalidParameters(
                "covariance must be finite, symmetric, with non-negative diagonal".to_string(),
            ));
        }
        Ok(TrackParameters {
            covariance: Some(covariance),
            ..self
        })
    }

    /// Same state expressed on surface `surface`.
    pub fn on_surface(self, surface: SurfaceId) -> Self {
        TrackParameters {
            surface: Some(surface),
            ..self
        }
    }

    /// New state after transport to `position` with `direction`.
    ///
    /// Non-finite inputs keep the previous value of that component.
    pub fn transported(
        &self,
        position: Vector3,
        direction: Vector3,
        surface: Option<SurfaceId>,
        covariance: Option<Array2<f64>>,
    ) -> Self {
        TrackParameters {
            position: if position.is_finite() {
                position
            } else {
                self.position
            },
            direction: direction.normalized().unwrap_or(self.direction),
            momentum: self.momentum,
            charge: self.charge,
            surface,
            covariance,
        }
    }

    /// New state with a changed momentum magnitude and covariance.
    pub fn with_momentum(&self, momentum: f64, covariance: Option<Array2<f64>>) -> Self {
        TrackParameters {
            momentum: if momentum.is_finite() && momentum > 0.0 {
                momentum
            } else {
                self.momentum
            },
            covariance,
            ..self.clone()
        }
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn direction(&self) -> Vector3 {
        self.direction
    }

    /// Momentum magnitude [MeV].
    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn covariance(&self) -> Option<&Array2<f64>> {
        self.covariance.as_ref()
    }

    pub fn momentum_vector(&self) -> Vector3 {
        self.direction * self.momentum
    }

    /// q/p [1/MeV]; neutral states use 1/p.
    pub fn q_over_p(&self) -> f64 {
        if self.charge == 0.0 {
            1.0 / self.momentum
        } else {
            self.charge / self.momentum
        }
    }

    pub fn theta(&self) -> f64 {
        self.direction.theta()
    }

    pub fn phi(&self) -> f64 {
        self.direction.phi()
    }

    /// Position and direction agree within `tol` and momenta within `tol`
    /// relative.
    pub fn approx_eq(&self, other: &TrackParameters, tol: f64) -> bool {
        self.position.distance(other.position) <= tol
            && self.direction.distance(other.direction) <= tol
            && (self.momentum - other.momentum).abs() <= tol * self.momentum.max(1.0)
            && self.charge == other.charge
    }
}
