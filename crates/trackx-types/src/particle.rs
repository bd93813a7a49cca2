// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Particle Hypotheses
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Particle hypotheses and propagation direction.

use crate::constants::{
    ELECTRON_MASS_MEV, KAON_MASS_MEV, MUON_MASS_MEV, PION_MASS_MEV, PROTON_MASS_MEV,
};
use serde::{Deserialize, Serialize};

/// Mass/interaction hypothesis used by the propagation and material ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleHypothesis {
    /// Massless test particle: material is recorded but never alters the track.
    Geantino,
    /// Material is neither applied nor recorded.
    NonInteracting,
    Electron,
    Muon,
    Pion,
    Kaon,
    Proton,
}

impl ParticleHypothesis {
    /// Rest mass [MeV].
    pub fn mass_mev(&self) -> f64 {
        match self {
            ParticleHypothesis::Geantino | ParticleHypothesis::NonInteracting => 0.0,
            ParticleHypothesis::Electron => ELECTRON_MASS_MEV,
            ParticleHypothesis::Muon => MUON_MASS_MEV,
            ParticleHypothesis::Pion => PION_MASS_MEV,
            ParticleHypothesis::Kaon => KAON_MASS_MEV,
            ParticleHypothesis::Proton => PROTON_MASS_MEV,
        }
    }

    pub fn interacts(&self) -> bool {
        !matches!(
            self,
            ParticleHypothesis::Geantino | ParticleHypothesis::NonInteracting
        )
    }

    /// Relativistic β for a momentum [MeV]; 1 for massless hypotheses.
    pub fn beta(&self, momentum_mev: f64) -> f64 {
        let m = self.mass_mev();
        if m <= 0.0 {
            return 1.0;
        }
        momentum_mev / (momentum_mev * momentum_mev + m * m).sqrt()
    }

    /// Total energy [MeV].
    pub fn energy(&self, momentum_mev: f64) -> f64 {
        let m = self.mass_mev();
        (momentum_mev * momentum_mev + m * m).sqrt()
    }
}

/// Propagation direction relative to the momentum.
///
/// `Either` is only meaningful as a request; the engine resolves it to
/// `Forward` or `Backward` once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
    Either,
}

impl Direction {
    /// +1 / -1 for resolved directions, `None` for `Either`.
    pub fn sign(&self) -> Option<f64> {
        match self {
            Direction::Forward => Some(1.0),
            Direction::Backward => Some(-1.0),
            Direction::Either => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Direction::Either)
    }

    pub fn from_sign(value: f64) -> Direction {
        if value < 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    pub fn reversed(&self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
            Direction::Either => Direction::Either,
        }
    }
}
