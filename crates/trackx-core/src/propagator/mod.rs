// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Propagation Port
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Propagation port: advance a state onto the first of several candidate
//! surfaces.
//!
//! Candidates are tagged with what they are (`TargetKind`) so the caller
//! never decodes a flat index into boundaries, layers and destination.

pub mod stepper;
pub mod straight_line;

pub use stepper::HelixStepper;
pub use straight_line::StraightLinePropagator;

use ndarray::Array2;
use trackx_geometry::{BoundaryFace, Surface};
use trackx_math::linalg::similarity;
use trackx_types::config::FieldMode;
use trackx_types::constants::{IDX_PHI, IDX_THETA, N_TRACK_PARAMETERS};
use trackx_types::ids::{LayerId, VolumeId};
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

/// Path lengths closer than this to zero are the surface the state
/// already sits on [mm].
pub const ON_SURFACE_EPS_MM: f64 = 1e-6;

/// Hits within this path window of the first one are reported together [mm].
pub const COINCIDENCE_MM: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Destination,
    /// Boundary `face` of static volume `volume`.
    Boundary { volume: VolumeId, face: BoundaryFace },
    /// Boundary of a dense detached volume.
    DenseBoundary { volume: VolumeId, face: BoundaryFace },
    Layer(LayerId),
    Sensitive { layer: LayerId, index: usize },
}

/// One candidate surface of a multi-target propagation.
#[derive(Debug, Clone, Copy)]
pub struct PropagationTarget<'a> {
    pub surface: &'a Surface,
    pub kind: TargetKind,
    /// Only intersections within the surface bounds count.
    pub bounds_check: bool,
}

impl<'a> PropagationTarget<'a> {
    pub fn new(surface: &'a Surface, kind: TargetKind, bounds_check: bool) -> Self {
        PropagationTarget {
            surface,
            kind,
            bounds_check,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropagationResult {
    /// State on the surface of the first hit.
    pub parameters: TrackParameters,
    /// Every target hit at the same point; `Destination` first when present.
    pub hits: Vec<TargetKind>,
    /// Signed path length; negative when propagated backward.
    pub path_length: f64,
}

impl PropagationResult {
    pub fn hit_destination(&self) -> bool {
        self.hits.contains(&TargetKind::Destination)
    }

    /// The hit the result is expressed on.
    pub fn primary(&self) -> Option<TargetKind> {
        self.hits.first().copied()
    }
}

pub trait Propagator {
    /// Propagate onto the closest valid intersection among `targets`.
    /// `None` when no target can be reached.
    fn propagate(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
        field: &FieldMode,
        particle: ParticleHypothesis,
        volume: Option<VolumeId>,
    ) -> Option<PropagationResult>;

    /// Single-surface convenience.
    fn propagate_to(
        &self,
        parameters: &TrackParameters,
        surface: &Surface,
        direction: Direction,
        field: &FieldMode,
        particle: ParticleHypothesis,
        bounds_check: bool,
    ) -> Option<PropagationResult> {
        let target = PropagationTarget::new(surface, TargetKind::Destination, bounds_check);
        self.propagate(parameters, &[target], direction, field, particle, None)
    }
}

impl<T: Propagator + ?Sized> Propagator for &T {
    fn propagate(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
        field: &FieldMode,
        particle: ParticleHypothesis,
        volume: Option<VolumeId>,
    ) -> Option<PropagationResult> {
        (**self).propagate(parameters, targets, direction, field, particle, volume)
    }
}

/// Does a signed path `s` run along the requested direction?
pub(crate) fn path_allowed(s: f64, direction: Direction) -> bool {
    match direction {
        Direction::Forward => s > ON_SURFACE_EPS_MM,
        Direction::Backward => s < -ON_SURFACE_EPS_MM,
        Direction::Either => s.abs() > ON_SURFACE_EPS_MM,
    }
}

/// Kinds of all targets hit within `COINCIDENCE_MM` of `best`, with the
/// destination moved to the front.
pub(crate) fn coincident_hits(candidates: &[(f64, TargetKind)], best: f64) -> Vec<TargetKind> {
    let mut hits: Vec<TargetKind> = candidates
        .iter()
        .filter(|(s, _)| (s - best).abs() <= COINCIDENCE_MM)
        .map(|(_, k)| *k)
        .collect();
    if let Some(i) = hits.iter().position(|k| *k == TargetKind::Destination) {
        let dest = hits.remove(i);
        hits.insert(0, dest);
    }
    hits
}

/// Linearised curvilinear transport of a 5x5 covariance over path `s`:
/// loc0 picks up s·sinθ·δφ and loc1 picks up s·δθ.
pub(crate) fn transport_covariance(
    covariance: Option<&Array2<f64>>,
    path: f64,
    theta: f64,
) -> Option<Array2<f64>> {
    let cov = covariance?;
    let mut jacobian = Array2::<f64>::eye(N_TRACK_PARAMETERS);
    jacobian[[0, IDX_PHI]] = path * theta.sin();
    jacobian[[1, IDX_THETA]] = path;
    Some(similarity(&jacobian, cov))
}
