// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Extrapolation Status
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Call options, navigation break kinds and the per-call report.

use std::fmt;

use crate::material_effects::MaterialEffectsOnTrack;
use trackx_types::ids::VolumeId;
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

/// Why stepwise navigation was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationBreak {
    /// Re-entered the volume just left without forward progress.
    Loop,
    /// Second A→B→A return within one call.
    Oscillation,
    /// No volume behind a boundary on a call that needs one.
    MissingVolume,
    /// The distance to the destination grew between hand-offs.
    DistanceRegression,
    /// The propagation port produced no state.
    PropagationFailure,
    /// `max_steps` propagation calls used up.
    StepLimit,
    /// `max_volume_transitions` hand-offs used up.
    DepthLimit,
    /// Start or destination volume could not be located.
    UnresolvedVolume,
}

impl fmt::Display for NavigationBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NavigationBreak::Loop => "loop",
            NavigationBreak::Oscillation => "oscillation",
            NavigationBreak::MissingVolume => "missing volume",
            NavigationBreak::DistanceRegression => "distance regression",
            NavigationBreak::PropagationFailure => "propagation failure",
            NavigationBreak::StepLimit => "step limit",
            NavigationBreak::DepthLimit => "volume transition limit",
            NavigationBreak::UnresolvedVolume => "unresolved volume",
        };
        f.write_str(s)
    }
}

/// Which lookup tier located a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeResolution {
    /// The surface is registered in the geometry.
    Association,
    /// Same surface as the previous call.
    Recall,
    /// Geometric search through the navigation port.
    PointLocation,
}

/// Per-call options beyond the plain `extrapolate` signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrapolationOptions {
    pub direction: Direction,
    /// Destination hits must land within the surface bounds.
    pub bounds_check: bool,
    pub particle: ParticleHypothesis,
    pub collect_material: bool,
    /// Record states on sensitive sub-surfaces of crossed layers.
    pub collect_sensitive: bool,
    /// Record every layer and boundary state.
    pub collect_intermediate: bool,
}

impl Default for ExtrapolationOptions {
    fn default() -> Self {
        ExtrapolationOptions {
            direction: Direction::Forward,
            bounds_check: true,
            particle: ParticleHypothesis::Pion,
            collect_material: false,
            collect_sensitive: false,
            collect_intermediate: false,
        }
    }
}

impl ExtrapolationOptions {
    pub fn new(direction: Direction, particle: ParticleHypothesis) -> Self {
        ExtrapolationOptions {
            direction,
            particle,
            ..Default::default()
        }
    }

    pub fn bounds_check(mut self, on: bool) -> Self {
        self.bounds_check = on;
        self
    }

    pub fn collect_material(mut self, on: bool) -> Self {
        self.collect_material = on;
        self
    }

    pub fn collect_sensitive(mut self, on: bool) -> Self {
        self.collect_sensitive = on;
        self
    }

    pub fn collect_intermediate(mut self, on: bool) -> Self {
        self.collect_intermediate = on;
        self
    }
}

/// What happened during one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtrapolationReport {
    /// Resolved direction; never `Either` once resolution succeeded.
    pub direction: Option<Direction>,
    pub start_volume: Option<VolumeId>,
    pub destination_volume: Option<VolumeId>,
    pub start_resolution: Option<VolumeResolution>,
    pub destination_resolution: Option<VolumeResolution>,
    /// Static volumes in traversal order, start first.
    pub visited_volumes: Vec<VolumeId>,
    pub navigation_break: Option<NavigationBreak>,
    pub fallback_used: bool,
    pub absorbed: bool,
    /// Propagation calls, the fallback excluded.
    pub steps: usize,
    pub material_updates: usize,
    pub cache_resolutions: usize,
    /// Intermediate states the call allocated.
    pub states_created: usize,
    /// States freed when no longer reachable, at the latest on return.
    pub states_released: usize,
    /// States handed to the caller out of the call's arena.
    pub states_returned: usize,
}

impl ExtrapolationReport {
    pub fn volume_transitions(&self) -> usize {
        self.visited_volumes.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct ExtrapolationOutcome {
    pub parameters: Option<TrackParameters>,
    /// Material records in traversal order.
    pub material: Vec<MaterialEffectsOnTrack>,
    /// States on sensitive sub-surfaces.
    pub sensitive: Vec<TrackParameters>,
    /// Layer and boundary states in traversal order.
    pub intermediate: Vec<TrackParameters>,
    pub report: ExtrapolationReport,
}

impl ExtrapolationOutcome {
    pub fn is_success(&self) -> bool {
        self.parameters.is_some()
    }

    /// Summed traversed thickness in radiation lengths.
    pub fn total_thickness_in_x0(&self) -> f64 {
        self.material.iter().map(|m| m.thickness_in_x0).sum()
    }
}
