// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Straight Line Propagator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Analytic straight-line propagation. The field policy is ignored.

use super::{
    coincident_hits, path_allowed, transport_covariance, PropagationResult, PropagationTarget,
    Propagator, TargetKind,
};
use trackx_types::config::FieldMode;
use trackx_types::ids::VolumeId;
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

#[derive(Debug, Clone, Copy)]
pub struct StraightLinePropagator {
    /// Intersections further than this are unreachable [mm].
    pub path_limit_mm: f64,
}

impl Default for StraightLinePropagator {
    fn default() -> Self {
        StraightLinePropagator {
            path_limit_mm: f64::INFINITY,
        }
    }
}

impl StraightLinePropagator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_limit(path_limit_mm: f64) -> Self {
        StraightLinePropagator { path_limit_mm }
    }

    /// Closest allowed intersection of each target, as (path, kind).
    pub(crate) fn candidates(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
    ) -> Vec<(f64, TargetKind)> {
        let pos = parameters.position();
        let dir = parameters.direction();
        let mut out = Vec::new();
        for target in targets {
            let best = target
                .surface
                .straight_line_intersections(pos, dir)
                .into_iter()
                .filter(|&s| path_allowed(s, direction) && s.abs() <= self.path_limit_mm)
                .filter(|&s| !target.bounds_check || target.surface.inside_bounds(pos + dir * s, 0.0))
                .min_by(|a, b| a.abs().total_cmp(&b.abs()));
            if let Some(s) = best {
                out.push((s, target.kind));
            }
        }
        out
    }
}

impl Propagator for StraightLinePropagator {
    fn propagate(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
        _field: &FieldMode,
        _particle: ParticleHypothesis,
        _volume: Option<VolumeId>,
    ) -> Option<PropagationResult> {
        let candidates = self.candidates(parameters, targets, direction);
        let best = candidates
            .iter()
            .map(|(s, _)| *s)
            .min_by(|a, b| a.abs().total_cmp(&b.abs()))?;
        let hits = coincident_hits(&candidates, best);
        let primary = hits.first().copied()?;
        let surface = targets.iter().find(|t| t.kind == primary)?.surface;

        let position = parameters.position() + parameters.direction() * best;
        let covariance = transport_covariance(parameters.covariance(), best, parameters.theta());
        let out = parameters.transported(
            position,
            parameters.direction(),
            Some(surface.id()),
            covariance,
        );
        Some(PropagationResult {
            parameters: out,
            hits,
            path_length: best,
        })
    }
}
