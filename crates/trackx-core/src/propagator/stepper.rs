// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Helix Stepper
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Fixed-step charged-track stepper in a uniform field.
//!
//! The unit direction is rotated with the Boris scheme, which preserves
//! its norm exactly; the position follows the mid-step direction. A sign
//! change of a target's signed distance within a step is refined by
//! bisection on the step fraction.

use super::straight_line::StraightLinePropagator;
use super::{
    coincident_hits, transport_covariance, PropagationResult, PropagationTarget, Propagator,
    TargetKind, COINCIDENCE_MM, ON_SURFACE_EPS_MM,
};
use trackx_math::Vector3;
use trackx_types::config::FieldMode;
use trackx_types::constants::C_LIGHT_FIELD;
use trackx_types::ids::VolumeId;
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

const BISECTION_ITERATIONS: usize = 60;

#[derive(Debug, Clone, Copy)]
pub struct HelixStepper {
    /// Arc length of one step [mm].
    pub step_mm: f64,
    /// Give up beyond this arc length [mm].
    pub max_path_mm: f64,
    /// Bisection stops once |signed distance| is below this [mm].
    pub tolerance_mm: f64,
}

impl Default for HelixStepper {
    fn default() -> Self {
        HelixStepper {
            step_mm: 10.0,
            max_path_mm: 1.0e5,
            tolerance_mm: 1.0e-7,
        }
    }
}

/// Position and unit direction along the trajectory.
#[derive(Debug, Clone, Copy)]
struct Point {
    position: Vector3,
    direction: Vector3,
}

struct Crossing {
    path: f64,
    point: Point,
    kind: TargetKind,
}

impl HelixStepper {
    pub fn new(step_mm: f64) -> Self {
        HelixStepper {
            step_mm,
            ..Default::default()
        }
    }

    /// One Boris step of signed arc length `h` with curvature factor
    /// `kappa` = c·q/p [1/(mm·T)].
    fn boris_step(p: Point, h: f64, kappa: f64, field: Vector3) -> Point {
        let t = field * (0.5 * kappa * h);
        let t2 = t.norm_squared();
        let s = t * (2.0 / (1.0 + t2));
        let d_minus = p.direction;
        let d_prime = d_minus + d_minus.cross(t);
        let d_plus = d_minus + d_prime.cross(s);
        let direction = d_plus.normalized().unwrap_or(d_minus);
        let mid = (d_minus + direction).normalized().unwrap_or(direction);
        Point {
            position: p.position + mid * h,
            direction,
        }
    }

    /// Earliest crossing of any target along `sign`, or `None` within the
    /// path budget.
    fn trace(
        &self,
        start: Point,
        targets: &[PropagationTarget<'_>],
        sign: f64,
        kappa: f64,
        field: Vector3,
    ) -> Option<Vec<Crossing>> {
        let h = sign * self.step_mm.abs();
        let mut current = start;
        let mut travelled = 0.0_f64;
        while travelled.abs() < self.max_path_mm {
            let next = Self::boris_step(current, h, kappa, field);
            let mut found: Vec<Crossing> = Vec::new();
            for target in targets {
                let d0 = target.surface.signed_distance(current.position);
                let d1 = target.surface.signed_distance(next.position);
                // A crossing needs a strict sign change, or a landing exactly
                // on the surface at the end of the step.
                let crosses = (d0 < 0.0 && d1 >= 0.0) || (d0 > 0.0 && d1 <= 0.0);
                if !crosses {
                    continue;
                }
                let (lambda, point) = self.bisect(current, h, kappa, field, target, d0);
                let path = travelled + lambda * h;
                if path.abs() <= ON_SURFACE_EPS_MM {
                    continue;
                }
                if target.bounds_check && !target.surface.inside_bounds(point.position, self.tolerance_mm.max(1e-9)) {
                    continue;
                }
                found.push(Crossing {
                    path,
                    point,
                    kind: target.kind,
                });
            }
            if !found.is_empty() {
                return Some(found);
            }
            travelled += h;
            current = next;
        }
        None
    }

    fn bisect(
        &self,
        from: Point,
        h: f64,
        kappa: f64,
        field: Vector3,
        target: &PropagationTarget<'_>,
        d0: f64,
    ) -> (f64, Point) {
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        let mut point = Self::boris_step(from, h, kappa, field);
        for _ in 0..BISECTION_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            point = Self::boris_step(from, h * mid, kappa, field);
            let d = target.surface.signed_distance(point.position);
            if d.abs() <= self.tolerance_mm {
                return (mid, point);
            }
            if (d < 0.0) == (d0 < 0.0) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (0.5 * (lo + hi), point)
    }
}

impl Propagator for HelixStepper {
    fn propagate(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
        field: &FieldMode,
        particle: ParticleHypothesis,
        volume: Option<VolumeId>,
    ) -> Option<PropagationResult> {
        let b = field.field_tesla();
        if parameters.charge() == 0.0 || b.norm_squared() == 0.0 {
            let line = StraightLinePropagator::with_path_limit(self.max_path_mm);
            return line.propagate(parameters, targets, direction, field, particle, volume);
        }
        let kappa = C_LIGHT_FIELD * parameters.charge() / parameters.momentum();
        let start = Point {
            position: parameters.position(),
            direction: parameters.direction(),
        };
        let signs: &[f64] = match direction {
            Direction::Forward => &[1.0],
            Direction::Backward => &[-1.0],
            Direction::Either => &[1.0, -1.0],
        };
        let mut best: Option<Vec<Crossing>> = None;
        for &sign in signs {
            if let Some(found) = self.trace(start, targets, sign, kappa, b) {
                let path = found.iter().map(|c| c.path.abs()).fold(f64::INFINITY, f64::min);
                let better = best.as_ref().map_or(true, |prev| {
                    path < prev.iter().map(|c| c.path.abs()).fold(f64::INFINITY, f64::min)
                });
                if better {
                    best = Some(found);
                }
            }
        }
        let found = best?;
        let first = found
            .iter()
            .min_by(|a, b| a.path.abs().total_cmp(&b.path.abs()))?;
        let candidates: Vec<(f64, TargetKind)> = found.iter().map(|c| (c.path, c.kind)).collect();
        let hits = coincident_hits(&candidates, first.path);
        let primary = hits.first().copied()?;
        let chosen = found
            .iter()
            .filter(|c| (c.path - first.path).abs() <= COINCIDENCE_MM)
            .find(|c| c.kind == primary)
            .unwrap_or(first);
        let surface = targets.iter().find(|t| t.kind == primary)?.surface;
        let covariance = transport_covariance(parameters.covariance(), chosen.path, parameters.theta());
        let out = parameters.transported(
            chosen.point.position,
            chosen.point.direction,
            Some(surface.id()),
            covariance,
        );
        Some(PropagationResult {
            parameters: out,
            hits,
            path_length: chosen.path,
        })
    }
}
