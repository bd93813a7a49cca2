// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Navigation Port
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Navigation port: point location and volume hand-off queries.

use std::sync::Arc;

use crate::propagator::{PropagationTarget, Propagator, TargetKind};
use trackx_geometry::tracking_geometry::BOUNDARY_NUDGE_MM;
use trackx_geometry::{BoundaryFace, BoundarySurface, TrackingGeometry};
use trackx_math::Vector3;
use trackx_types::config::FieldMode;
use trackx_types::ids::VolumeId;
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

/// Distance within which a state is on a boundary [mm].
pub const BOUNDARY_TOLERANCE_MM: f64 = 1e-4;

/// Answer to "is this state on a boundary of that volume?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryCheck {
    pub at_boundary: bool,
    /// Volume entered; `None` with `at_boundary` is a world exit.
    pub neighbor: Option<VolumeId>,
    pub face: Option<BoundaryFace>,
}

#[derive(Debug, Clone)]
pub struct NextVolume {
    /// `None` is a world exit.
    pub volume: Option<VolumeId>,
    pub parameters: TrackParameters,
    pub exit_face: BoundaryFace,
}

pub trait Navigator {
    fn geometry(&self) -> &TrackingGeometry;

    /// Innermost static volume containing `position`.
    fn volume_containing(&self, position: Vector3) -> Option<VolumeId>;

    fn at_volume_boundary(
        &self,
        parameters: &TrackParameters,
        volume: VolumeId,
        direction: Direction,
    ) -> BoundaryCheck;

    /// Nearest boundary ahead of `parameters` in `from` and the volume
    /// behind it.
    fn next_volume(
        &self,
        propagator: &dyn Propagator,
        parameters: &TrackParameters,
        direction: Direction,
        from: VolumeId,
        field: &FieldMode,
        particle: ParticleHypothesis,
    ) -> Option<NextVolume>;
}

impl<T: Navigator + ?Sized> Navigator for &T {
    fn geometry(&self) -> &TrackingGeometry {
        (**self).geometry()
    }

    fn volume_containing(&self, position: Vector3) -> Option<VolumeId> {
        (**self).volume_containing(position)
    }

    fn at_volume_boundary(
        &self,
        parameters: &TrackParameters,
        volume: VolumeId,
        direction: Direction,
    ) -> BoundaryCheck {
        (**self).at_volume_boundary(parameters, volume, direction)
    }

    fn next_volume(
        &self,
        propagator: &dyn Propagator,
        parameters: &TrackParameters,
        direction: Direction,
        from: VolumeId,
        field: &FieldMode,
        particle: ParticleHypothesis,
    ) -> Option<NextVolume> {
        (**self).next_volume(propagator, parameters, direction, from, field, particle)
    }
}

/// Navigator over a shared `TrackingGeometry`.
#[derive(Debug, Clone)]
pub struct GeometryNavigator {
    geometry: Arc<TrackingGeometry>,
}

impl GeometryNavigator {
    pub fn new(geometry: Arc<TrackingGeometry>) -> Self {
        GeometryNavigator { geometry }
    }

    /// Boundaries through which a track can leave `volume`: its own faces
    /// (exits) and the faces of its confined volumes (entries).
    fn candidate_boundaries(&self, volume: VolumeId) -> Vec<&BoundarySurface> {
        let Some(v) = self.geometry.volume(volume) else {
            return Vec::new();
        };
        let mut out: Vec<&BoundarySurface> = v.boundaries().iter().collect();
        for &child in v.confined_volumes() {
            if let Some(c) = self.geometry.volume(child) {
                out.extend(c.boundaries().iter());
            }
        }
        out
    }

    /// Volume entered through `boundary` from `volume`, or `None` when the
    /// crossing does not leave `volume`.
    fn crossing(
        &self,
        boundary: &BoundarySurface,
        volume: VolumeId,
        position: Vector3,
        motion: Vector3,
    ) -> Option<Option<VolumeId>> {
        let exit = boundary.is_exit(position, motion);
        if boundary.inside() == volume {
            exit.then(|| self.geometry.volume_beyond(boundary, position, motion))
        } else if !exit {
            let direction = motion.normalized()?;
            Some(self.geometry.lowest_static_volume(position + direction * BOUNDARY_NUDGE_MM))
        } else {
            None
        }
    }
}

fn motion_of(parameters: &TrackParameters, direction: Direction) -> Vector3 {
    parameters.direction() * direction.sign().unwrap_or(1.0)
}

impl Navigator for GeometryNavigator {
    fn geometry(&self) -> &TrackingGeometry {
        &self.geometry
    }

    fn volume_containing(&self, position: Vector3) -> Option<VolumeId> {
        self.geometry.lowest_static_volume(position)
    }

    fn at_volume_boundary(
        &self,
        parameters: &TrackParameters,
        volume: VolumeId,
        direction: Direction,
    ) -> BoundaryCheck {
        let pos = parameters.position();
        let motion = motion_of(parameters, direction);
        for boundary in self.candidate_boundaries(volume) {
            if !boundary
                .surface()
                .is_on_surface(pos, BOUNDARY_TOLERANCE_MM, true)
            {
                continue;
            }
            if let Some(neighbor) = self.crossing(boundary, volume, pos, motion) {
                return BoundaryCheck {
                    at_boundary: true,
                    neighbor,
                    face: Some(boundary.face()),
                };
            }
        }
        BoundaryCheck::default()
    }

    fn next_volume(
        &self,
        propagator: &dyn Propagator,
        parameters: &TrackParameters,
        direction: Direction,
        from: VolumeId,
        field: &FieldMode,
        particle: ParticleHypothesis,
    ) -> Option<NextVolume> {
        let boundaries = self.candidate_boundaries(from);
        // Bounded faces first; the unbounded retry closes numerical gaps
        // at edges and corners.
        for bounds_check in [true, false] {
            let targets: Vec<PropagationTarget<'_>> = boundaries
                .iter()
                .map(|b| {
                    PropagationTarget::new(
                        b.surface(),
                        TargetKind::Boundary {
                            volume: b.inside(),
                            face: b.face(),
                        },
                        bounds_check,
                    )
                })
                .collect();
            let Some(result) =
                propagator.propagate(parameters, &targets, direction, field, particle, Some(from))
            else {
                continue;
            };
            let Some(TargetKind::Boundary { volume, face }) = result.primary() else {
                continue;
            };
            let Some(boundary) = self
                .geometry
                .volume(volume)
                .and_then(|v| v.boundary(face))
            else {
                continue;
            };
            let pos = result.parameters.position();
            let motion = motion_of(&result.parameters, direction);
            if let Some(next) = self.crossing(boundary, from, pos, motion) {
                return Some(NextVolume {
                    volume: next,
                    parameters: result.parameters,
                    exit_face: face,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagator::StraightLinePropagator;
    use trackx_geometry::{TrackingGeometryBuilder, VolumeBounds};

    fn slab(cx: f64) -> VolumeBounds {
        VolumeBounds::Cuboid {
            center: Vector3::new(cx, 0.0, 0.0),
            half_x: 50.0,
            half_y: 100.0,
            half_z: 100.0,
        }
    }

    /// World [0, 300] with A = [0, 100] and C = [200, 300]; the gap
    /// [100, 200] belongs to the world itself.
    fn geometry() -> (Arc<TrackingGeometry>, VolumeId, VolumeId, VolumeId) {
        let mut b = TrackingGeometryBuilder::new();
        let world = b
            .add_world(
                "world",
                VolumeBounds::Cuboid {
                    center: Vector3::new(150.0, 0.0, 0.0),
                    half_x: 150.0,
                    half_y: 100.0,
                    half_z: 100.0,
                },
            )
            .unwrap();
        let a = b.add_volume("a", slab(50.0), world).unwrap();
        let c = b.add_volume("c", slab(250.0), world).unwrap();
        (Arc::new(b.build().unwrap()), world, a, c)
    }

    fn track(x: f64) -> TrackParameters {
        TrackParameters::new(Vector3::new(x, 0.0, 0.0), Vector3::UNIT_X, 1000.0, 1.0).unwrap()
    }

    #[test]
    fn test_volume_containing() {
        let (g, world, a, c) = geometry();
        let nav = GeometryNavigator::new(g);
        assert_eq!(nav.volume_containing(Vector3::new(10.0, 0.0, 0.0)), Some(a));
        assert_eq!(nav.volume_containing(Vector3::new(150.0, 0.0, 0.0)), Some(world));
        assert_eq!(nav.volume_containing(Vector3::new(260.0, 0.0, 0.0)), Some(c));
    }

    #[test]
    fn test_at_boundary_resolves_neighbor_by_side() {
        let (g, world, a, c) = geometry();
        let nav = GeometryNavigator::new(g);
        let on_face = track(100.0);
        let out = nav.at_volume_boundary(&on_face, a, Direction::Forward);
        assert!(out.at_boundary);
        assert_eq!(out.neighbor, Some(world));
        assert_eq!(out.face, Some(BoundaryFace::PositiveX));
        // moving back into A is not a hand-off out of A
        assert!(!nav.at_volume_boundary(&on_face, a, Direction::Backward).at_boundary);
        // from the world gap, C's face is an entry
        let entry = nav.at_volume_boundary(&track(200.0), world, Direction::Forward);
        assert_eq!(entry.neighbor, Some(c));
        assert!(!nav.at_volume_boundary(&track(50.0), a, Direction::Forward).at_boundary);
    }

    #[test]
    fn test_next_volume_chain_to_world_exit() {
        let (g, world, a, c) = geometry();
        let nav = GeometryNavigator::new(g);
        let prop = StraightLinePropagator::new();
        let field = FieldMode::NoField;
        let p = ParticleHypothesis::Muon;

        let first = nav
            .next_volume(&prop, &track(10.0), Direction::Forward, a, &field, p)
            .unwrap();
        assert_eq!(first.volume, Some(world));
        assert!((first.parameters.position().x - 100.0).abs() < 1e-9);

        let second = nav
            .next_volume(&prop, &first.parameters, Direction::Forward, world, &field, p)
            .unwrap();
        assert_eq!(second.volume, Some(c));
        assert!((second.parameters.position().x - 200.0).abs() < 1e-9);

        let last = nav
            .next_volume(&prop, &second.parameters, Direction::Forward, c, &field, p)
            .unwrap();
        assert_eq!(last.volume, None);
        assert_eq!(last.exit_face, BoundaryFace::PositiveX);
    }
}
