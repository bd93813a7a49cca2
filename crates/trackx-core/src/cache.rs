// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Navigation Cache
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-call navigation scratch state.
//!
//! Holds the surfaces resolved for the current static volume. Resolution
//! happens when the static volume changes, never per step.

use crate::arena::StateId;
use crate::propagator::{PropagationTarget, TargetKind};
use trackx_geometry::{BoundaryFace, BoundarySurface, Surface, TrackingGeometry};
use trackx_math::Vector3;
use trackx_types::ids::{LayerId, VolumeId};

/// A boundary face addressed through the volume owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryRef {
    pub volume: VolumeId,
    pub face: BoundaryFace,
}

impl BoundaryRef {
    pub fn resolve<'g>(&self, geometry: &'g TrackingGeometry) -> Option<&'g BoundarySurface> {
        geometry.volume(self.volume)?.boundary(self.face)
    }
}

/// Where layer material was last applied. A layer crossed again at a
/// different point is a new crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialMark {
    pub layer: LayerId,
    pub position: Vector3,
}

impl MaterialMark {
    pub fn matches(&self, layer: LayerId, position: Vector3, tolerance: f64) -> bool {
        self.layer == layer && self.position.distance(position) <= tolerance
    }
}

/// Hand-off record between two volume phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryParameters {
    pub next_volume: Option<VolumeId>,
    /// State on the boundary as propagated.
    pub entry: StateId,
    /// State navigation resumes from (after boundary material).
    pub resume: StateId,
    pub exit_face: Option<BoundaryFace>,
}

#[derive(Debug, Default)]
pub struct NavigationCache {
    volume: Option<VolumeId>,
    boundaries: Vec<BoundaryRef>,
    layers: Vec<LayerId>,
    dense_volumes: Vec<VolumeId>,
    dense_boundaries: Vec<BoundaryRef>,
    walkable: bool,
    pub last_material: Option<MaterialMark>,
    pub at_boundary: Option<BoundaryParameters>,
    resolutions: usize,
}

impl NavigationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Resolve the surface lists of `volume`. Returns false when `volume`
    /// is already the cached one.
    pub fn resolve(&mut self, geometry: &TrackingGeometry, volume: VolumeId) -> bool {
        if self.volume == Some(volume) {
            return false;
        }
        self.volume = Some(volume);
        self.boundaries.clear();
        self.layers.clear();
        self.dense_volumes.clear();
        self.dense_boundaries.clear();
        self.walkable = false;
        self.resolutions += 1;

        let Some(v) = geometry.volume(volume) else {
            return true;
        };
        self.boundaries.extend(v.boundaries().iter().map(|b| BoundaryRef {
            volume,
            face: b.face(),
        }));
        for &child in v.confined_volumes() {
            if let Some(c) = geometry.volume(child) {
                self.boundaries.extend(c.boundaries().iter().map(|b| BoundaryRef {
                    volume: child,
                    face: b.face(),
                }));
            }
        }
        self.layers.extend_from_slice(v.layers().layers());
        for &d in v.detached_volumes() {
            let Some(detached) = geometry.volume(d) else {
                continue;
            };
            self.layers.extend_from_slice(detached.layers().layers());
            if detached.is_dense() {
                self.dense_volumes.push(d);
                self.dense_boundaries
                    .extend(detached.boundaries().iter().map(|b| BoundaryRef {
                        volume: d,
                        face: b.face(),
                    }));
            }
        }
        self.walkable = v.layers().is_ordered() && v.detached_volumes().is_empty();
        log::trace!(
            "Resolved {volume}: {} boundaries, {} layers, {} dense volumes",
            self.boundaries.len(),
            self.layers.len(),
            self.dense_volumes.len()
        );
        true
    }

    /// Was the material of `layer` already applied at `position`?
    pub fn material_applied(&self, layer: LayerId, position: Vector3, tolerance: f64) -> bool {
        self.last_material
            .is_some_and(|m| m.matches(layer, position, tolerance))
    }

    pub fn volume(&self) -> Option<VolumeId> {
        self.volume
    }

    pub fn boundaries(&self) -> &[BoundaryRef] {
        &self.boundaries
    }

    /// Ordinary and detached layers.
    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    pub fn dense_volumes(&self) -> &[VolumeId] {
        &self.dense_volumes
    }

    pub fn dense_boundaries(&self) -> &[BoundaryRef] {
        &self.dense_boundaries
    }

    /// The volume's layers are ordered and nothing is folded in, so the
    /// layer walk applies.
    pub fn is_walkable(&self) -> bool {
        self.walkable
    }

    /// How many times a volume was resolved during this call.
    pub fn resolutions(&self) -> usize {
        self.resolutions
    }

    /// Candidate surfaces of one step in the cached volume: destination,
    /// boundaries, dense-volume boundaries, then layers.
    pub fn targets<'a>(
        &self,
        geometry: &'a TrackingGeometry,
        destination: Option<&'a Surface>,
        bounds_check: bool,
    ) -> Vec<PropagationTarget<'a>> {
        let mut out = Vec::with_capacity(
            1 + self.boundaries.len() + self.dense_boundaries.len() + self.layers.len(),
        );
        if let Some(surface) = destination {
            out.push(PropagationTarget::new(
                surface,
                TargetKind::Destination,
                bounds_check,
            ));
        }
        for b in &self.boundaries {
            if let Some(boundary) = b.resolve(geometry) {
                out.push(PropagationTarget::new(
                    boundary.surface(),
                    TargetKind::Boundary {
                        volume: b.volume,
                        face: b.face,
                    },
                    true,
                ));
            }
        }
        for b in &self.dense_boundaries {
            if let Some(boundary) = b.resolve(geometry) {
                out.push(PropagationTarget::new(
                    boundary.surface(),
                    TargetKind::DenseBoundary {
                        volume: b.volume,
                        face: b.face,
                    },
                    true,
                ));
            }
        }
        for &id in &self.layers {
            if let Some(layer) = geometry.layer(id) {
                out.push(PropagationTarget::new(
                    layer.surface(),
                    TargetKind::Layer(id),
                    true,
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackx_geometry::{MaterialProperties, TrackingGeometryBuilder, VolumeBounds};
    use trackx_math::Vector3;

    fn geometry() -> (TrackingGeometry, VolumeId, VolumeId) {
        let mut b = TrackingGeometryBuilder::new();
        let world = b
            .add_world(
                "world",
                VolumeBounds::Cylinder {
                    center: Vector3::ZERO,
                    r_min: 0.0,
                    r_max: 1000.0,
                    half_z: 1000.0,
                },
            )
            .unwrap();
        let barrel = b
            .add_volume(
                "barrel",
                VolumeBounds::Cylinder {
                    center: Vector3::ZERO,
                    r_min: 0.0,
                    r_max: 500.0,
                    half_z: 800.0,
                },
                world,
            )
            .unwrap();
        for r in [100.0, 200.0, 300.0] {
            let s = Surface::cylinder(Vector3::ZERO, Vector3::UNIT_Z, r, 700.0).unwrap();
            b.add_layer(barrel, s, Some(MaterialProperties::silicon(0.3)))
                .unwrap();
        }
        b.add_detached_volume(
            "absorber",
            VolumeBounds::Cuboid {
                center: Vector3::new(700.0, 0.0, 0.0),
                half_x: 20.0,
                half_y: 20.0,
                half_z: 20.0,
            },
            world,
            Some(MaterialProperties::iron(40.0)),
        )
        .unwrap();
        (b.build().unwrap(), world, barrel)
    }

    #[test]
    fn test_resolution_happens_once_per_volume() {
        let (g, world, barrel) = geometry();
        let mut cache = NavigationCache::new();
        assert!(cache.resolve(&g, barrel));
        assert!(!cache.resolve(&g, barrel));
        assert_eq!(cache.resolutions(), 1);
        assert!(cache.is_walkable());
        assert_eq!(cache.layers().len(), 3);
        assert_eq!(cache.boundaries().len(), 3);

        assert!(cache.resolve(&g, world));
        assert_eq!(cache.resolutions(), 2);
        assert!(!cache.is_walkable());
        // own faces plus the barrel's faces
        assert_eq!(cache.boundaries().len(), 6);
        assert_eq!(cache.dense_volumes().len(), 1);
        assert_eq!(cache.dense_boundaries().len(), 6);
    }

    #[test]
    fn test_targets_put_destination_first() {
        let (g, _world, barrel) = geometry();
        let mut cache = NavigationCache::new();
        cache.resolve(&g, barrel);
        let dest = Surface::cylinder(Vector3::ZERO, Vector3::UNIT_Z, 250.0, 700.0).unwrap();
        let targets = cache.targets(&g, Some(&dest), false);
        assert_eq!(targets.len(), 1 + 3 + 3);
        assert_eq!(targets[0].kind, TargetKind::Destination);
        assert!(!targets[0].bounds_check);
        assert!(targets[1..].iter().all(|t| t.bounds_check));
        assert!(cache.targets(&g, None, true).len() == 6);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (g, _world, barrel) = geometry();
        let mut cache = NavigationCache::new();
        cache.resolve(&g, barrel);
        cache.last_material = Some(MaterialMark {
            layer: LayerId(0),
            position: Vector3::ZERO,
        });
        cache.reset();
        assert_eq!(cache.volume(), None);
        assert_eq!(cache.last_material, None);
        assert_eq!(cache.resolutions(), 0);
    }

    #[test]
    fn test_material_mark_is_per_crossing() {
        let mut cache = NavigationCache::new();
        let entry = Vector3::new(150.0, -132.3, 0.0);
        assert!(!cache.material_applied(LayerId(2), entry, 1e-4));
        cache.last_material = Some(MaterialMark {
            layer: LayerId(2),
            position: entry,
        });
        assert!(cache.material_applied(LayerId(2), entry + Vector3::new(0.0, 5e-5, 0.0), 1e-4));
        // Same layer, other side of the cylinder.
        assert!(!cache.material_applied(LayerId(2), Vector3::new(150.0, 132.3, 0.0), 1e-4));
        assert!(!cache.material_applied(LayerId(3), entry, 1e-4));
    }
}
