// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Tracking Geometry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Read-only arena of volumes and layers, indexed by `VolumeId`/`LayerId`,
//! plus the surface → (volume, layer) association table.

use std::collections::HashMap;

use crate::boundary::{Attachment, BoundaryFace, BoundarySurface};
use crate::layer::Layer;
use crate::surface::Surface;
use crate::volume::TrackingVolume;
use trackx_math::Vector3;
use trackx_types::ids::{LayerId, SurfaceId, VolumeId};

/// Containment tolerance for point-location queries [mm].
pub const POINT_TOLERANCE_MM: f64 = 1e-6;

/// Step taken past a boundary before locating the volume beyond it [mm].
pub const BOUNDARY_NUDGE_MM: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Layer,
    Sensitive { index: usize },
    Boundary { face: BoundaryFace },
}

/// Where a surface sits in the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceAssociation {
    pub volume: VolumeId,
    pub layer: Option<LayerId>,
    pub role: SurfaceRole,
}

#[derive(Debug, Clone)]
pub struct TrackingGeometry {
    pub(crate) volumes: Vec<TrackingVolume>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) world: VolumeId,
    pub(crate) associations: HashMap<SurfaceId, SurfaceAssociation>,
}

impl TrackingGeometry {
    pub fn volume(&self, id: VolumeId) -> Option<&TrackingVolume> {
        self.volumes.get(id.0)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0)
    }

    pub fn world_id(&self) -> VolumeId {
        self.world
    }

    pub fn volumes(&self) -> impl Iterator<Item = &TrackingVolume> {
        self.volumes.iter()
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn association(&self, surface: SurfaceId) -> Option<&SurfaceAssociation> {
        self.associations.get(&surface)
    }

    /// Innermost static volume containing `position`, descending from the
    /// world through confined volumes. `None` outside the world.
    pub fn lowest_static_volume(&self, position: Vector3) -> Option<VolumeId> {
        let mut current = self.volume(self.world)?;
        if !current.inside(position, POINT_TOLERANCE_MM) {
            return None;
        }
        'descend: loop {
            for &child in current.confined_volumes() {
                if let Some(v) = self.volume(child) {
                    if v.inside(position, POINT_TOLERANCE_MM) {
                        current = v;
                        continue 'descend;
                    }
                }
            }
            return Some(current.id());
        }
    }

    /// Detached sub-volume of `volume` containing `position`, if any.
    pub fn containing_detached(&self, volume: VolumeId, position: Vector3) -> Option<VolumeId> {
        self.volume(volume)?
            .detached_volumes()
            .iter()
            .copied()
            .find(|&d| {
                self.volume(d)
                    .is_some_and(|v| v.inside(position, POINT_TOLERANCE_MM))
            })
    }

    /// The static volume a volume is navigated in: its host for detached
    /// volumes, itself otherwise.
    pub fn static_volume_of(&self, volume: VolumeId) -> Option<VolumeId> {
        let v = self.volume(volume)?;
        if v.is_detached() {
            v.mother()
        } else {
            Some(volume)
        }
    }

    /// Static volume associated with `surface`: by association table when
    /// the surface belongs to the geometry, by point location otherwise.
    pub fn volume_of_surface(&self, surface: &Surface) -> Option<VolumeId> {
        match self.association(surface.id()) {
            Some(a) => self.static_volume_of(a.volume),
            None => self.lowest_static_volume(surface.reference_point()),
        }
    }

    /// Layer whose surface is closest to `position` among the layers of
    /// `volume`.
    pub fn nearest_layer(&self, volume: VolumeId, position: Vector3) -> Option<LayerId> {
        self.volume(volume)?
            .layers()
            .layers()
            .iter()
            .filter_map(|&id| self.layer(id))
            .map(|l| (l.id(), l.surface().distance(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Layer owning `surface`, directly or as one of its sensitive elements.
    pub fn layer_of_surface(&self, surface: SurfaceId) -> Option<LayerId> {
        self.association(surface).and_then(|a| a.layer)
    }

    /// Volume entered when crossing `boundary` at `position` with `motion`.
    /// `None` is a world exit.
    pub fn volume_beyond(
        &self,
        boundary: &BoundarySurface,
        position: Vector3,
        motion: Vector3,
    ) -> Option<VolumeId> {
        if !boundary.is_exit(position, motion) {
            return Some(boundary.inside());
        }
        match boundary.outside() {
            Attachment::Enclosing => {
                let direction = motion.normalized()?;
                // May return the volume being left on a numerically ambiguous
                // crossing; callers treat that as a loop candidate.
                self.lowest_static_volume(position + direction * BOUNDARY_NUDGE_MM)
            }
            explicit => explicit.resolve(position),
        }
    }
}
