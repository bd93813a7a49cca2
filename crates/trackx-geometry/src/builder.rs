// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Geometry Builder
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Incremental construction of a `TrackingGeometry`.
//!
//! Volumes and layers receive dense ids in insertion order. `build()`
//! sorts the layers of every ordered volume along their common normal,
//! links them, and indexes every surface.

use std::collections::{HashMap, HashSet};

use crate::boundary::{Attachment, BoundaryFace};
use crate::layer::Layer;
use crate::material::MaterialProperties;
use crate::surface::{Surface, SurfaceShape};
use crate::tracking_geometry::{
    SurfaceAssociation, SurfaceRole, TrackingGeometry, POINT_TOLERANCE_MM,
};
use crate::volume::{LayerArrangement, TrackingVolume, VolumeBounds};
use trackx_math::Vector3;
use trackx_types::error::{ExtrapolationError, ExtrapolationResult};
use trackx_types::ids::{LayerId, SurfaceId, VolumeId};

/// |n₁·n₂| above which two layer normals count as parallel.
const PARALLEL_COS: f64 = 1.0 - 1e-9;

#[derive(Debug, Default)]
pub struct TrackingGeometryBuilder {
    volumes: Vec<TrackingVolume>,
    layers: Vec<Layer>,
    volume_layers: HashMap<VolumeId, Vec<LayerId>>,
    unordered: HashSet<VolumeId>,
    world: Option<VolumeId>,
}

fn geometry_err(msg: String) -> ExtrapolationError {
    ExtrapolationError::Geometry(msg)
}

impl TrackingGeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn volume_mut(&mut self, id: VolumeId) -> ExtrapolationResult<&mut TrackingVolume> {
        self.volumes
            .get_mut(id.0)
            .ok_or_else(|| geometry_err(format!("unknown volume {id}")))
    }

    fn layer_mut(&mut self, id: LayerId) -> ExtrapolationResult<&mut Layer> {
        self.layers
            .get_mut(id.0)
            .ok_or_else(|| geometry_err(format!("unknown layer {id}")))
    }

    fn push_volume(
        &mut self,
        name: &str,
        bounds: VolumeBounds,
        mother: Option<VolumeId>,
        detached: bool,
    ) -> ExtrapolationResult<VolumeId> {
        let id = VolumeId(self.volumes.len());
        let volume = TrackingVolume::new(id, name, bounds, mother, detached)?;
        self.volumes.push(volume);
        Ok(id)
    }

    /// The outermost volume. Exactly one per geometry.
    pub fn add_world(&mut self, name: &str, bounds: VolumeBounds) -> ExtrapolationResult<VolumeId> {
        if self.world.is_some() {
            return Err(geometry_err("world volume already defined".to_string()));
        }
        let id = self.push_volume(name, bounds, None, false)?;
        self.world = Some(id);
        Ok(id)
    }

    /// Static sub-volume confined in `mother`.
    pub fn add_volume(
        &mut self,
        name: &str,
        bounds: VolumeBounds,
        mother: VolumeId,
    ) -> ExtrapolationResult<VolumeId> {
        let parent = self.volume_mut(mother)?;
        if parent.is_detached() {
            return Err(geometry_err(format!(
                "volume '{name}' cannot be confined in detached volume {mother}"
            )));
        }
        if !parent.inside(bounds.center(), POINT_TOLERANCE_MM) {
            return Err(geometry_err(format!(
                "volume '{name}' is centred outside its mother {mother}"
            )));
        }
        let id = self.push_volume(name, bounds, Some(mother), false)?;
        self.volume_mut(mother)?.confined.push(id);
        Ok(id)
    }

    /// Detached sub-volume of the static volume `host`. With `material`
    /// it is a dense volume whose material is integrated along the path.
    pub fn add_detached_volume(
        &mut self,
        name: &str,
        bounds: VolumeBounds,
        host: VolumeId,
        material: Option<MaterialProperties>,
    ) -> ExtrapolationResult<VolumeId> {
        let parent = self.volume_mut(host)?;
        if parent.is_detached() {
            return Err(geometry_err(format!(
                "detached volume '{name}' needs a static host, {host} is detached"
            )));
        }
        if !parent.inside(bounds.center(), POINT_TOLERANCE_MM) {
            return Err(geometry_err(format!(
                "detached volume '{name}' is centred outside its host {host}"
            )));
        }
        let id = self.push_volume(name, bounds, Some(host), true)?;
        self.volume_mut(id)?.material = material;
        self.volume_mut(host)?.detached.push(id);
        Ok(id)
    }

    pub fn add_layer(
        &mut self,
        volume: VolumeId,
        surface: Surface,
        material: Option<MaterialProperties>,
    ) -> ExtrapolationResult<LayerId> {
        let v = self
            .volumes
            .get(volume.0)
            .ok_or_else(|| geometry_err(format!("unknown volume {volume}")))?;
        if !v.inside(surface.reference_point(), POINT_TOLERANCE_MM) {
            return Err(geometry_err(format!(
                "layer surface {} lies outside volume {volume}",
                surface.id()
            )));
        }
        let id = LayerId(self.layers.len());
        self.layers.push(Layer::new(id, surface, material, volume));
        self.volume_layers.entry(volume).or_default().push(id);
        Ok(id)
    }

    /// Fraction of the layer material in front of its surface, in [0, 1].
    pub fn set_layer_pre_factor(&mut self, layer: LayerId, pre_factor: f64) -> ExtrapolationResult<()> {
        if !(0.0..=1.0).contains(&pre_factor) {
            return Err(geometry_err(format!(
                "pre_factor must lie in [0, 1], got {pre_factor}"
            )));
        }
        self.layer_mut(layer)?.pre_factor = pre_factor;
        Ok(())
    }

    /// Sensitive element on `layer`, searched by overlap search.
    pub fn add_sensitive_surface(&mut self, layer: LayerId, surface: Surface) -> ExtrapolationResult<()> {
        self.layer_mut(layer)?.sub_surfaces.push(surface);
        Ok(())
    }

    /// Every layer of `volume` is tested on each step instead of being walked.
    pub fn set_unordered(&mut self, volume: VolumeId) -> ExtrapolationResult<()> {
        self.volume_mut(volume)?;
        self.unordered.insert(volume);
        Ok(())
    }

    pub fn attach(
        &mut self,
        volume: VolumeId,
        face: BoundaryFace,
        attachment: Attachment,
    ) -> ExtrapolationResult<()> {
        let known = self.volumes.len();
        if attachment.volumes().iter().any(|v| v.0 >= known) {
            return Err(geometry_err(format!(
                "attachment of {volume} {face:?} refers to an unknown volume"
            )));
        }
        if let Attachment::Binned { edges, volumes, .. } = &attachment {
            if edges.len() != volumes.len() + 1 || edges.windows(2).any(|w| w[1] <= w[0]) {
                return Err(geometry_err(format!(
                    "binned attachment of {volume} {face:?} needs {} increasing edges",
                    volumes.len() + 1
                )));
            }
        }
        let boundary = self
            .volume_mut(volume)?
            .boundaries
            .iter_mut()
            .find(|b| b.face == face)
            .ok_or_else(|| geometry_err(format!("{volume} has no {face:?} boundary")))?;
        boundary.outside = attachment;
        Ok(())
    }

    /// Attach `a` and `b` to each other through the given faces.
    pub fn glue(
        &mut self,
        a: VolumeId,
        face_a: BoundaryFace,
        b: VolumeId,
        face_b: BoundaryFace,
    ) -> ExtrapolationResult<()> {
        self.attach(a, face_a, Attachment::Volume(Some(b)))?;
        self.attach(b, face_b, Attachment::Volume(Some(a)))
    }

    pub fn set_boundary_material(
        &mut self,
        volume: VolumeId,
        face: BoundaryFace,
        material: MaterialProperties,
    ) -> ExtrapolationResult<()> {
        let boundary = self
            .volume_mut(volume)?
            .boundaries
            .iter_mut()
            .find(|b| b.face == face)
            .ok_or_else(|| geometry_err(format!("{volume} has no {face:?} boundary")))?;
        boundary.material = Some(material);
        Ok(())
    }

    pub fn build(mut self) -> ExtrapolationResult<TrackingGeometry> {
        let world = self
            .world
            .ok_or_else(|| geometry_err("no world volume defined".to_string()))?;

        let volume_layers = std::mem::take(&mut self.volume_layers);
        for (volume, mut ids) in volume_layers {
            let unordered = self.unordered.contains(&volume)
                || self.volumes.get(volume.0).is_some_and(|v| v.is_detached());
            let arrangement = if unordered {
                LayerArrangement::Unordered(ids)
            } else {
                self.check_orderable(volume, &ids)?;
                ids.sort_by(|a, b| {
                    let ka = self.layers[a.0].surface.ordering_key();
                    let kb = self.layers[b.0].surface.ordering_key();
                    ka.total_cmp(&kb)
                });
                for (i, id) in ids.iter().enumerate() {
                    let layer = &mut self.layers[id.0];
                    layer.next_opposite = i.checked_sub(1).map(|j| ids[j]);
                    layer.next_along = ids.get(i + 1).copied();
                }
                LayerArrangement::Ordered(ids)
            };
            self.volume_mut(volume)?.layers = arrangement;
        }

        let mut associations: HashMap<SurfaceId, SurfaceAssociation> = HashMap::new();
        let mut register = |id: SurfaceId, assoc: SurfaceAssociation| -> ExtrapolationResult<()> {
            if associations.insert(id, assoc).is_some() {
                return Err(geometry_err(format!("surface {id} registered twice")));
            }
            Ok(())
        };
        for layer in &self.layers {
            register(
                layer.surface.id(),
                SurfaceAssociation {
                    volume: layer.volume,
                    layer: Some(layer.id),
                    role: SurfaceRole::Layer,
                },
            )?;
            for (index, sub) in layer.sub_surfaces.iter().enumerate() {
                register(
                    sub.id(),
                    SurfaceAssociation {
                        volume: layer.volume,
                        layer: Some(layer.id),
                        role: SurfaceRole::Sensitive { index },
                    },
                )?;
            }
        }
        for volume in &self.volumes {
            for boundary in &volume.boundaries {
                register(
                    boundary.surface.id(),
                    SurfaceAssociation {
                        volume: volume.id,
                        layer: None,
                        role: SurfaceRole::Boundary {
                            face: boundary.face,
                        },
                    },
                )?;
            }
        }

        log::debug!(
            "Built tracking geometry: {} volumes, {} layers, {} surfaces",
            self.volumes.len(),
            self.layers.len(),
            associations.len()
        );

        Ok(TrackingGeometry {
            volumes: self.volumes,
            layers: self.layers,
            world,
            associations,
        })
    }

    /// Ordered layers must be all planar with parallel normals, or all
    /// cylinders with parallel axes.
    fn check_orderable(&self, volume: VolumeId, ids: &[LayerId]) -> ExtrapolationResult<()> {
        let mut reference: Option<(bool, Vector3)> = None;
        for id in ids {
            let (cylindrical, axis) = match *self.layers[id.0].surface.shape() {
                SurfaceShape::Plane { normal, .. } | SurfaceShape::Disc { normal, .. } => {
                    (false, normal)
                }
                SurfaceShape::Cylinder { axis, .. } => (true, axis),
            };
            match reference {
                None => reference = Some((cylindrical, axis)),
                Some((ref_cyl, ref_axis)) => {
                    let aligned = if cylindrical {
                        ref_axis.dot(axis).abs() > PARALLEL_COS
                    } else {
                        ref_axis.dot(axis) > PARALLEL_COS
                    };
                    if ref_cyl != cylindrical || !aligned {
                        return Err(geometry_err(format!(
                            "layers of {volume} cannot be ordered; mark the volume unordered"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
