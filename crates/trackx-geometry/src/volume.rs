// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Tracking Volume
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Tracking volumes: closed regions with boundary surfaces, confined
//! layers, confined static sub-volumes and detached (possibly dense)
//! sub-volumes.

use crate::boundary::{Attachment, BoundaryFace, BoundarySurface};
use crate::material::MaterialProperties;
use crate::surface::Surface;
use trackx_math::Vector3;
use trackx_types::error::{ExtrapolationError, ExtrapolationResult};
use trackx_types::ids::{LayerId, VolumeId};

/// Axis-aligned volume shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeBounds {
    Cuboid {
        center: Vector3,
        half_x: f64,
        half_y: f64,
        half_z: f64,
    },
    /// Tube around the z axis through `center`; `r_min = 0` is a full cylinder.
    Cylinder {
        center: Vector3,
        r_min: f64,
        r_max: f64,
        half_z: f64,
    },
}

impl VolumeBounds {
    pub fn validate(&self) -> ExtrapolationResult<()> {
        match *self {
            VolumeBounds::Cuboid {
                center,
                half_x,
                half_y,
                half_z,
            } => {
                if !center.is_finite() {
                    return Err(ExtrapolationError::Geometry(
                        "cuboid center must be finite".to_string(),
                    ));
                }
                for (name, v) in [("half_x", half_x), ("half_y", half_y), ("half_z", half_z)] {
                    if !v.is_finite() || v <= 0.0 {
                        return Err(ExtrapolationError::Geometry(format!(
                            "cuboid {name} must be finite and > 0, got {v}"
                        )));
                    }
                }
            }
            VolumeBounds::Cylinder {
                center,
                r_min,
                r_max,
                half_z,
            } => {
                if !center.is_finite() {
                    return Err(ExtrapolationError::Geometry(
                        "cylinder center must be finite".to_string(),
                    ));
                }
                if !r_min.is_finite() || r_min < 0.0 || !r_max.is_finite() || r_max <= r_min {
                    return Err(ExtrapolationError::Geometry(format!(
                        "cylinder radii must satisfy 0 <= r_min < r_max, got r_min={r_min}, r_max={r_max}"
                    )));
                }
                if !half_z.is_finite() || half_z <= 0.0 {
                    return Err(ExtrapolationError::Geometry(format!(
                        "cylinder half_z must be finite and > 0, got {half_z}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn center(&self) -> Vector3 {
        match *self {
            VolumeBounds::Cuboid { center, .. } | VolumeBounds::Cylinder { center, .. } => center,
        }
    }

    pub fn inside(&self, position: Vector3, tol: f64) -> bool {
        match *self {
            VolumeBounds::Cuboid {
                center,
                half_x,
                half_y,
                half_z,
            } => {
                let d = position - center;
                d.x.abs() <= half_x + tol && d.y.abs() <= half_y + tol && d.z.abs() <= half_z + tol
            }
            VolumeBounds::Cylinder {
                center,
                r_min,
                r_max,
                half_z,
            } => {
                let d = position - center;
                let r = d.perp();
                r >= r_min - tol && r <= r_max + tol && d.z.abs() <= half_z + tol
            }
        }
    }

    /// Boundary surfaces with their face tag and outward sign.
    pub(crate) fn boundary_surfaces(&self) -> ExtrapolationResult<Vec<(BoundaryFace, Surface, f64)>> {
        let mut out = Vec::new();
        match *self {
            VolumeBounds::Cuboid {
                center,
                half_x,
                half_y,
                half_z,
            } => {
                let faces = [
                    (BoundaryFace::NegativeX, -Vector3::UNIT_X, Vector3::UNIT_Y, half_x, half_y, half_z),
                    (BoundaryFace::PositiveX, Vector3::UNIT_X, Vector3::UNIT_Y, half_x, half_y, half_z),
                    (BoundaryFace::NegativeY, -Vector3::UNIT_Y, Vector3::UNIT_X, half_y, half_x, half_z),
                    (BoundaryFace::PositiveY, Vector3::UNIT_Y, Vector3::UNIT_X, half_y, half_x, half_z),
                    (BoundaryFace::NegativeZ, -Vector3::UNIT_Z, Vector3::UNIT_X, half_z, half_x, half_y),
                    (BoundaryFace::PositiveZ, Vector3::UNIT_Z, Vector3::UNIT_X, half_z, half_x, half_y),
                ];
                for (face, normal, axis_u, offset, half_u, half_v) in faces {
                    let s = Surface::rectangle(center + normal * offset, normal, axis_u, half_u, half_v)?;
                    out.push((face, s, 1.0));
                }
            }
            VolumeBounds::Cylinder {
                center,
                r_min,
                r_max,
                half_z,
            } => {
                if r_min > 0.0 {
                    let inner = Surface::cylinder(center, Vector3::UNIT_Z, r_min, half_z)?;
                    out.push((BoundaryFace::InnerCylinder, inner, -1.0));
                }
                let outer = Surface::cylinder(center, Vector3::UNIT_Z, r_max, half_z)?;
                out.push((BoundaryFace::OuterCylinder, outer, 1.0));
                let neg = Surface::disc(
                    center - Vector3::UNIT_Z * half_z,
                    -Vector3::UNIT_Z,
                    r_min,
                    r_max,
                )?;
                out.push((BoundaryFace::NegativeZ, neg, 1.0));
                let pos = Surface::disc(
                    center + Vector3::UNIT_Z * half_z,
                    Vector3::UNIT_Z,
                    r_min,
                    r_max,
                )?;
                out.push((BoundaryFace::PositiveZ, pos, 1.0));
            }
        }
        Ok(out)
    }
}

/// How the layers confined in a volume are searched.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LayerArrangement {
    #[default]
    Empty,
    /// Sorted along the common normal and linked; walked with `next_layer`.
    Ordered(Vec<LayerId>),
    /// Arbitrary layers, all tested on every step.
    Unordered(Vec<LayerId>),
}

impl LayerArrangement {
    pub fn layers(&self) -> &[LayerId] {
        match self {
            LayerArrangement::Empty => &[],
            LayerArrangement::Ordered(v) | LayerArrangement::Unordered(v) => v,
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, LayerArrangement::Ordered(v) if !v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct TrackingVolume {
    pub(crate) id: VolumeId,
    pub(crate) name: String,
    pub(crate) bounds: VolumeBounds,
    pub(crate) boundaries: Vec<BoundarySurface>,
    pub(crate) layers: LayerArrangement,
    pub(crate) confined: Vec<VolumeId>,
    pub(crate) detached: Vec<VolumeId>,
    pub(crate) material: Option<MaterialProperties>,
    pub(crate) mother: Option<VolumeId>,
    pub(crate) is_detached: bool,
}

impl TrackingVolume {
    pub(crate) fn new(
        id: VolumeId,
        name: &str,
        bounds: VolumeBounds,
        mother: Option<VolumeId>,
        is_detached: bool,
    ) -> ExtrapolationResult<Self> {
        bounds.validate()?;
        let boundaries = bounds
            .boundary_surfaces()?
            .into_iter()
            .map(|(face, surface, outward_sign)| BoundarySurface {
                surface,
                face,
                inside: id,
                outside: Attachment::Enclosing,
                outward_sign,
                material: None,
            })
            .collect();
        Ok(TrackingVolume {
            id,
            name: name.to_string(),
            bounds,
            boundaries,
            layers: LayerArrangement::Empty,
            confined: Vec::new(),
            detached: Vec::new(),
            material: None,
            mother,
            is_detached,
        })
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> &VolumeBounds {
        &self.bounds
    }

    pub fn boundaries(&self) -> &[BoundarySurface] {
        &self.boundaries
    }

    pub fn boundary(&self, face: BoundaryFace) -> Option<&BoundarySurface> {
        self.boundaries.iter().find(|b| b.face == face)
    }

    pub fn layers(&self) -> &LayerArrangement {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.layers().len()
    }

    /// Static sub-volumes filling part of this volume.
    pub fn confined_volumes(&self) -> &[VolumeId] {
        &self.confined
    }

    /// Detached sub-volumes (local inhomogeneities).
    pub fn detached_volumes(&self) -> &[VolumeId] {
        &self.detached
    }

    pub fn material(&self) -> Option<&MaterialProperties> {
        self.material.as_ref()
    }

    pub fn mother(&self) -> Option<VolumeId> {
        self.mother
    }

    pub fn is_detached(&self) -> bool {
        self.is_detached
    }

    /// A detached volume filled with material integrated along the path.
    pub fn is_dense(&self) -> bool {
        self.is_detached && self.material.is_some()
    }

    pub fn inside(&self, position: Vector3, tol: f64) -> bool {
        self.bounds.inside(position, tol)
    }
}
