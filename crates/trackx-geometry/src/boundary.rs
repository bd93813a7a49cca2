// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Volume Boundaries
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Volume boundary surfaces and the neighbour attached behind them.
//!
//! The neighbour is resolved from the global position of the crossing, not
//! from surface identity: a boundary may face several volumes, and which
//! one is entered depends on the side it is approached from.

use crate::material::MaterialProperties;
use crate::surface::Surface;
use trackx_math::Vector3;
use trackx_types::ids::VolumeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryFace {
    NegativeX,
    PositiveX,
    NegativeY,
    PositiveY,
    NegativeZ,
    PositiveZ,
    InnerCylinder,
    OuterCylinder,
}

/// What lies on the outer side of a boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Attachment {
    /// Whatever static volume contains the point just beyond the crossing.
    /// Resolved by the geometry through point location.
    #[default]
    Enclosing,
    /// A single neighbour, or nothing (world exit).
    Volume(Option<VolumeId>),
    /// Neighbours binned along `axis`: bin i spans `edges[i]..edges[i+1]`
    /// of the projection of the hit position.
    Binned {
        axis: Vector3,
        edges: Vec<f64>,
        volumes: Vec<Option<VolumeId>>,
    },
}

impl Attachment {
    /// Neighbour at `position` for explicit attachments; `None` for
    /// `Enclosing`, which needs the full geometry.
    pub fn resolve(&self, position: Vector3) -> Option<VolumeId> {
        match self {
            Attachment::Enclosing => None,
            Attachment::Volume(v) => *v,
            Attachment::Binned {
                axis,
                edges,
                volumes,
            } => {
                let x = position.dot(*axis);
                edges
                    .windows(2)
                    .position(|w| x >= w[0] && x <= w[1])
                    .and_then(|i| volumes.get(i).copied().flatten())
            }
        }
    }

    /// All volumes this attachment can resolve to.
    pub fn volumes(&self) -> Vec<VolumeId> {
        match self {
            Attachment::Enclosing => Vec::new(),
            Attachment::Volume(v) => v.iter().copied().collect(),
            Attachment::Binned { volumes, .. } => volumes.iter().flatten().copied().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundarySurface {
    pub(crate) surface: Surface,
    pub(crate) face: BoundaryFace,
    pub(crate) inside: VolumeId,
    pub(crate) outside: Attachment,
    /// +1 when the surface normal points out of `inside`, -1 otherwise.
    pub(crate) outward_sign: f64,
    pub(crate) material: Option<MaterialProperties>,
}

impl BoundarySurface {
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn face(&self) -> BoundaryFace {
        self.face
    }

    pub fn inside(&self) -> VolumeId {
        self.inside
    }

    pub fn outside(&self) -> &Attachment {
        &self.outside
    }

    pub fn material(&self) -> Option<&MaterialProperties> {
        self.material.as_ref()
    }

    pub fn outward_normal(&self, position: Vector3) -> Vector3 {
        self.surface.normal_at(position) * self.outward_sign
    }

    /// Moving along `motion` at `position`, does the track leave `inside`?
    pub fn is_exit(&self, position: Vector3, motion: Vector3) -> bool {
        motion.dot(self.outward_normal(position)) > 0.0
    }

    pub fn is_enclosing(&self) -> bool {
        matches!(self.outside, Attachment::Enclosing)
    }
}
