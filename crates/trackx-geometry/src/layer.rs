// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Layer
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! A layer wraps one surface with optional material and optional sensitive
//! sub-surfaces. Ordered layers carry a singly-linked "next layer" relation
//! in each direction along their normal.

use crate::material::MaterialProperties;
use crate::surface::Surface;
use trackx_math::Vector3;
use trackx_types::ids::{LayerId, VolumeId};

/// Default fraction of the layer material in front of its reference surface.
pub const DEFAULT_PRE_FACTOR: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) surface: Surface,
    pub(crate) material: Option<MaterialProperties>,
    pub(crate) pre_factor: f64,
    pub(crate) sub_surfaces: Vec<Surface>,
    pub(crate) volume: VolumeId,
    pub(crate) next_along: Option<LayerId>,
    pub(crate) next_opposite: Option<LayerId>,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        surface: Surface,
        material: Option<MaterialProperties>,
        volume: VolumeId,
    ) -> Self {
        Layer {
            id,
            surface,
            material,
            pre_factor: DEFAULT_PRE_FACTOR,
            sub_surfaces: Vec::new(),
            volume,
            next_along: None,
            next_opposite: None,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn material(&self) -> Option<&MaterialProperties> {
        self.material.as_ref()
    }

    pub fn has_material(&self) -> bool {
        self.material.is_some()
    }

    pub fn sub_surfaces(&self) -> &[Surface] {
        &self.sub_surfaces
    }

    pub fn has_sub_surfaces(&self) -> bool {
        !self.sub_surfaces.is_empty()
    }

    /// Enclosing volume.
    pub fn volume(&self) -> VolumeId {
        self.volume
    }

    /// Half the material thickness; 0 for layers without material.
    pub fn half_thickness(&self) -> f64 {
        self.material.map_or(0.0, |m| 0.5 * m.thickness_mm)
    }

    /// Next layer when moving along `motion` from `position`.
    pub fn next_layer(&self, position: Vector3, motion: Vector3) -> Option<LayerId> {
        if motion.dot(self.surface.normal_at(position)) >= 0.0 {
            self.next_along
        } else {
            self.next_opposite
        }
    }

    /// Fraction of the material encountered before the reference surface
    /// when crossing with `motion`.
    pub fn material_pre_factor(&self, position: Vector3, motion: Vector3) -> f64 {
        if motion.dot(self.surface.normal_at(position)) >= 0.0 {
            self.pre_factor
        } else {
            1.0 - self.pre_factor
        }
    }
}
