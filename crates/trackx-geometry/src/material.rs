// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Material Properties
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Material slab properties carried by layers, boundaries and dense volumes.

use trackx_types::error::{ExtrapolationError, ExtrapolationResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialProperties {
    /// Slab thickness [mm].
    pub thickness_mm: f64,
    /// Radiation length [mm].
    pub x0_mm: f64,
    /// Nuclear interaction length [mm].
    pub l0_mm: f64,
    /// Mass number.
    pub a: f64,
    /// Atomic number.
    pub z: f64,
    /// Density [g/cm³].
    pub density_g_cm3: f64,
}

impl MaterialProperties {
    pub fn new(
        thickness_mm: f64,
        x0_mm: f64,
        l0_mm: f64,
        a: f64,
        z: f64,
        density_g_cm3: f64,
    ) -> ExtrapolationResult<Self> {
        if !thickness_mm.is_finite() || thickness_mm < 0.0 {
            return Err(ExtrapolationError::InvalidMaterial(format!(
                "thickness_mm must be finite and >= 0, got {thickness_mm}"
            )));
        }
        for (name, value) in [
            ("x0_mm", x0_mm),
            ("l0_mm", l0_mm),
            ("a", a),
            ("z", z),
            ("density_g_cm3", density_g_cm3),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ExtrapolationError::InvalidMaterial(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        Ok(MaterialProperties {
            thickness_mm,
            x0_mm,
            l0_mm,
            a,
            z,
            density_g_cm3,
        })
    }

    pub fn silicon(thickness_mm: f64) -> Self {
        MaterialProperties {
            thickness_mm,
            x0_mm: 93.70,
            l0_mm: 465.2,
            a: 28.0855,
            z: 14.0,
            density_g_cm3: 2.329,
        }
    }

    pub fn beryllium(thickness_mm: f64) -> Self {
        MaterialProperties {
            thickness_mm,
            x0_mm: 352.8,
            l0_mm: 421.0,
            a: 9.012,
            z: 4.0,
            density_g_cm3: 1.848,
        }
    }

    pub fn aluminium(thickness_mm: f64) -> Self {
        MaterialProperties {
            thickness_mm,
            x0_mm: 88.97,
            l0_mm: 397.0,
            a: 26.98,
            z: 13.0,
            density_g_cm3: 2.699,
        }
    }

    pub fn iron(thickness_mm: f64) -> Self {
        MaterialProperties {
            thickness_mm,
            x0_mm: 17.57,
            l0_mm: 167.7,
            a: 55.845,
            z: 26.0,
            density_g_cm3: 7.874,
        }
    }

    pub fn lead(thickness_mm: f64) -> Self {
        MaterialProperties {
            thickness_mm,
            x0_mm: 5.612,
            l0_mm: 175.9,
            a: 207.2,
            z: 82.0,
            density_g_cm3: 11.35,
        }
    }

    /// Thickness in units of radiation length at normal incidence.
    pub fn thickness_in_x0(&self) -> f64 {
        self.thickness_mm / self.x0_mm
    }

    pub fn thickness_in_l0(&self) -> f64 {
        self.thickness_mm / self.l0_mm
    }

    pub fn z_over_a(&self) -> f64 {
        self.z / self.a
    }

    /// Same material with a different thickness, e.g. a path through a
    /// dense volume.
    pub fn with_thickness(&self, thickness_mm: f64) -> Self {
        MaterialProperties {
            thickness_mm: thickness_mm.max(0.0),
            ..*self
        }
    }
}
