// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Material Effects
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Material effects port and the Bethe/Highland reference updator.
//!
//! An update returns `None` when the particle stops in the material.

use trackx_geometry::MaterialProperties;
use trackx_math::linalg::add_to_diagonal;
use trackx_math::Vector3;
use trackx_types::config::MaterialUpdateMode;
use trackx_types::constants::{
    BETHE_K, ELECTRON_MASS_MEV, HIGHLAND_LOG_TERM, HIGHLAND_SCALE_MEV, IDX_PHI, IDX_QOP,
    IDX_THETA, MEAN_EXCITATION_SCALE_MEV,
};
use trackx_types::ids::SurfaceId;
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

/// Material crossed in one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSlab {
    pub material: MaterialProperties,
    /// 1/|cos α| of the crossing.
    pub path_correction: f64,
    /// Fraction of the material in front of the surface for this crossing.
    pub pre_factor: f64,
    pub surface: Option<SurfaceId>,
}

impl MaterialSlab {
    pub fn new(material: MaterialProperties, path_correction: f64, surface: Option<SurfaceId>) -> Self {
        MaterialSlab {
            material,
            path_correction,
            pre_factor: 1.0,
            surface,
        }
    }

    pub fn with_pre_factor(self, pre_factor: f64) -> Self {
        MaterialSlab {
            pre_factor: pre_factor.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Same crossing through `fraction` of the thickness.
    pub fn scaled(&self, fraction: f64) -> Self {
        MaterialSlab {
            material: self
                .material
                .with_thickness(self.material.thickness_mm * fraction.clamp(0.0, 1.0)),
            ..*self
        }
    }

    /// Traversed thickness in radiation lengths.
    pub fn thickness_in_x0(&self) -> f64 {
        self.material.thickness_in_x0() * self.path_correction
    }

    /// Traversed path [mm].
    pub fn path_mm(&self) -> f64 {
        self.material.thickness_mm * self.path_correction
    }
}

/// One entry of the material collection handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialEffectsOnTrack {
    pub thickness_in_x0: f64,
    /// Projected multiple-scattering width [rad].
    pub scattering_sigma: f64,
    /// Mean energy loss [MeV], positive for a loss along the motion.
    pub energy_loss_mean: f64,
    pub energy_loss_sigma: f64,
    pub surface: Option<SurfaceId>,
    pub position: Vector3,
}

#[derive(Debug, Clone)]
pub struct MaterialUpdate {
    pub parameters: TrackParameters,
    pub effects: MaterialEffectsOnTrack,
}

pub trait MaterialEffectsUpdator {
    /// Full correction for the whole slab.
    fn update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate>;

    /// Correction for the material in front of the surface.
    fn pre_update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        self.update(parameters, &slab.scaled(slab.pre_factor), direction, particle, mode)
    }

    /// Correction for the material behind the surface.
    fn post_update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        self.update(parameters, &slab.scaled(1.0 - slab.pre_factor), direction, particle, mode)
    }
}

impl<T: MaterialEffectsUpdator + ?Sized> MaterialEffectsUpdator for &T {
    fn update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        (**self).update(parameters, slab, direction, particle, mode)
    }

    fn pre_update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        (**self).pre_update(parameters, slab, direction, particle, mode)
    }

    fn post_update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        (**self).post_update(parameters, slab, direction, particle, mode)
    }
}

/// Highland scattering, Bethe ionisation (Bethe–Heitler for electrons).
#[derive(Debug, Clone, Copy, Default)]
pub struct BetheHighlandUpdator;

/// Highland projected scattering angle [rad] for `t` radiation lengths.
pub fn highland_sigma(t: f64, momentum: f64, beta: f64, charge: f64) -> f64 {
    if t <= 0.0 || momentum <= 0.0 || beta <= 0.0 || charge == 0.0 {
        return 0.0;
    }
    let z2 = charge * charge;
    let correction = (1.0 + HIGHLAND_LOG_TERM * (t * z2 / (beta * beta)).ln()).max(0.0);
    HIGHLAND_SCALE_MEV / (beta * momentum) * charge.abs() * t.sqrt() * correction
}

/// Mean ionisation loss [MeV] and Landau width [MeV] over `path_mm`.
pub fn bethe_loss(
    material: &MaterialProperties,
    path_mm: f64,
    momentum: f64,
    mass: f64,
    charge: f64,
) -> (f64, f64) {
    if path_mm <= 0.0 || mass <= 0.0 || charge == 0.0 {
        return (0.0, 0.0);
    }
    let energy = (momentum * momentum + mass * mass).sqrt();
    let beta = momentum / energy;
    let beta2 = beta * beta;
    let bg = momentum / mass;
    let excitation = MEAN_EXCITATION_SCALE_MEV * material.z.powf(0.9);
    let z2 = charge * charge;
    let areal = material.density_g_cm3 * path_mm * 0.1; // g/cm²
    let log_term = (2.0 * ELECTRON_MASS_MEV * bg * bg / excitation).ln() - beta2;
    let mean = (BETHE_K * z2 * material.z_over_a() / beta2 * log_term * areal).max(0.0);
    // FWHM of the Landau distribution is about 4ξ.
    let xi = 0.5 * BETHE_K * z2 * material.z_over_a() * areal / beta2;
    let sigma = 4.0 * xi / 2.355;
    (mean, sigma)
}

/// Bremsstrahlung loss [MeV]: mean and width of the Bethe–Heitler
/// distribution for `t` radiation lengths.
pub fn bethe_heitler_loss(energy: f64, t: f64) -> (f64, f64) {
    if t <= 0.0 {
        return (0.0, 0.0);
    }
    let mean = energy * (1.0 - (-t).exp());
    let var = (-t * 3f64.ln() / 2f64.ln()).exp() - (-2.0 * t).exp();
    (mean, energy * var.max(0.0).sqrt())
}

impl MaterialEffectsUpdator for BetheHighlandUpdator {
    fn update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        let t = slab.thickness_in_x0();
        let momentum = parameters.momentum();
        let charge = parameters.charge();
        let mass = particle.mass_mev();
        let energy = particle.energy(momentum);
        let beta = particle.beta(momentum);

        let mut effects = MaterialEffectsOnTrack {
            thickness_in_x0: t,
            scattering_sigma: 0.0,
            energy_loss_mean: 0.0,
            energy_loss_sigma: 0.0,
            surface: slab.surface,
            position: parameters.position(),
        };
        if !particle.interacts() || mode == MaterialUpdateMode::NoOp {
            return Some(MaterialUpdate {
                parameters: parameters.clone(),
                effects,
            });
        }

        let sigma_ms = highland_sigma(t, momentum, beta, charge);
        let (mean, sigma_e) = match particle {
            ParticleHypothesis::Electron if charge != 0.0 => bethe_heitler_loss(energy, t),
            _ => bethe_loss(&slab.material, slab.path_mm(), momentum, mass, charge),
        };
        effects.scattering_sigma = sigma_ms;
        effects.energy_loss_mean = mean;
        effects.energy_loss_sigma = sigma_e;

        let new_momentum = if mode == MaterialUpdateMode::Full {
            // Backward extrapolation undoes the loss.
            let new_energy = match direction {
                Direction::Backward => energy + mean,
                _ => energy - mean,
            };
            if new_energy <= mass {
                return None;
            }
            (new_energy * new_energy - mass * mass).sqrt()
        } else {
            momentum
        };
        if !(new_momentum.is_finite() && new_momentum > 0.0) {
            return None;
        }

        let covariance = parameters.covariance().map(|c| {
            let mut cov = c.clone();
            let var_ms = sigma_ms * sigma_ms;
            let sin_theta = parameters.theta().sin().abs().max(1e-6);
            add_to_diagonal(&mut cov, IDX_THETA, var_ms);
            add_to_diagonal(&mut cov, IDX_PHI, var_ms / (sin_theta * sin_theta));
            // σ(q/p) from σ(E): d(q/p)/dE = -q·E/p³.
            let p3 = new_momentum * new_momentum * new_momentum;
            let q = if charge == 0.0 { 1.0 } else { charge };
            let dqop = q * energy / p3 * sigma_e;
            add_to_diagonal(&mut cov, IDX_QOP, dqop * dqop);
            cov
        });

        Some(MaterialUpdate {
            parameters: parameters.with_momentum(new_momentum, covariance),
            effects,
        })
    }
}
