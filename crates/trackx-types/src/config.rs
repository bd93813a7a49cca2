// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{ExtrapolationError, ExtrapolationResult};
use serde::{Deserialize, Serialize};
use trackx_math::Vector3;

/// Magnetic-field policy forwarded untouched to the propagation port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FieldMode {
    NoField,
    /// Homogeneous field [T].
    Uniform { tesla: Vector3 },
}

impl Default for FieldMode {
    fn default() -> Self {
        FieldMode::NoField
    }
}

impl FieldMode {
    /// Field vector at any point; zero without field.
    pub fn field_tesla(&self) -> Vector3 {
        match self {
            FieldMode::NoField => Vector3::ZERO,
            FieldMode::Uniform { tesla } => *tesla,
        }
    }
}

/// How much of a material correction the updator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialUpdateMode {
    /// Record the traversal, leave the state untouched.
    NoOp,
    /// Inflate the covariance only; mean momentum stays unchanged.
    AddNoise,
    /// Energy loss on the mean plus covariance noise.
    Full,
}

impl Default for MaterialUpdateMode {
    fn default() -> Self {
        MaterialUpdateMode::Full
    }
}

/// Extrapolation engine configuration.
/// Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolatorConfig {
    /// Return `None` on a navigation break instead of trying the direct fallback.
    #[serde(default)]
    pub stop_with_navigation_break: bool,
    /// On absorption return the last valid state instead of `None`.
    #[serde(default)]
    pub return_last_valid_on_absorption: bool,
    #[serde(default = "default_true")]
    pub include_material_effects: bool,
    #[serde(default)]
    pub material_update_mode: MaterialUpdateMode,
    /// Apply the trailing part of the start layer material.
    #[serde(default = "default_true")]
    pub apply_start_post_update: bool,
    /// Apply the leading part of the destination layer material.
    #[serde(default = "default_true")]
    pub apply_destination_pre_update: bool,
    /// Hard ceiling on propagation calls per top-level call.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Ceiling on volume-to-volume hand-offs per top-level call.
    #[serde(default = "default_max_volume_transitions")]
    pub max_volume_transitions: usize,
    /// Minimum failed layer intersections tolerated in the layer walk.
    #[serde(default = "default_initial_layer_attempts")]
    pub initial_layer_attempts: usize,
    /// Failed intersections tolerated per layer of the walked volume.
    #[serde(default = "default_successive_layer_attempts")]
    pub successive_layer_attempts: usize,
    /// Forward progress below this is "no progress" for loop detection [mm].
    #[serde(default = "default_loop_tolerance")]
    pub loop_tolerance_mm: f64,
    /// Allowed growth of the distance to the destination between hand-offs [mm].
    #[serde(default = "default_distance_regression_tolerance")]
    pub distance_regression_tolerance_mm: f64,
    /// A state closer than this to the destination is already on it [mm].
    #[serde(default = "default_on_surface_tolerance")]
    pub on_surface_tolerance_mm: f64,
    /// Search sensitive sub-surfaces of crossed layers when collecting hits.
    #[serde(default = "default_true")]
    pub overlap_search: bool,
    /// Path window around a layer inside which sub-surface hits count [mm].
    #[serde(default = "default_overlap_tolerance")]
    pub overlap_tolerance_mm: f64,
    #[serde(default)]
    pub field: FieldMode,
}

fn default_true() -> bool {
    true
}
fn default_max_steps() -> usize {
    1000
}
fn default_max_volume_transitions() -> usize {
    200
}
fn default_initial_layer_attempts() -> usize {
    3
}
fn default_successive_layer_attempts() -> usize {
    1
}
fn default_loop_tolerance() -> f64 {
    0.01
}
fn default_distance_regression_tolerance() -> f64 {
    20.0
}
fn default_on_surface_tolerance() -> f64 {
    1e-4
}
fn default_overlap_tolerance() -> f64 {
    5.0
}

impl Default for ExtrapolatorConfig {
    fn default() -> Self {
        ExtrapolatorConfig {
            stop_with_navigation_break: false,
            return_last_valid_on_absorption: false,
            include_material_effects: default_true(),
            material_update_mode: MaterialUpdateMode::default(),
            apply_start_post_update: default_true(),
            apply_destination_pre_update: default_true(),
            max_steps: default_max_steps(),
            max_volume_transitions: default_max_volume_transitions(),
            initial_layer_attempts: default_initial_layer_attempts(),
            successive_layer_attempts: default_successive_layer_attempts(),
            loop_tolerance_mm: default_loop_tolerance(),
            distance_regression_tolerance_mm: default_distance_regression_tolerance(),
            on_surface_tolerance_mm: default_on_surface_tolerance(),
            overlap_search: default_true(),
            overlap_tolerance_mm: default_overlap_tolerance(),
            field: FieldMode::default(),
        }
    }
}

impl ExtrapolatorConfig {
    /// Load from JSON file and validate.
    pub fn from_file(path: &str) -> ExtrapolationResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExtrapolationResult<()> {
        if self.max_steps == 0 {
            return Err(ExtrapolationError::ConfigError(
                "max_steps must be >= 1".to_string(),
            ));
        }
        if self.max_volume_transitions == 0 {
            return Err(ExtrapolationError::ConfigError(
                "max_volume_transitions must be >= 1".to_string(),
            ));
        }
        for (name, value) in [
            ("loop_tolerance_mm", self.loop_tolerance_mm),
            (
                "distance_regression_tolerance_mm",
                self.distance_regression_tolerance_mm,
            ),
            ("on_surface_tolerance_mm", self.on_surface_tolerance_mm),
            ("overlap_tolerance_mm", self.overlap_tolerance_mm),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ExtrapolationError::ConfigError(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if let FieldMode::Uniform { tesla } = self.field {
            if !tesla.is_finite() {
                return Err(ExtrapolationError::ConfigError(
                    "field.tesla components must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}
