// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Trajectory extrapolation engine.
//!
//! Ports: `Propagator`, `Navigator`, `MaterialEffectsUpdator`
//! Engine: `Extrapolator` with its per-call `StateArena` and `NavigationCache`

pub mod arena;
pub mod cache;
pub mod extrapolator;
pub mod material_effects;
pub mod navigator;
pub mod propagator;
pub mod status;

pub use extrapolator::Extrapolator;
pub use material_effects::{
    BetheHighlandUpdator, MaterialEffectsOnTrack, MaterialEffectsUpdator, MaterialSlab,
    MaterialUpdate,
};
pub use navigator::{BoundaryCheck, GeometryNavigator, Navigator, NextVolume};
pub use propagator::{
    HelixStepper, PropagationResult, PropagationTarget, Propagator, StraightLinePropagator,
    TargetKind,
};
pub use status::{
    ExtrapolationOptions, ExtrapolationOutcome, ExtrapolationReport, NavigationBreak,
    VolumeResolution,
};
