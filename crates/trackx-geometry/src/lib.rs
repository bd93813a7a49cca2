// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Geometry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Tracking geometry model: surfaces, material, layers, volumes.
//!
//! The geometry is built once with `TrackingGeometryBuilder` and is
//! read-only afterwards.

pub mod boundary;
pub mod builder;
pub mod layer;
pub mod material;
pub mod surface;
pub mod tracking_geometry;
pub mod volume;

pub use boundary::{Attachment, BoundaryFace, BoundarySurface};
pub use builder::TrackingGeometryBuilder;
pub use layer::Layer;
pub use material::MaterialProperties;
pub use surface::{Surface, SurfaceShape};
pub use tracking_geometry::{SurfaceAssociation, SurfaceRole, TrackingGeometry};
pub use volume::{LayerArrangement, TrackingVolume, VolumeBounds};
