// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Bounded geometric surfaces: rectangle/infinite plane, disc, cylinder.
//!
//! A surface is identified by its `SurfaceId`; clones share the id and are
//! the same surface for navigation purposes.

use trackx_math::Vector3;
use trackx_types::error::{ExtrapolationError, ExtrapolationResult};
use trackx_types::ids::SurfaceId;

/// Below this |n·d| a line is parallel to a planar surface.
const PARALLEL_EPS: f64 = 1e-12;

/// Cap on 1/|cos α| for grazing incidence.
const MAX_PATH_CORRECTION: f64 = 1.0e3;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceShape {
    /// Rectangle with half extents along `axis_u` and `normal × axis_u`.
    /// Infinite half extents give an unbounded plane.
    Plane {
        center: Vector3,
        normal: Vector3,
        axis_u: Vector3,
        half_u: f64,
        half_v: f64,
    },
    /// Annulus r_min ≤ r ≤ r_max in the plane through `center`.
    Disc {
        center: Vector3,
        normal: Vector3,
        r_min: f64,
        r_max: f64,
    },
    /// Cylinder of `radius` around the line `center + t·axis`, |t| ≤ half_length.
    Cylinder {
        center: Vector3,
        axis: Vector3,
        radius: f64,
        half_length: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    id: SurfaceId,
    shape: SurfaceShape,
}

fn require_finite_point(v: Vector3, label: &str) -> ExtrapolationResult<()> {
    if !v.is_finite() {
        return Err(ExtrapolationError::Geometry(format!(
            "{label} components must be finite"
        )));
    }
    Ok(())
}

fn require_unit(v: Vector3, label: &str) -> ExtrapolationResult<Vector3> {
    v.normalized().ok_or_else(|| {
        ExtrapolationError::Geometry(format!("{label} must be finite and non-null"))
    })
}

fn require_positive_extent(value: f64, label: &str) -> ExtrapolationResult<()> {
    // +inf is an unbounded extent, NaN and non-positive values are not.
    if value.is_nan() || value <= 0.0 {
        return Err(ExtrapolationError::Geometry(format!(
            "{label} must be > 0, got {value}"
        )));
    }
    Ok(())
}

impl Surface {
    /// Rectangle with an explicit in-plane `axis_u`.
    pub fn rectangle(
        center: Vector3,
        normal: Vector3,
        axis_u: Vector3,
        half_u: f64,
        half_v: f64,
    ) -> ExtrapolationResult<Self> {
        require_finite_point(center, "plane center")?;
        let normal = require_unit(normal, "plane normal")?;
        let axis_u = require_unit(axis_u.reject_from(normal), "plane axis_u")?;
        require_positive_extent(half_u, "plane half_u")?;
        require_positive_extent(half_v, "plane half_v")?;
        Ok(Surface {
            id: SurfaceId::next(),
            shape: SurfaceShape::Plane {
                center,
                normal,
                axis_u,
                half_u,
                half_v,
            },
        })
    }

    /// Rectangle with an arbitrary in-plane orientation.
    pub fn plane(
        center: Vector3,
        normal: Vector3,
        half_u: f64,
        half_v: f64,
    ) -> ExtrapolationResult<Self> {
        let n = require_unit(normal, "plane normal")?;
        Self::rectangle(center, n, n.any_orthogonal(), half_u, half_v)
    }

    pub fn unbounded_plane(center: Vector3, normal: Vector3) -> ExtrapolationResult<Self> {
        Self::plane(center, normal, f64::INFINITY, f64::INFINITY)
    }

    pub fn disc(
        center: Vector3,
        normal: Vector3,
        r_min: f64,
        r_max: f64,
    ) -> ExtrapolationResult<Self> {
        require_finite_point(center, "disc center")?;
        let normal = require_unit(normal, "disc normal")?;
        if !r_min.is_finite() || r_min < 0.0 {
            return Err(ExtrapolationError::Geometry(format!(
                "disc r_min must be finite and >= 0, got {r_min}"
            )));
        }
        if r_max.is_nan() || r_max <= r_min {
            return Err(ExtrapolationError::Geometry(format!(
                "disc r_max must exceed r_min, got r_min={r_min}, r_max={r_max}"
            )));
        }
        Ok(Surface {
            id: SurfaceId::next(),
            shape: SurfaceShape::Disc {
                center,
                normal,
                r_min,
                r_max,
            },
        })
    }

    pub fn cylinder(
        center: Vector3,
        axis: Vector3,
        radius: f64,
        half_length: f64,
    ) -> ExtrapolationResult<Self> {
        require_finite_point(center, "cylinder center")?;
        let axis = require_unit(axis, "cylinder axis")?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ExtrapolationError::Geometry(format!(
                "cylinder radius must be finite and > 0, got {radius}"
            )));
        }
        require_positive_extent(half_length, "cylinder half_length")?;
        Ok(Surface {
            id: SurfaceId::next(),
            shape: SurfaceShape::Cylinder {
                center,
                axis,
                radius,
                half_length,
            },
        })
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn shape(&self) -> &SurfaceShape {
        &self.shape
    }

    pub fn center(&self) -> Vector3 {
        match self.shape {
            SurfaceShape::Plane { center, .. }
            | SurfaceShape::Disc { center, .. }
            | SurfaceShape::Cylinder { center, .. } => center,
        }
    }

    /// A point lying on the surface, used for point-location queries.
    pub fn reference_point(&self) -> Vector3 {
        match self.shape {
            SurfaceShape::Plane { center, .. } => center,
            SurfaceShape::Disc {
                center,
                normal,
                r_min,
                r_max,
            } => center + normal.any_orthogonal() * (0.5 * (r_min + r_max)),
            SurfaceShape::Cylinder {
                center,
                axis,
                radius,
                ..
            } => center + axis.any_orthogonal() * radius,
        }
    }

    /// Unit normal at (or nearest to) `position`; radial for cylinders.
    pub fn normal_at(&self, position: Vector3) -> Vector3 {
        match self.shape {
            SurfaceShape::Plane { normal, .. } | SurfaceShape::Disc { normal, .. } => normal,
            SurfaceShape::Cylinder { center, axis, .. } => (position - center)
                .reject_from(axis)
                .normalized()
                .unwrap_or_else(|| axis.any_orthogonal()),
        }
    }

    /// Signed distance to the unbounded surface: along the normal for planar
    /// shapes, radial excess for cylinders.
    pub fn signed_distance(&self, position: Vector3) -> f64 {
        match self.shape {
            SurfaceShape::Plane { center, normal, .. }
            | SurfaceShape::Disc { center, normal, .. } => normal.dot(position - center),
            SurfaceShape::Cylinder {
                center,
                axis,
                radius,
                ..
            } => (position - center).reject_from(axis).norm() - radius,
        }
    }

    pub fn distance(&self, position: Vector3) -> f64 {
        self.signed_distance(position).abs()
    }

    /// Bounds test of a point assumed to lie on the surface.
    pub fn inside_bounds(&self, position: Vector3, tol: f64) -> bool {
        match self.shape {
            SurfaceShape::Plane {
                center,
                normal,
                axis_u,
                half_u,
                half_v,
            } => {
                let d = position - center;
                let axis_v = normal.cross(axis_u);
                d.dot(axis_u).abs() <= half_u + tol && d.dot(axis_v).abs() <= half_v + tol
            }
            SurfaceShape::Disc {
                center,
                normal,
                r_min,
                r_max,
            } => {
                let r = (position - center).reject_from(normal).norm();
                r >= r_min - tol && r <= r_max + tol
            }
            SurfaceShape::Cylinder {
                center,
                axis,
                half_length,
                ..
            } => (position - center).dot(axis).abs() <= half_length + tol,
        }
    }

    pub fn is_on_surface(&self, position: Vector3, tol: f64, bounds_check: bool) -> bool {
        self.distance(position) <= tol && (!bounds_check || self.inside_bounds(position, tol))
    }

    /// Signed path lengths s at which `position + s·direction` meets the
    /// unbounded surface, ascending. Bounds are not applied.
    pub fn straight_line_intersections(&self, position: Vector3, direction: Vector3) -> Vec<f64> {
        match self.shape {
            SurfaceShape::Plane { center, normal, .. }
            | SurfaceShape::Disc { center, normal, .. } => {
                let denom = normal.dot(direction);
                if denom.abs() < PARALLEL_EPS {
                    return Vec::new();
                }
                vec![normal.dot(center - position) / denom]
            }
            SurfaceShape::Cylinder {
                center,
                axis,
                radius,
                ..
            } => {
                let dp = (position - center).reject_from(axis);
                let dd = direction.reject_from(axis);
                let a = dd.norm_squared();
                if a < PARALLEL_EPS {
                    return Vec::new();
                }
                let b = 2.0 * dp.dot(dd);
                let c = dp.norm_squared() - radius * radius;
                let disc = b * b - 4.0 * a * c;
                if disc < 0.0 {
                    return Vec::new();
                }
                let sq = disc.sqrt();
                // Numerically stable root pair.
                let q = -0.5 * (b + b.signum() * sq);
                let (mut s1, mut s2) = if q.abs() > 0.0 {
                    (q / a, c / q)
                } else {
                    (-0.5 * b / a, -0.5 * b / a)
                };
                if s1 > s2 {
                    std::mem::swap(&mut s1, &mut s2);
                }
                if (s2 - s1).abs() < PARALLEL_EPS {
                    vec![s1]
                } else {
                    vec![s1, s2]
                }
            }
        }
    }

    /// 1/|cos α| between `direction` and the local normal, capped for
    /// grazing incidence.
    pub fn path_correction(&self, position: Vector3, direction: Vector3) -> f64 {
        let cos = self.normal_at(position).dot(direction).abs();
        if cos * MAX_PATH_CORRECTION <= 1.0 {
            MAX_PATH_CORRECTION
        } else {
            1.0 / cos
        }
    }

    /// Sort key for ordered layer arrays: position along the normal for
    /// planar shapes, radius for cylinders.
    pub fn ordering_key(&self) -> f64 {
        match self.shape {
            SurfaceShape::Plane { center, normal, .. }
            | SurfaceShape::Disc { center, normal, .. } => normal.dot(center),
            SurfaceShape::Cylinder { radius, .. } => radius,
        }
    }
}
