// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Integration Test Fixtures
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Shared geometries and scripted port implementations.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trackx_core::{
    BetheHighlandUpdator, BoundaryCheck, GeometryNavigator, MaterialEffectsUpdator, MaterialSlab,
    MaterialUpdate, Navigator, NextVolume, PropagationResult, PropagationTarget, Propagator,
    StraightLinePropagator, TargetKind,
};
use trackx_geometry::{
    Attachment, BoundaryFace, MaterialProperties, Surface, TrackingGeometry,
    TrackingGeometryBuilder, VolumeBounds,
};
use trackx_math::Vector3;
use trackx_types::config::{ExtrapolatorConfig, FieldMode, MaterialUpdateMode};
use trackx_types::ids::{LayerId, VolumeId};
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config_path(relative: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(relative)
        .to_string_lossy()
        .to_string()
}

pub fn load_config(name: &str) -> ExtrapolatorConfig {
    ExtrapolatorConfig::from_file(&config_path(&format!("configs/{name}")))
        .expect("shipped config should load")
}

pub fn track_along_x(x: f64, y: f64, momentum: f64) -> TrackParameters {
    TrackParameters::new(Vector3::new(x, y, 0.0), Vector3::UNIT_X, momentum, -1.0).unwrap()
}

pub fn x_plane(x: f64) -> Surface {
    Surface::plane(Vector3::new(x, 0.0, 0.0), Vector3::UNIT_X, 90.0, 90.0).unwrap()
}

fn slab_bounds(cx: f64, half_x: f64) -> VolumeBounds {
    VolumeBounds::Cuboid {
        center: Vector3::new(cx, 0.0, 0.0),
        half_x,
        half_y: 100.0,
        half_z: 100.0,
    }
}

// ── Geometries ───────────────────────────────────────────────────────

/// World x ∈ [0, 300] split into A = [0, 100], B = [100, 200] and
/// C = [200, 300], no material.
pub struct ThreeSlabs {
    pub geometry: Arc<TrackingGeometry>,
    pub world: VolumeId,
    pub a: VolumeId,
    pub b: VolumeId,
    pub c: VolumeId,
}

pub fn three_slabs() -> ThreeSlabs {
    let mut builder = TrackingGeometryBuilder::new();
    let world = builder.add_world("world", slab_bounds(150.0, 150.0)).unwrap();
    let a = builder.add_volume("a", slab_bounds(50.0, 50.0), world).unwrap();
    let b = builder.add_volume("b", slab_bounds(150.0, 50.0), world).unwrap();
    let c = builder.add_volume("c", slab_bounds(250.0, 50.0), world).unwrap();
    ThreeSlabs {
        geometry: Arc::new(builder.build().unwrap()),
        world,
        a,
        b,
        c,
    }
}

/// Same slabs with a cyclic boundary graph: leaving B forward re-enters A
/// and leaving A backward re-enters B.
pub fn cyclic_slabs() -> Arc<TrackingGeometry> {
    let mut builder = TrackingGeometryBuilder::new();
    let world = builder.add_world("world", slab_bounds(150.0, 150.0)).unwrap();
    let a = builder.add_volume("a", slab_bounds(50.0, 50.0), world).unwrap();
    let b = builder.add_volume("b", slab_bounds(150.0, 50.0), world).unwrap();
    builder.glue(a, BoundaryFace::PositiveX, b, BoundaryFace::NegativeX).unwrap();
    builder
        .attach(b, BoundaryFace::PositiveX, Attachment::Volume(Some(a)))
        .unwrap();
    builder
        .attach(a, BoundaryFace::NegativeX, Attachment::Volume(Some(b)))
        .unwrap();
    Arc::new(builder.build().unwrap())
}

/// World x ∈ [0, 1000] with a tracker x ∈ [0, 500] holding `n` evenly
/// spaced silicon planes of `thickness` mm.
pub fn slab_tracker(n: usize, thickness: f64, unordered: bool) -> (Arc<TrackingGeometry>, Vec<LayerId>) {
    let mut builder = TrackingGeometryBuilder::new();
    let world = builder.add_world("world", slab_bounds(500.0, 500.0)).unwrap();
    let tracker = builder
        .add_volume("tracker", slab_bounds(250.0, 250.0), world)
        .unwrap();
    let pitch = 400.0 / n as f64;
    let layers = (0..n)
        .map(|i| {
            let x = 50.0 + pitch * (i as f64 + 0.5);
            builder
                .add_layer(tracker, x_plane(x), Some(MaterialProperties::silicon(thickness)))
                .unwrap()
        })
        .collect();
    if unordered {
        builder.set_unordered(tracker).unwrap();
    }
    (Arc::new(builder.build().unwrap()), layers)
}

/// Cylindrical barrel with silicon layers at r = 100, 200, 300, 400 inside
/// a world cylinder.
pub fn barrel() -> (Arc<TrackingGeometry>, Vec<LayerId>) {
    let mut builder = TrackingGeometryBuilder::new();
    let world = builder
        .add_world(
            "world",
            VolumeBounds::Cylinder {
                center: Vector3::ZERO,
                r_min: 0.0,
                r_max: 1000.0,
                half_z: 1500.0,
            },
        )
        .unwrap();
    let barrel = builder
        .add_volume(
            "barrel",
            VolumeBounds::Cylinder {
                center: Vector3::ZERO,
                r_min: 0.0,
                r_max: 500.0,
                half_z: 800.0,
            },
            world,
        )
        .unwrap();
    let layers = [100.0, 200.0, 300.0, 400.0]
        .iter()
        .map(|&r| {
            let s = Surface::cylinder(Vector3::ZERO, Vector3::UNIT_Z, r, 700.0).unwrap();
            builder
                .add_layer(barrel, s, Some(MaterialProperties::silicon(0.3)))
                .unwrap()
        })
        .collect();
    (Arc::new(builder.build().unwrap()), layers)
}

// ── Scripted ports ───────────────────────────────────────────────────

/// Propagator replaying boundary hits: each scripted entry lands on the
/// first boundary target, moved by the given signed offset [mm] along the
/// momentum. Once the script is used up it propagates straight.
#[derive(Debug, Default)]
pub struct ScriptedPropagator {
    script: RefCell<VecDeque<f64>>,
    line: StraightLinePropagator,
}

impl ScriptedPropagator {
    pub fn new(offsets: &[f64]) -> Self {
        ScriptedPropagator {
            script: RefCell::new(offsets.iter().copied().collect()),
            line: StraightLinePropagator::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.borrow().len()
    }
}

impl Propagator for ScriptedPropagator {
    fn propagate(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
        field: &FieldMode,
        particle: ParticleHypothesis,
        volume: Option<VolumeId>,
    ) -> Option<PropagationResult> {
        let boundary = targets
            .iter()
            .find(|t| matches!(t.kind, TargetKind::Boundary { .. }));
        if let Some(target) = boundary {
            if let Some(offset) = self.script.borrow_mut().pop_front() {
                let position = parameters.position() + parameters.direction() * offset;
                return Some(PropagationResult {
                    parameters: parameters.transported(
                        position,
                        parameters.direction(),
                        Some(target.surface.id()),
                        None,
                    ),
                    hits: vec![target.kind],
                    path_length: offset,
                });
            }
        }
        self.line
            .propagate(parameters, targets, direction, field, particle, volume)
    }
}

/// Navigator overriding the volume behind a boundary from a script.
/// Scripted answers only apply to states sitting on a surface; free states
/// get the geometric answer.
#[derive(Debug)]
pub struct ScriptedNavigator {
    inner: GeometryNavigator,
    neighbors: RefCell<VecDeque<Option<VolumeId>>>,
}

impl ScriptedNavigator {
    pub fn new(geometry: Arc<TrackingGeometry>, neighbors: &[Option<VolumeId>]) -> Self {
        ScriptedNavigator {
            inner: GeometryNavigator::new(geometry),
            neighbors: RefCell::new(neighbors.iter().copied().collect()),
        }
    }
}

impl Navigator for ScriptedNavigator {
    fn geometry(&self) -> &TrackingGeometry {
        self.inner.geometry()
    }

    fn volume_containing(&self, position: Vector3) -> Option<VolumeId> {
        self.inner.volume_containing(position)
    }

    fn at_volume_boundary(
        &self,
        parameters: &TrackParameters,
        volume: VolumeId,
        direction: Direction,
    ) -> BoundaryCheck {
        if parameters.surface().is_some() {
            if let Some(neighbor) = self.neighbors.borrow_mut().pop_front() {
                return BoundaryCheck {
                    at_boundary: true,
                    neighbor,
                    face: None,
                };
            }
        }
        self.inner.at_volume_boundary(parameters, volume, direction)
    }

    fn next_volume(
        &self,
        propagator: &dyn Propagator,
        parameters: &TrackParameters,
        direction: Direction,
        from: VolumeId,
        field: &FieldMode,
        particle: ParticleHypothesis,
    ) -> Option<NextVolume> {
        self.inner
            .next_volume(propagator, parameters, direction, from, field, particle)
    }
}

/// Straight-line propagator that cannot reach any volume boundary.
#[derive(Debug, Default)]
pub struct BoundaryBlindPropagator {
    line: StraightLinePropagator,
}

impl Propagator for BoundaryBlindPropagator {
    fn propagate(
        &self,
        parameters: &TrackParameters,
        targets: &[PropagationTarget<'_>],
        direction: Direction,
        field: &FieldMode,
        particle: ParticleHypothesis,
        volume: Option<VolumeId>,
    ) -> Option<PropagationResult> {
        if targets
            .iter()
            .any(|t| matches!(t.kind, TargetKind::Boundary { .. }))
        {
            return None;
        }
        self.line
            .propagate(parameters, targets, direction, field, particle, volume)
    }
}

/// Bethe/Highland updator counting every call.
#[derive(Debug, Default)]
pub struct CountingUpdator {
    inner: BetheHighlandUpdator,
    calls: AtomicUsize,
}

impl CountingUpdator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl MaterialEffectsUpdator for CountingUpdator {
    fn update(
        &self,
        parameters: &TrackParameters,
        slab: &MaterialSlab,
        direction: Direction,
        particle: ParticleHypothesis,
        mode: MaterialUpdateMode,
    ) -> Option<MaterialUpdate> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.update(parameters, slab, direction, particle, mode)
    }
}
