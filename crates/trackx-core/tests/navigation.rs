// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Navigation Integration Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Volume-to-volume navigation: break conditions, the direct fallback,
//! direction resolution and shared use across threads.

mod common;

use common::{
    init_logging, slab_tracker, three_slabs, track_along_x, x_plane, BoundaryBlindPropagator,
    ScriptedNavigator, ScriptedPropagator,
};
use std::sync::Arc;
use trackx_core::{
    BetheHighlandUpdator, ExtrapolationOptions, ExtrapolationReport, Extrapolator,
    GeometryNavigator, NavigationBreak, StraightLinePropagator, VolumeResolution,
};
use trackx_geometry::{Surface, TrackingGeometry};
use trackx_math::Vector3;
use trackx_types::config::ExtrapolatorConfig;
use trackx_types::ids::VolumeId;
use trackx_types::particle::{Direction, ParticleHypothesis};

type LineEngine = Extrapolator<StraightLinePropagator, GeometryNavigator, BetheHighlandUpdator>;
type ScriptedEngine = Extrapolator<ScriptedPropagator, ScriptedNavigator, BetheHighlandUpdator>;

fn strict() -> ExtrapolatorConfig {
    ExtrapolatorConfig {
        stop_with_navigation_break: true,
        ..Default::default()
    }
}

fn line_engine(geometry: &Arc<TrackingGeometry>, config: ExtrapolatorConfig) -> LineEngine {
    Extrapolator::new(
        StraightLinePropagator::new(),
        GeometryNavigator::new(geometry.clone()),
        BetheHighlandUpdator,
        config,
    )
    .unwrap()
}

fn scripted_engine(
    geometry: &Arc<TrackingGeometry>,
    offsets: &[f64],
    neighbors: &[Option<VolumeId>],
    config: ExtrapolatorConfig,
) -> ScriptedEngine {
    Extrapolator::new(
        ScriptedPropagator::new(offsets),
        ScriptedNavigator::new(geometry.clone(), neighbors),
        BetheHighlandUpdator,
        config,
    )
    .unwrap()
}

fn muon(direction: Direction) -> ExtrapolationOptions {
    ExtrapolationOptions::new(direction, ParticleHypothesis::Muon)
}

// ── Plain navigation ─────────────────────────────────────────────────

#[test]
fn test_crosses_three_volumes() {
    init_logging();
    let slabs = three_slabs();
    let engine = line_engine(&slabs.geometry, ExtrapolatorConfig::default());
    let dest = x_plane(250.0);
    let out = engine.extrapolate_with(&track_along_x(10.0, 1.0, 1000.0), Some(&dest), &muon(Direction::Forward));

    let p = out.parameters.expect("destination reached");
    assert!((p.position().x - 250.0).abs() < 1e-9);
    assert_eq!(p.surface(), Some(dest.id()));
    assert_eq!(out.report.visited_volumes, vec![slabs.a, slabs.b, slabs.c]);
    assert_eq!(out.report.start_resolution, Some(VolumeResolution::PointLocation));
    assert_eq!(out.report.cache_resolutions, 3);
    assert!(!out.report.fallback_used);
}

#[test]
fn test_blind_walk_reports_every_boundary() {
    init_logging();
    let slabs = three_slabs();
    let engine = line_engine(&slabs.geometry, ExtrapolatorConfig::default());
    let states = engine.extrapolate_blindly(
        &track_along_x(10.0, 1.0, 1000.0),
        Direction::Forward,
        ParticleHypothesis::Muon,
    );
    let xs: Vec<f64> = states.iter().map(|s| s.position().x).collect();
    assert_eq!(xs.len(), 3);
    for (x, expected) in xs.iter().zip([100.0, 200.0, 300.0]) {
        assert!((x - expected).abs() < 1e-9, "{xs:?}");
    }
}

#[test]
fn test_backward_through_volumes() {
    let slabs = three_slabs();
    let engine = line_engine(&slabs.geometry, ExtrapolatorConfig::default());
    let out = engine.extrapolate_with(
        &track_along_x(280.0, 1.0, 1000.0),
        Some(&x_plane(30.0)),
        &muon(Direction::Backward),
    );
    assert!((out.parameters.unwrap().position().x - 30.0).abs() < 1e-9);
    assert_eq!(out.report.visited_volumes, vec![slabs.c, slabs.b, slabs.a]);
}

// ── Direction resolution ─────────────────────────────────────────────

#[test]
fn test_either_resolves_from_trial_propagation() {
    let slabs = three_slabs();
    let engine = line_engine(&slabs.geometry, ExtrapolatorConfig::default());
    let start = track_along_x(150.0, 1.0, 1000.0);

    let behind = engine.extrapolate_with(&start, Some(&x_plane(50.0)), &muon(Direction::Either));
    assert_eq!(behind.report.direction, Some(Direction::Backward));
    assert!((behind.parameters.unwrap().position().x - 50.0).abs() < 1e-9);

    let ahead = engine.extrapolate_with(&start, Some(&x_plane(250.0)), &muon(Direction::Either));
    assert_eq!(ahead.report.direction, Some(Direction::Forward));
    assert!(ahead.parameters.is_some());
}

#[test]
fn test_either_falls_back_to_projection() {
    let slabs = three_slabs();
    let engine = line_engine(&slabs.geometry, ExtrapolatorConfig::default());
    let start = track_along_x(150.0, 1.0, 1000.0);
    // Parallel to the motion: no trial intersection exists.
    let ahead = Surface::plane(Vector3::new(250.0, 50.0, 0.0), Vector3::UNIT_Y, 20.0, 20.0).unwrap();
    let behind = Surface::plane(Vector3::new(50.0, 50.0, 0.0), Vector3::UNIT_Y, 20.0, 20.0).unwrap();

    let out = engine.extrapolate_with(&start, Some(&ahead), &muon(Direction::Either));
    assert_eq!(out.report.direction, Some(Direction::Forward));
    assert!(out.parameters.is_none());

    let out = engine.extrapolate_with(&start, Some(&behind), &muon(Direction::Either));
    assert_eq!(out.report.direction, Some(Direction::Backward));
}

// ── Break conditions ─────────────────────────────────────────────────

#[test]
fn test_second_oscillation_breaks() {
    init_logging();
    let slabs = three_slabs();
    let neighbors = [Some(slabs.b), Some(slabs.a), Some(slabs.b)];
    let engine = scripted_engine(&slabs.geometry, &[10.0, 10.0, 10.0], &neighbors, strict());
    let out = engine.extrapolate_with(
        &track_along_x(10.0, 1.0, 1000.0),
        Some(&x_plane(250.0)),
        &muon(Direction::Forward),
    );
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::Oscillation));
    assert_eq!(out.report.visited_volumes, vec![slabs.a, slabs.b, slabs.a]);
    assert!(!out.report.fallback_used);
}

#[test]
fn test_single_oscillation_is_tolerated() {
    init_logging();
    let slabs = three_slabs();
    let neighbors = [Some(slabs.b), Some(slabs.a), Some(slabs.c)];
    let engine = scripted_engine(&slabs.geometry, &[10.0, 10.0, 10.0], &neighbors, strict());
    let out = engine.extrapolate_with(
        &track_along_x(10.0, 1.0, 1000.0),
        Some(&x_plane(250.0)),
        &muon(Direction::Forward),
    );
    let p = out.parameters.expect("second volume sequence reaches the destination");
    assert!((p.position().x - 250.0).abs() < 1e-9);
    assert_eq!(out.report.navigation_break, None);
    assert_eq!(
        out.report.visited_volumes,
        vec![slabs.a, slabs.b, slabs.a, slabs.c]
    );
    assert_eq!(engine.propagator().remaining(), 0);
}

#[test]
fn test_reentry_without_progress_is_a_loop() {
    let slabs = three_slabs();
    let start = track_along_x(50.0, 1.0, 1000.0);
    let dest = x_plane(250.0);

    let engine = scripted_engine(&slabs.geometry, &[0.0], &[Some(slabs.a)], strict());
    let out = engine.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::Loop));

    let engine = scripted_engine(
        &slabs.geometry,
        &[0.0],
        &[Some(slabs.a)],
        ExtrapolatorConfig::default(),
    );
    let out = engine.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert!(out.report.fallback_used);
    assert!((out.parameters.unwrap().position().x - 250.0).abs() < 1e-9);
}

#[test]
fn test_growing_distance_breaks() {
    let slabs = three_slabs();
    let start = track_along_x(50.0, 1.0, 1000.0);
    let dest = x_plane(250.0);

    // Lands 25 mm behind the start, beyond the 20 mm tolerance.
    let engine = scripted_engine(&slabs.geometry, &[-25.0], &[Some(slabs.b)], strict());
    let out = engine.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::DistanceRegression));

    let engine = scripted_engine(
        &slabs.geometry,
        &[-25.0],
        &[Some(slabs.b)],
        ExtrapolatorConfig::default(),
    );
    let out = engine.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::DistanceRegression));
    assert!(out.report.fallback_used);
    assert!((out.parameters.unwrap().position().x - 250.0).abs() < 1e-9);
}

#[test]
fn test_missing_volume_behind_boundary() {
    let slabs = three_slabs();
    let start = track_along_x(50.0, 1.0, 1000.0);
    let dest = x_plane(250.0);

    let engine = scripted_engine(&slabs.geometry, &[10.0], &[None], strict());
    let out = engine.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::MissingVolume));

    // Collecting sensitive hits treats the same gap as the end of the walk.
    let engine = scripted_engine(&slabs.geometry, &[10.0], &[None], strict());
    let out = engine.extrapolate_with(
        &start,
        Some(&dest),
        &muon(Direction::Forward).collect_sensitive(true),
    );
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, None);
}

#[test]
fn test_step_limit_then_uncounted_fallback() {
    let (geometry, _layers) = slab_tracker(4, 0.3, false);
    let dest = x_plane(800.0);
    let start = track_along_x(10.0, 1.0, 1000.0);
    let options = muon(Direction::Forward).collect_material(true);

    let engine = line_engine(
        &geometry,
        ExtrapolatorConfig {
            max_steps: 2,
            ..strict()
        },
    );
    let out = engine.extrapolate_with(&start, Some(&dest), &options);
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::StepLimit));
    assert_eq!(out.report.steps, 2);

    let engine = line_engine(
        &geometry,
        ExtrapolatorConfig {
            max_steps: 2,
            ..Default::default()
        },
    );
    let out = engine.extrapolate_with(&start, Some(&dest), &options);
    assert!(out.report.fallback_used);
    assert_eq!(out.report.steps, 2);
    // The fallback ignores material.
    assert_eq!(out.material.len(), 2);
    assert!((out.parameters.unwrap().position().x - 800.0).abs() < 1e-9);
}

#[test]
fn test_transition_limit() {
    let slabs = three_slabs();
    let engine = line_engine(
        &slabs.geometry,
        ExtrapolatorConfig {
            max_volume_transitions: 1,
            ..strict()
        },
    );
    let out = engine.extrapolate_with(
        &track_along_x(10.0, 1.0, 1000.0),
        Some(&x_plane(250.0)),
        &muon(Direction::Forward),
    );
    assert!(out.parameters.is_none());
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::DepthLimit));
    assert_eq!(out.report.visited_volumes, vec![slabs.a, slabs.b]);
}

// ── Fallback ─────────────────────────────────────────────────────────

#[test]
fn test_fallback_matches_direct_propagation() {
    init_logging();
    let slabs = three_slabs();
    let blind = Extrapolator::new(
        BoundaryBlindPropagator::default(),
        GeometryNavigator::new(slabs.geometry.clone()),
        BetheHighlandUpdator,
        ExtrapolatorConfig::default(),
    )
    .unwrap();
    let reference = line_engine(&slabs.geometry, ExtrapolatorConfig::default());
    let start = track_along_x(10.0, 1.0, 1000.0);
    let dest = x_plane(250.0);

    let out = blind.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::PropagationFailure));
    assert!(out.report.fallback_used);
    let fallback = out.parameters.expect("fallback reaches the destination");

    let navigated = reference
        .extrapolate(&start, &dest, Direction::Forward, true, ParticleHypothesis::Muon)
        .unwrap();
    let direct = reference
        .extrapolate_directly(&start, &dest, Direction::Forward, true, ParticleHypothesis::Muon)
        .unwrap();
    assert!(fallback.approx_eq(&navigated, 1e-9));
    assert!(fallback.approx_eq(&direct, 1e-9));
}

#[test]
fn test_partial_json_config_drives_breaks() {
    let config: ExtrapolatorConfig =
        serde_json::from_str(r#"{ "stop_with_navigation_break": true, "max_steps": 1 }"#).unwrap();
    assert!(config.include_material_effects);
    let slabs = three_slabs();
    let engine = line_engine(&slabs.geometry, config);
    let out = engine.extrapolate_with(
        &track_along_x(10.0, 1.0, 1000.0),
        Some(&x_plane(250.0)),
        &muon(Direction::Forward),
    );
    assert_eq!(out.report.navigation_break, Some(NavigationBreak::StepLimit));
    assert!(out.parameters.is_none());
}

// ── Sharing ──────────────────────────────────────────────────────────

#[test]
fn test_one_engine_serves_several_threads() {
    let (geometry, _layers) = slab_tracker(4, 0.3, false);
    let engine = line_engine(&geometry, ExtrapolatorConfig::default());
    let dest = x_plane(800.0);
    let serial: Vec<_> = (0..4)
        .map(|i| {
            engine
                .extrapolate(
                    &track_along_x(10.0, i as f64 * 10.0, 1000.0),
                    &dest,
                    Direction::Forward,
                    true,
                    ParticleHypothesis::Muon,
                )
                .unwrap()
        })
        .collect();

    let parallel: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = &engine;
                let dest = &dest;
                scope.spawn(move || {
                    engine.extrapolate(
                        &track_along_x(10.0, i as f64 * 10.0, 1000.0),
                        dest,
                        Direction::Forward,
                        true,
                        ParticleHypothesis::Muon,
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    for (a, b) in serial.iter().zip(&parallel) {
        assert!(a.approx_eq(b, 1e-12));
    }
}

// ── State ownership ──────────────────────────────────────────────────

/// Every state a call allocated is freed exactly once or handed back.
fn assert_states_accounted(report: &ExtrapolationReport, returned: usize) {
    assert!(report.states_created >= 1);
    assert_eq!(report.states_returned, returned);
    assert_eq!(
        report.states_created,
        report.states_released + report.states_returned,
        "{report:?}"
    );
}

#[test]
fn test_every_state_released_or_returned() {
    let slabs = three_slabs();
    let dest = x_plane(250.0);
    let engine = line_engine(&slabs.geometry, ExtrapolatorConfig::default());

    let out = engine.extrapolate_with(&track_along_x(30.0, 1.0, 1000.0), Some(&dest), &muon(Direction::Forward));
    assert!(out.is_success());
    assert!(out.report.states_created > 3);
    assert_states_accounted(&out.report, 1);

    let out = engine.extrapolate_with(&track_along_x(30.0, 1.0, 1000.0), None, &muon(Direction::Forward));
    assert_states_accounted(&out.report, 1);

    let start = track_along_x(250.0, 1.0, 1000.0);
    let out = engine.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert_eq!(out.report.states_created, 1);
    assert_states_accounted(&out.report, 1);

    // A break frees everything; the fallback state never lived in the arena.
    let start = track_along_x(50.0, 1.0, 1000.0);
    let scripted = scripted_engine(&slabs.geometry, &[-25.0], &[Some(slabs.b)], strict());
    let out = scripted.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert!(out.parameters.is_none());
    assert_states_accounted(&out.report, 0);

    let scripted = scripted_engine(
        &slabs.geometry,
        &[-25.0],
        &[Some(slabs.b)],
        ExtrapolatorConfig::default(),
    );
    let out = scripted.extrapolate_with(&start, Some(&dest), &muon(Direction::Forward));
    assert!(out.report.fallback_used && out.is_success());
    assert_states_accounted(&out.report, 0);
}
