// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Property-Based Tests (proptest) for trackx-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for trackx-types using proptest.
//!
//! Covers: TrackParameters construction invariants, particle kinematics,
//! configuration serialization roundtrip.

use proptest::prelude::*;
use trackx_math::Vector3;
use trackx_types::config::{ExtrapolatorConfig, FieldMode};
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::ParticleHypothesis;

// ── TrackParameters Invariants ───────────────────────────────────────

proptest! {
    /// Valid inputs always construct, with a unit direction.
    #[test]
    fn parameters_direction_is_unit(
        dx in -10.0f64..10.0,
        dy in -10.0f64..10.0,
        dz in -10.0f64..10.0,
        p in 0.1f64..1e6,
        q in -2.0f64..2.0,
    ) {
        prop_assume!((dx * dx + dy * dy + dz * dz).sqrt() > 1e-3);
        let pars = TrackParameters::new(Vector3::ZERO, Vector3::new(dx, dy, dz), p, q).unwrap();
        prop_assert!((pars.direction().norm() - 1.0).abs() < 1e-12);
        prop_assert!((pars.momentum_vector().norm() - p).abs() < 1e-9 * p);
    }

    /// Transport never changes momentum or charge.
    #[test]
    fn transport_preserves_kinematics(
        x in -1e4f64..1e4,
        p in 1.0f64..1e5,
    ) {
        let pars = TrackParameters::new(Vector3::ZERO, Vector3::UNIT_Z, p, 1.0).unwrap();
        let moved = pars.transported(Vector3::new(x, 0.0, 0.0), Vector3::UNIT_X, None, None);
        prop_assert_eq!(moved.momentum(), p);
        prop_assert_eq!(moved.charge(), 1.0);
        prop_assert_eq!(moved.position().x, x);
    }

    /// β is in (0, 1] and increases with momentum.
    #[test]
    fn beta_is_monotone(p in 1.0f64..1e5) {
        for hyp in [ParticleHypothesis::Electron, ParticleHypothesis::Muon, ParticleHypothesis::Proton] {
            let b1 = hyp.beta(p);
            let b2 = hyp.beta(2.0 * p);
            prop_assert!(b1 > 0.0 && b1 <= 1.0);
            prop_assert!(b2 >= b1);
        }
    }
}

// ── Configuration Roundtrip ──────────────────────────────────────────

proptest! {
    #[test]
    fn config_roundtrip(
        max_steps in 1usize..100_000,
        tol in 0.0f64..100.0,
        bz in -5.0f64..5.0,
        stop in any::<bool>(),
    ) {
        let cfg = ExtrapolatorConfig {
            max_steps,
            distance_regression_tolerance_mm: tol,
            stop_with_navigation_break: stop,
            field: FieldMode::Uniform { tesla: Vector3::new(0.0, 0.0, bz) },
            ..Default::default()
        };
        prop_assert!(cfg.validate().is_ok());
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ExtrapolatorConfig = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.max_steps, max_steps);
        prop_assert_eq!(back.stop_with_navigation_break, stop);
        prop_assert!((back.distance_regression_tolerance_mm - tol).abs() <= 1e-12 * (1.0 + tol));
        let field = back.field.field_tesla();
        prop_assert!((field.z - bz).abs() <= 1e-12);
    }
}
