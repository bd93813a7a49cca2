// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Units throughout: lengths in mm, momenta and energies in MeV, fields in T.

/// Electron mass [MeV].
pub const ELECTRON_MASS_MEV: f64 = 0.510_998_95;

/// Muon mass [MeV].
pub const MUON_MASS_MEV: f64 = 105.658_375_5;

/// Charged pion mass [MeV].
pub const PION_MASS_MEV: f64 = 139.570_39;

/// Charged kaon mass [MeV].
pub const KAON_MASS_MEV: f64 = 493.677;

/// Proton mass [MeV].
pub const PROTON_MASS_MEV: f64 = 938.272_088_16;

/// Curvature constant: 1/R [1/mm] = C_LIGHT_FIELD * q * B[T] / p[MeV].
pub const C_LIGHT_FIELD: f64 = 0.299_792_458;

/// Bethe-Bloch constant K = 4π N_A r_e² m_e c² [MeV cm²/mol].
pub const BETHE_K: f64 = 0.307_075;

/// Highland formula scale [MeV].
pub const HIGHLAND_SCALE_MEV: f64 = 13.6;

/// Highland logarithmic correction coefficient.
pub const HIGHLAND_LOG_TERM: f64 = 0.038;

/// Mean excitation energy scale: I ≈ 16 eV · Z^0.9, expressed in MeV.
pub const MEAN_EXCITATION_SCALE_MEV: f64 = 16.0e-6;

/// Number of covariance parameters (loc0, loc1, phi, theta, q/p).
pub const N_TRACK_PARAMETERS: usize = 5;

/// Index of phi in the covariance.
pub const IDX_PHI: usize = 2;

/// Index of theta in the covariance.
pub const IDX_THETA: usize = 3;

/// Index of q/p in the covariance.
pub const IDX_QOP: usize = 4;
