// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Error Types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtrapolationError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid track parameters: {0}")]
    InvalidParameters(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExtrapolationResult<T> = Result<T, ExtrapolationError>;
