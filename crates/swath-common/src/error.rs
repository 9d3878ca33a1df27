//! Error types for swath extraction and ingestion.

use thiserror::Error;

/// Result type alias using SwathError.
pub type SwathResult<T> = Result<T, SwathError>;

/// Primary error type shared across the swath crates.
#[derive(Debug, Error)]
pub enum SwathError {
    // === Validation ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid threshold list: {0}")]
    InvalidThresholds(String),

    // === Data ===
    #[error("Failed to decode grid: {0}")]
    DecodeError(String),

    #[error("Grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid geometry: {0}")]
    GeometryError(String),

    // === Infrastructure ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for SwathError {
    fn from(err: std::io::Error) -> Self {
        SwathError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for SwathError {
    fn from(err: serde_json::Error) -> Self {
        SwathError::InternalError(format!("JSON error: {}", err))
    }
}
