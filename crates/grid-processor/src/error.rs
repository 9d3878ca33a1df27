//! Error types for grid processing.

use swath_common::SwathError;
use thiserror::Error;

/// Errors that can occur while decoding, normalizing or compositing grids.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// The decoder could not read the source file.
    #[error("failed to decode grid: {0}")]
    DecodeFailed(String),

    /// Coordinate arrays or values are inconsistent.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Two grids with different shapes were combined.
    #[error("grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Two grids with the same shape but different geographic footprints
    /// were combined.
    #[error("grid transform mismatch: expected {expected}, got {actual}")]
    TransformMismatch { expected: String, actual: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Storage/IO error.
    #[error("io error: {0}")]
    Io(String),
}

impl GridProcessorError {
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<SwathError> for GridProcessorError {
    fn from(err: SwathError) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<GridProcessorError> for SwathError {
    fn from(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::ShapeMismatch { expected, actual } => {
                SwathError::ShapeMismatch { expected, actual }
            }
            GridProcessorError::ConfigError(msg) => SwathError::InvalidParameter {
                param: "extraction".to_string(),
                message: msg,
            },
            other => SwathError::DecodeError(other.to_string()),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
