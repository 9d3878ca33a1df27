//! Error types for the ingestion crate.

use grid_processor::GridProcessorError;
use swath_common::SwathError;
use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to list source objects: {0}")]
    Listing(String),

    #[error("Failed to fetch {id}: {message}")]
    Fetch { id: String, message: String },

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Failed to decode grid: {0}")]
    Decode(#[from] GridProcessorError),

    #[error("{0}")]
    Swath(#[from] SwathError),

    #[error("Ingestion task failed: {0}")]
    Task(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestionError {
    pub fn fetch(id: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for IngestionError {
    fn from(err: reqwest::Error) -> Self {
        let id = err.url().map(|u| u.to_string()).unwrap_or_default();
        Self::fetch(id, err)
    }
}

impl From<tokio::task::JoinError> for IngestionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
