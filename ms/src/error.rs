//! Marker store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing markers
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Marker file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to lock {path}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid marker key: {0:?}")]
    InvalidKey(String),
}
