//! Error types for the store.

use crate::types::SnapshotId;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Allocation failed while copying state. The operation was aborted
    /// before anything was mutated.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<std::collections::TryReserveError> for StoreError {
    fn from(e: std::collections::TryReserveError) -> Self {
        StoreError::ResourceExhausted(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
