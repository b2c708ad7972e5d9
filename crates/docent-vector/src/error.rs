//! Error types for vector storage

use thiserror::Error;

/// Vector storage error type
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("section not found: {0}")]
    NotFound(String),

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("search error: {0}")]
    SearchFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for vector operations
pub type VectorResult<T> = Result<T, VectorError>;
