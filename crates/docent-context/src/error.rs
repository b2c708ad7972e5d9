//! Error types for context management

use thiserror::Error;

use docent_runtime::ProviderError;

/// Context management error type.
///
/// Summarization failures never appear here: the manager absorbs them and
/// degrades to a literal excerpt, so a turn always yields usable context.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;

/// Failure of the external summarization call.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("summarization provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("summarization timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("summarization returned empty text")]
    EmptyResult,
}
