//! Error types for martin-executor.

use thiserror::Error;

/// Executor error types.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Book error: {0}")]
    Book(#[from] martin_sources::SourceError),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

/// Result type alias for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
