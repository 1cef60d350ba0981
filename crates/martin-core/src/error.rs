//! Error types for martin-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
