//! Error types for martin-policy.

use thiserror::Error;

/// Policy error types.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid policy configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for policy operations.
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;
