//! Error types for martin-detector.

use thiserror::Error;

/// Detector error types.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Invalid oracle configuration: {0}")]
    ConfigError(String),
}

/// Result type alias for detector operations.
pub type DetectorResult<T> = std::result::Result<T, DetectorError>;
