//! Error types for martin-sources.

use thiserror::Error;

/// Data-source error types.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Order rejected by venue: {0}")]
    OrderRejected(String),
}

impl SourceError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Server errors and transport failures are transient; 4xx responses
    /// and parse failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpClient(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Parse(_) | Self::RetriesExhausted { .. } | Self::OrderRejected(_) => false,
        }
    }
}

/// Result type alias for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
