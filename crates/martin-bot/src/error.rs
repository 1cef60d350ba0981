//! Error types for martin-bot.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] martin_ledger::LedgerError),

    #[error("Engine error: {0}")]
    Engine(#[from] martin_engine::EngineError),

    #[error("Source error: {0}")]
    Source(#[from] martin_sources::SourceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] martin_telemetry::TelemetryError),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
