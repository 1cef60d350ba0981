//! Error types for martin-engine.

use thiserror::Error;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] martin_ledger::LedgerError),

    #[error("Source error: {0}")]
    Source(#[from] martin_sources::SourceError),

    #[error("Executor error: {0}")]
    Executor(#[from] martin_executor::ExecutorError),

    #[error("Notifier error: {0}")]
    Notify(#[from] martin_notify::NotifyError),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Trade {trade_id} violated an invariant: {detail}")]
    Invariant { trade_id: i64, detail: String },
}

impl EngineError {
    /// Whether this failure should freeze the affected trade in ERROR
    /// (invariant violations) rather than being retried next cycle.
    pub fn freezes_trade(&self) -> bool {
        matches!(
            self,
            Self::Invariant { .. }
                | Self::Ledger(martin_ledger::LedgerError::IllegalTransition(_))
                | Self::Ledger(martin_ledger::LedgerError::InvariantViolation { .. })
                | Self::Ledger(martin_ledger::LedgerError::CorruptRow(_))
        )
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
