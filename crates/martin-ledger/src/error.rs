//! Error types for martin-ledger.

use martin_core::{StateError, TradeStatus};
use thiserror::Error;

/// Ledger error types.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    IllegalTransition(#[from] StateError),

    #[error("Trade {0} not found")]
    TradeNotFound(i64),

    #[error("Window {0} not found")]
    WindowNotFound(i64),

    #[error("Window {window_id} already has a non-terminal trade")]
    DuplicateTrade { window_id: i64 },

    #[error("Window {window_id} already has a signal")]
    DuplicateSignal { window_id: i64 },

    #[error("Invariant violation on trade {trade_id}: {detail}")]
    InvariantViolation { trade_id: i64, detail: String },

    #[error("Trade {trade_id} is {status}, expected {expected}")]
    WrongStatus {
        trade_id: i64,
        status: TradeStatus,
        expected: TradeStatus,
    },

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
