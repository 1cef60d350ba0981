//! SQLite trade ledger.
//!
//! The single source of truth for windows, signals, trades, cap checks,
//! the stats singleton and settings. All status changes are guarded by
//! the core state machine inside a write transaction; concurrent
//! transitions on the same trade serialize on the connection.

pub mod error;
pub mod schema;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use store::{Ledger, SignalRecord};
