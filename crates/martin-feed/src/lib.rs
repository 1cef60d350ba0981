//! Snapshot worker and TA-context cache.
//!
//! Keeps a fresh in-memory TA context per asset so that signal scanning
//! is decoupled from market-window discovery. Readers get
//! read-snapshot semantics: a whole `Arc<TaContext>` per asset, swapped
//! atomically on refresh.

pub mod cache;
pub mod error;
pub mod worker;

pub use cache::{SnapshotCache, TaContext};
pub use error::{FeedError, FeedResult};
pub use worker::{SnapshotWorker, SnapshotWorkerConfig};
