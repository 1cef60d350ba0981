//! TA oracle contract and reference implementation.
//!
//! The `TaOracle` trait is the black-box boundary: the orchestrator
//! supplies candle snapshots and reads back an optional
//! `(direction, signal_ts, quality, breakdown)` tuple. `MomentumOracle`
//! is the deterministic reference evaluator used by paper mode.

pub mod error;
pub mod momentum;
pub mod oracle;

pub use error::{DetectorError, DetectorResult};
pub use momentum::{MomentumConfig, MomentumOracle};
pub use oracle::TaOracle;
