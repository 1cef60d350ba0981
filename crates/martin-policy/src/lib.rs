//! Acceptance thresholds and streak policy.
//!
//! Pure decision logic: BASE/STRICT thresholds (incremental formula or
//! rolling quantile), settlement streak updates, and night-session
//! resets. No I/O; the engine feeds it stats snapshots and folds the
//! results back through the ledger.

pub mod config;
pub mod error;
pub mod quantile;
pub mod settlement;
pub mod threshold;

pub use config::{PolicyConfig, RollingQuantileConfig};
pub use error::{PolicyError, PolicyResult};
pub use quantile::quantile;
pub use settlement::{apply_night_reset, night_streak_capped, on_settlement};
pub use threshold::{acceptance_threshold, base_quality, effective_mode};
