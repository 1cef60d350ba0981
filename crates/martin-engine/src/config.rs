//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use martin_core::{Asset, DayWindow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Orchestrator and trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Assets to scan and trade.
    pub assets: Vec<Asset>,
    /// Entry ceiling for the chosen outcome token, in (0, 1).
    pub price_cap: Decimal,
    /// Seconds between a signal and its confirm time.
    pub confirm_delay_seconds: i64,
    /// Consecutive qualifying ticks required for a cap pass.
    pub cap_min_ticks: u32,
    /// Expected window length, for discovery sanity logging.
    pub window_seconds: i64,
    /// Flat stake per trade in quote currency.
    pub stake_amount: Decimal,
    /// Orchestration period in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Snapshot worker period in seconds.
    #[serde(default = "default_snapshot_secs")]
    pub snapshot_secs: u64,
    /// A snapshot older than `snapshot_secs x stale_factor` is not fed
    /// to the TA oracle.
    #[serde(default = "default_snapshot_stale_factor")]
    pub snapshot_stale_factor: u32,
    /// Day/night classification window.
    pub day_window: DayWindow,
    /// Hard ceiling on waiting for a window outcome past its close.
    #[serde(default = "default_settle_timeout_secs")]
    pub settle_timeout_secs: i64,
    /// Outcome polls run every cycle for this long past the close.
    #[serde(default = "default_settle_fast_window_secs")]
    pub settle_fast_window_secs: i64,
    /// After the fast window, poll only every N cycles.
    #[serde(default = "default_settle_slow_every_cycles")]
    pub settle_slow_every_cycles: u64,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_snapshot_secs() -> u64 {
    30
}

fn default_snapshot_stale_factor() -> u32 {
    4
}

fn default_settle_timeout_secs() -> i64 {
    6 * 3600
}

fn default_settle_fast_window_secs() -> i64 {
    600
}

fn default_settle_slow_every_cycles() -> u64 {
    5
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.assets.is_empty() {
            return Err(EngineError::InvalidConfig("no assets configured".to_string()));
        }
        if self.price_cap <= Decimal::ZERO || self.price_cap >= Decimal::ONE {
            return Err(EngineError::InvalidConfig(format!(
                "price_cap {} outside (0, 1)",
                self.price_cap
            )));
        }
        if self.confirm_delay_seconds < 0 {
            return Err(EngineError::InvalidConfig(
                "confirm_delay_seconds must be non-negative".to_string(),
            ));
        }
        if self.cap_min_ticks == 0 {
            return Err(EngineError::InvalidConfig(
                "cap_min_ticks must be positive".to_string(),
            ));
        }
        if self.stake_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "stake_amount must be positive".to_string(),
            ));
        }
        if self.tick_secs == 0 || self.snapshot_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "loop periods must be positive".to_string(),
            ));
        }
        if self.settle_slow_every_cycles == 0 {
            return Err(EngineError::InvalidConfig(
                "settle_slow_every_cycles must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum snapshot age accepted by the signal-search step.
    pub fn max_snapshot_age_secs(&self) -> i64 {
        (self.snapshot_secs * self.snapshot_stale_factor as u64) as i64
    }
}
