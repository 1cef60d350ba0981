//! Application configuration.
//!
//! Effective values resolve in order: settings table > environment >
//! file. The file and environment layers are merged by the `config`
//! crate; `apply_settings` overlays the persistent settings rows as a
//! pure function.

use crate::error::{AppError, AppResult};
use martin_core::{Asset, DayWindow, NightSessionMode};
use martin_engine::EngineConfig;
use martin_feed::SnapshotWorkerConfig;
use martin_policy::{PolicyConfig, RollingQuantileConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated fills, no network I/O.
    #[default]
    Paper,
    /// Signed orders against the live book.
    Live,
}

/// Notifier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierMode {
    /// Log-only notifier.
    #[default]
    Log,
    /// JSON webhook notifier.
    Webhook,
}

/// `[trading]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub assets: Vec<String>,
    pub price_cap: Decimal,
    pub confirm_delay_seconds: i64,
    pub cap_min_ticks: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
    pub stake_amount: Decimal,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_snapshot_secs")]
    pub snapshot_secs: u64,
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: i64,
}

fn default_window_seconds() -> i64 {
    3600
}

fn default_tick_secs() -> u64 {
    60
}

fn default_snapshot_secs() -> u64 {
    30
}

fn default_warmup_secs() -> i64 {
    7200
}

/// `[day_night]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayNightConfig {
    #[serde(default = "default_tz")]
    pub tz: String,
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,
    #[serde(default = "default_day_end_hour")]
    pub day_end_hour: u32,
    #[serde(flatten)]
    pub policy: PolicyConfig,
}

fn default_tz() -> String {
    "UTC".to_string()
}

fn default_day_start_hour() -> u32 {
    8
}

fn default_day_end_hour() -> u32 {
    22
}

impl Default for DayNightConfig {
    fn default() -> Self {
        Self {
            tz: default_tz(),
            day_start_hour: default_day_start_hour(),
            day_end_hour: default_day_end_hour(),
            policy: PolicyConfig::default(),
        }
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Venue API key (live mode).
    #[serde(default)]
    pub api_key: String,
    /// Base64 venue API secret (live mode).
    #[serde(default)]
    pub api_secret: String,
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub catalog_url: String,
    pub candles_url: String,
    pub book_url: String,
}

/// `[notifier]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub mode: NotifierMode,
    #[serde(default)]
    pub webhook_url: String,
}

/// `[ledger]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_ledger_path() -> String {
    "martin.db".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

/// Whole application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub trading: TradingConfig,
    #[serde(default)]
    pub day_night: DayNightConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub rolling_quantile: RollingQuantileConfig,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Load from a TOML file with a `MARTIN_`-prefixed environment
    /// overlay (`MARTIN_TRADING__PRICE_CAP=0.6` overrides
    /// `trading.price_cap`).
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("MARTIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;
        let app: AppConfig = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.trading.assets.is_empty() {
            return Err(AppError::Config("trading.assets is empty".to_string()));
        }
        self.tz()?;
        if self.execution.mode == ExecutionMode::Live
            && (self.execution.api_key.is_empty() || self.execution.api_secret.is_empty())
        {
            return Err(AppError::Config(
                "live execution requires execution.api_key and execution.api_secret".to_string(),
            ));
        }
        if self.notifier.mode == NotifierMode::Webhook && self.notifier.webhook_url.is_empty() {
            return Err(AppError::Config(
                "webhook notifier requires notifier.webhook_url".to_string(),
            ));
        }
        self.day_night
            .policy
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.rolling_quantile
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn tz(&self) -> AppResult<chrono_tz::Tz> {
        self.day_night
            .tz
            .parse::<chrono_tz::Tz>()
            .map_err(|e| AppError::Config(format!("day_night.tz {:?}: {e}", self.day_night.tz)))
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.trading
            .assets
            .iter()
            .map(|s| Asset::new(s.clone()))
            .collect()
    }

    pub fn day_window(&self) -> AppResult<DayWindow> {
        DayWindow::new(
            self.tz()?,
            self.day_night.day_start_hour,
            self.day_night.day_end_hour,
        )
        .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn engine_config(&self) -> AppResult<EngineConfig> {
        Ok(EngineConfig {
            assets: self.assets(),
            price_cap: self.trading.price_cap,
            confirm_delay_seconds: self.trading.confirm_delay_seconds,
            cap_min_ticks: self.trading.cap_min_ticks,
            window_seconds: self.trading.window_seconds,
            stake_amount: self.trading.stake_amount,
            tick_secs: self.trading.tick_secs,
            snapshot_secs: self.trading.snapshot_secs,
            snapshot_stale_factor: 4,
            day_window: self.day_window()?,
            settle_timeout_secs: 6 * 3600,
            settle_fast_window_secs: 600,
            settle_slow_every_cycles: 5,
        })
    }

    pub fn snapshot_config(&self) -> SnapshotWorkerConfig {
        SnapshotWorkerConfig {
            assets: self.assets(),
            snapshot_secs: self.trading.snapshot_secs,
            warmup_secs: self.trading.warmup_secs,
        }
    }
}

/// Overlay persistent settings rows onto a loaded configuration.
///
/// Unknown keys and unparsable values are logged and skipped; the
/// stored configuration is never the reason the process refuses to
/// start.
pub fn apply_settings(mut config: AppConfig, rows: &[(String, String)]) -> AppConfig {
    for (key, value) in rows {
        let applied = match key.as_str() {
            "trading.price_cap" => parse_into(value, &mut config.trading.price_cap),
            "trading.stake_amount" => parse_into(value, &mut config.trading.stake_amount),
            "trading.confirm_delay_seconds" => {
                parse_into(value, &mut config.trading.confirm_delay_seconds)
            }
            "trading.cap_min_ticks" => parse_into(value, &mut config.trading.cap_min_ticks),
            "day_night.day_start_hour" => {
                parse_into(value, &mut config.day_night.day_start_hour)
            }
            "day_night.day_end_hour" => parse_into(value, &mut config.day_night.day_end_hour),
            "day_night.base_day_min_quality" => {
                parse_into(value, &mut config.day_night.policy.base_day_min_quality)
            }
            "day_night.base_night_min_quality" => {
                parse_into(value, &mut config.day_night.policy.base_night_min_quality)
            }
            "day_night.switch_streak_at" => {
                parse_into(value, &mut config.day_night.policy.switch_streak_at)
            }
            "day_night.strict_quality_increment" => {
                parse_into(value, &mut config.day_night.policy.strict_quality_increment)
            }
            "day_night.night_max_win_streak" => {
                parse_into(value, &mut config.day_night.policy.night_max_win_streak)
            }
            "day_night.night_autotrade_enabled" => {
                parse_into(value, &mut config.day_night.policy.night_autotrade_enabled)
            }
            "day_night.night_session_mode" => {
                match value.to_uppercase().as_str() {
                    "OFF" => config.day_night.policy.night_session_mode = NightSessionMode::Off,
                    "SOFT" => config.day_night.policy.night_session_mode = NightSessionMode::Soft,
                    "HARD" => config.day_night.policy.night_session_mode = NightSessionMode::Hard,
                    _ => {
                        warn!(%key, %value, "Unknown night session mode in settings");
                        continue;
                    }
                }
                true
            }
            "day_night.max_response_seconds" => {
                parse_into(value, &mut config.day_night.policy.max_response_seconds)
            }
            "rolling_quantile.enabled" => parse_into(value, &mut config.rolling_quantile.enabled),
            "rolling_quantile.min_samples" => {
                parse_into(value, &mut config.rolling_quantile.min_samples)
            }
            "rolling_quantile.strict_fallback_mult" => {
                parse_into(value, &mut config.rolling_quantile.strict_fallback_mult)
            }
            _ => {
                warn!(%key, "Unknown settings key, ignoring");
                continue;
            }
        };
        if !applied {
            warn!(%key, %value, "Unparsable settings value, ignoring");
        }
    }
    config
}

fn parse_into<T: FromStr>(value: &str, slot: &mut T) -> bool {
    match value.parse::<T>() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}
