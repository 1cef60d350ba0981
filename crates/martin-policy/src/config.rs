//! Policy configuration.

use crate::error::{PolicyError, PolicyResult};
use martin_core::NightSessionMode;
use serde::{Deserialize, Serialize};

/// Day/night acceptance and streak policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// BASE-mode quality floor during the day window.
    #[serde(default = "default_base_day_min_quality")]
    pub base_day_min_quality: f64,
    /// BASE-mode quality floor at night.
    #[serde(default = "default_base_night_min_quality")]
    pub base_night_min_quality: f64,
    /// Trade-level win streak at which the policy mode flips to STRICT.
    #[serde(default = "default_switch_streak_at")]
    pub switch_streak_at: u32,
    /// Streak length at which the STRICT increment starts counting.
    #[serde(default = "default_start_strict_after_n_wins")]
    pub start_strict_after_n_wins: u32,
    /// Quality added per win beyond `start_strict_after_n_wins`.
    #[serde(default = "default_strict_quality_increment")]
    pub strict_quality_increment: f64,
    /// Night win streak that triggers a session reset.
    #[serde(default = "default_night_max_win_streak")]
    pub night_max_win_streak: u32,
    /// Whether night trades are auto-approved at all.
    #[serde(default = "default_night_autotrade_enabled")]
    pub night_autotrade_enabled: bool,
    /// Reset behaviour when the night streak caps out.
    #[serde(default)]
    pub night_session_mode: NightSessionMode,
    /// Seconds a day-mode approval card waits for a decision.
    #[serde(default = "default_max_response_seconds")]
    pub max_response_seconds: i64,
}

fn default_base_day_min_quality() -> f64 {
    35.0
}

fn default_base_night_min_quality() -> f64 {
    45.0
}

fn default_switch_streak_at() -> u32 {
    3
}

fn default_start_strict_after_n_wins() -> u32 {
    3
}

fn default_strict_quality_increment() -> f64 {
    5.0
}

fn default_night_max_win_streak() -> u32 {
    5
}

fn default_night_autotrade_enabled() -> bool {
    true
}

fn default_max_response_seconds() -> i64 {
    300
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_day_min_quality: default_base_day_min_quality(),
            base_night_min_quality: default_base_night_min_quality(),
            switch_streak_at: default_switch_streak_at(),
            start_strict_after_n_wins: default_start_strict_after_n_wins(),
            strict_quality_increment: default_strict_quality_increment(),
            night_max_win_streak: default_night_max_win_streak(),
            night_autotrade_enabled: default_night_autotrade_enabled(),
            night_session_mode: NightSessionMode::default(),
            max_response_seconds: default_max_response_seconds(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> PolicyResult<()> {
        if self.base_day_min_quality < 0.0 || self.base_night_min_quality < 0.0 {
            return Err(PolicyError::InvalidConfig(
                "base quality floors must be non-negative".to_string(),
            ));
        }
        if self.strict_quality_increment < 0.0 {
            return Err(PolicyError::InvalidConfig(
                "strict increment must be non-negative".to_string(),
            ));
        }
        if self.night_max_win_streak == 0 {
            return Err(PolicyError::InvalidConfig(
                "night_max_win_streak must be positive".to_string(),
            ));
        }
        if self.max_response_seconds <= 0 {
            return Err(PolicyError::InvalidConfig(
                "max_response_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rolling-quantile threshold source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingQuantileConfig {
    /// Whether the quantile source overrides the incremental formula.
    #[serde(default)]
    pub enabled: bool,
    /// Lookback window in days.
    #[serde(default = "default_rolling_days")]
    pub rolling_days: u32,
    /// Hard cap on samples considered.
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,
    /// Minimum samples before the quantile is trusted.
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,
    /// Fallback multiplier on the base floor below `min_samples`.
    #[serde(default = "default_strict_fallback_mult")]
    pub strict_fallback_mult: f64,
    /// Quantile to take, in (0, 1).
    #[serde(default = "default_quantile")]
    pub quantile: f64,
}

fn default_rolling_days() -> u32 {
    14
}

fn default_max_samples() -> u32 {
    200
}

fn default_min_samples() -> u32 {
    20
}

fn default_strict_fallback_mult() -> f64 {
    1.25
}

fn default_quantile() -> f64 {
    0.75
}

impl Default for RollingQuantileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rolling_days: default_rolling_days(),
            max_samples: default_max_samples(),
            min_samples: default_min_samples(),
            strict_fallback_mult: default_strict_fallback_mult(),
            quantile: default_quantile(),
        }
    }
}

impl RollingQuantileConfig {
    pub fn validate(&self) -> PolicyResult<()> {
        if !(0.0..1.0).contains(&self.quantile) || self.quantile == 0.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "quantile {} must be in (0, 1)",
                self.quantile
            )));
        }
        if self.strict_fallback_mult < 1.0 {
            return Err(PolicyError::InvalidConfig(
                "strict_fallback_mult below 1 would loosen STRICT mode".to_string(),
            ));
        }
        Ok(())
    }
}
