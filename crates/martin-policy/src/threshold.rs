//! Acceptance threshold computation.
//!
//! Pure: reads config and the current stats snapshot, mutates nothing.

use crate::config::{PolicyConfig, RollingQuantileConfig};
use crate::quantile::quantile;
use martin_core::{PolicyMode, Stats, TimeMode};

/// Policy mode implied by the current trade-level streak.
///
/// Below `switch_streak_at` the mode must be BASE regardless of what the
/// stats row says; at or above it, STRICT.
pub fn effective_mode(config: &PolicyConfig, stats: &Stats) -> PolicyMode {
    if stats.trade_level_streak >= config.switch_streak_at {
        PolicyMode::Strict
    } else {
        PolicyMode::Base
    }
}

/// Base quality floor for a time mode.
pub fn base_quality(config: &PolicyConfig, time_mode: TimeMode) -> f64 {
    match time_mode {
        TimeMode::Day => config.base_day_min_quality,
        TimeMode::Night => config.base_night_min_quality,
    }
}

/// Compute the signal acceptance threshold.
///
/// BASE mode returns the per-time-mode floor. STRICT mode raises it by
/// the incremental formula, unless the rolling-quantile source is
/// enabled: then the quantile of `samples` is used when there are at
/// least `min_samples` of them, and `strict_fallback_mult x base`
/// otherwise.
pub fn acceptance_threshold(
    config: &PolicyConfig,
    quantile_config: &RollingQuantileConfig,
    stats: &Stats,
    time_mode: TimeMode,
    samples: &[f64],
) -> f64 {
    let base = base_quality(config, time_mode);
    if effective_mode(config, stats) == PolicyMode::Base {
        return base;
    }

    if quantile_config.enabled {
        if samples.len() >= quantile_config.min_samples as usize {
            if let Some(q) = quantile(samples, quantile_config.quantile) {
                return q.max(base);
            }
        }
        return base * quantile_config.strict_fallback_mult;
    }

    // max(0, streak - start + 1): zero increments while the streak has
    // not yet reached the strict start, even though the mode is STRICT.
    let wins_past_start =
        (stats.trade_level_streak + 1).saturating_sub(config.start_strict_after_n_wins);
    base + wins_past_start as f64 * config.strict_quality_increment
}
