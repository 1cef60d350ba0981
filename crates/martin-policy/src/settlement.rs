//! Streak and totals updates on settlement.
//!
//! Runs exactly once per SETTLED trade; the caller folds the returned
//! stats into the same ledger transaction as the trade row update.
//! Only trades that were approved AND filled move streaks or totals.

use crate::config::PolicyConfig;
use martin_core::{NightSessionMode, PolicyMode, Stats, TimeMode, Trade};
use tracing::info;

/// Apply the night-session reset for the configured mode.
///
/// SOFT zeroes the night streak and drops back to BASE; HARD also
/// zeroes the trade-level streak. OFF never reaches this point because
/// night trading is disabled outright.
pub fn apply_night_reset(config: &PolicyConfig, stats: &mut Stats) {
    match config.night_session_mode {
        NightSessionMode::Off => {}
        NightSessionMode::Soft => {
            stats.night_streak = 0;
            stats.policy_mode = PolicyMode::Base;
        }
        NightSessionMode::Hard => {
            stats.night_streak = 0;
            stats.trade_level_streak = 0;
            stats.policy_mode = PolicyMode::Base;
        }
    }
}

/// Whether the night streak has hit its configured cap.
pub fn night_streak_capped(config: &PolicyConfig, stats: &Stats) -> bool {
    stats.night_streak >= config.night_max_win_streak
}

/// Compute the post-settlement stats for a settled trade.
///
/// A trade that was skipped or never filled leaves every counter
/// untouched. A filled win extends the streaks (and may flip the policy
/// to STRICT or trigger the night reset); a filled loss zeroes both
/// streaks and returns to BASE.
pub fn on_settlement(config: &PolicyConfig, stats: &Stats, trade: &Trade) -> Stats {
    let mut next = stats.clone();

    if !trade.taken_and_filled() {
        return next;
    }

    let is_win = trade.is_win.unwrap_or(false);
    next.total_trades += 1;

    if is_win {
        next.total_wins += 1;
        next.trade_level_streak += 1;
        if trade.time_mode == Some(TimeMode::Night) {
            next.night_streak += 1;
        }
        if next.trade_level_streak >= config.switch_streak_at {
            next.policy_mode = PolicyMode::Strict;
        }
        if night_streak_capped(config, &next) {
            info!(
                night_streak = next.night_streak,
                mode = ?config.night_session_mode,
                "Night streak capped, applying session reset"
            );
            apply_night_reset(config, &mut next);
        }
    } else {
        next.total_losses += 1;
        next.trade_level_streak = 0;
        next.night_streak = 0;
        next.policy_mode = PolicyMode::Base;
    }

    next
}
