//! Entry-price cap evaluation.
//!
//! Counts consecutive in-window ticks at or below the price cap. Ticks
//! before the confirm time never count; a single tick above the cap
//! resets the run.

use martin_core::{CapCheckStatus, PriceTick};
use rust_decimal::Decimal;

/// Cap evaluation parameters.
#[derive(Debug, Clone, Copy)]
pub struct CapParams {
    pub confirm_ts: i64,
    pub end_ts: i64,
    pub price_cap: Decimal,
    pub cap_min_ticks: u32,
}

/// Result of one cap evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapOutcome {
    pub status: CapCheckStatus,
    pub consecutive_ticks: u32,
    pub first_pass_ts: Option<i64>,
    pub price_at_pass: Option<Decimal>,
}

impl CapOutcome {
    fn pending(consecutive_ticks: u32) -> Self {
        Self {
            status: CapCheckStatus::Pending,
            consecutive_ticks,
            first_pass_ts: None,
            price_at_pass: None,
        }
    }
}

/// Evaluate the cap check over `ticks` at wall-clock `now`.
///
/// LATE when the confirm time is at or past the window end. PASS the
/// first time a run of `cap_min_ticks` consecutive qualifying ticks
/// completes, recording the tick that completed it. FAIL once the
/// window closes without a pass. PENDING otherwise. Tick equality with
/// the cap qualifies; duplicate timestamps keep their insertion order.
pub fn evaluate_cap(ticks: &[PriceTick], params: &CapParams, now: i64) -> CapOutcome {
    if params.confirm_ts >= params.end_ts {
        return CapOutcome {
            status: CapCheckStatus::Late,
            consecutive_ticks: 0,
            first_pass_ts: None,
            price_at_pass: None,
        };
    }

    let mut in_window: Vec<PriceTick> = ticks
        .iter()
        .filter(|t| t.ts >= params.confirm_ts && t.ts <= params.end_ts)
        .copied()
        .collect();
    // Stable: duplicate timestamps stay in insertion order.
    in_window.sort_by_key(|t| t.ts);

    let mut run = 0u32;
    for tick in &in_window {
        if tick.price <= params.price_cap {
            run += 1;
            if run >= params.cap_min_ticks {
                return CapOutcome {
                    status: CapCheckStatus::Pass,
                    consecutive_ticks: run,
                    first_pass_ts: Some(tick.ts),
                    price_at_pass: Some(tick.price),
                };
            }
        } else {
            run = 0;
        }
    }

    if now >= params.end_ts {
        return CapOutcome {
            status: CapCheckStatus::Fail,
            consecutive_ticks: run,
            first_pass_ts: None,
            price_at_pass: None,
        };
    }
    CapOutcome::pending(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> CapParams {
        CapParams {
            confirm_ts: 1_000_420,
            end_ts: 1_003_600,
            price_cap: dec!(0.55),
            cap_min_ticks: 3,
        }
    }

    fn tick(ts: i64, price: Decimal) -> PriceTick {
        PriceTick::new(ts, price)
    }

    #[test]
    fn test_pass_on_three_consecutive() {
        let ticks = vec![
            tick(1_000_421, dec!(0.50)),
            tick(1_000_431, dec!(0.54)),
            tick(1_000_441, dec!(0.52)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_000_500);
        assert_eq!(outcome.status, CapCheckStatus::Pass);
        assert_eq!(outcome.consecutive_ticks, 3);
        assert_eq!(outcome.first_pass_ts, Some(1_000_441));
        assert_eq!(outcome.price_at_pass, Some(dec!(0.52)));
    }

    #[test]
    fn test_pre_confirm_ticks_never_count() {
        // Two cheap ticks before confirm, then expensive ticks after.
        let ticks = vec![
            tick(1_000_400, dec!(0.40)),
            tick(1_000_410, dec!(0.42)),
            tick(1_000_425, dec!(0.60)),
            tick(1_000_500, dec!(0.58)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_003_600);
        assert_eq!(outcome.status, CapCheckStatus::Fail);
        assert_eq!(outcome.consecutive_ticks, 0);
    }

    #[test]
    fn test_gap_resets_run() {
        let ticks = vec![
            tick(1_000_421, dec!(0.50)),
            tick(1_000_431, dec!(0.54)),
            tick(1_000_441, dec!(0.60)), // breach
            tick(1_000_451, dec!(0.52)),
            tick(1_000_461, dec!(0.53)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_000_500);
        assert_eq!(outcome.status, CapCheckStatus::Pending);
        assert_eq!(outcome.consecutive_ticks, 2);
    }

    #[test]
    fn test_equality_counts_as_below() {
        let ticks = vec![
            tick(1_000_421, dec!(0.55)),
            tick(1_000_431, dec!(0.55)),
            tick(1_000_441, dec!(0.55)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_000_500);
        assert_eq!(outcome.status, CapCheckStatus::Pass);
    }

    #[test]
    fn test_late_when_confirm_at_end() {
        let p = CapParams {
            confirm_ts: 1_003_620,
            end_ts: 1_003_600,
            price_cap: dec!(0.55),
            cap_min_ticks: 3,
        };
        let outcome = evaluate_cap(&[], &p, 1_003_000);
        assert_eq!(outcome.status, CapCheckStatus::Late);
    }

    #[test]
    fn test_fail_at_window_close_without_pass() {
        let ticks = vec![tick(1_000_421, dec!(0.50)), tick(1_000_431, dec!(0.54))];
        // Before close: still pending with a live run.
        let pending = evaluate_cap(&ticks, &params(), 1_000_500);
        assert_eq!(pending.status, CapCheckStatus::Pending);
        assert_eq!(pending.consecutive_ticks, 2);
        // At close: fail.
        let failed = evaluate_cap(&ticks, &params(), 1_003_600);
        assert_eq!(failed.status, CapCheckStatus::Fail);
    }

    #[test]
    fn test_no_ticks_yet_is_pending() {
        let outcome = evaluate_cap(&[], &params(), 1_000_500);
        assert_eq!(outcome, CapOutcome::pending(0));
    }

    #[test]
    fn test_first_pass_wins_over_later_runs() {
        let ticks = vec![
            tick(1_000_421, dec!(0.50)),
            tick(1_000_431, dec!(0.51)),
            tick(1_000_441, dec!(0.52)),
            tick(1_000_451, dec!(0.40)),
            tick(1_000_461, dec!(0.41)),
            tick(1_000_471, dec!(0.42)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_000_500);
        assert_eq!(outcome.first_pass_ts, Some(1_000_441));
        assert_eq!(outcome.price_at_pass, Some(dec!(0.52)));
    }

    #[test]
    fn test_ticks_past_end_ignored() {
        let ticks = vec![
            tick(1_003_590, dec!(0.50)),
            tick(1_003_700, dec!(0.50)), // past end_ts
            tick(1_003_710, dec!(0.50)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_003_650);
        assert_eq!(outcome.status, CapCheckStatus::Fail);
        assert_eq!(outcome.consecutive_ticks, 1);
    }

    #[test]
    fn test_duplicate_timestamps_keep_order() {
        // Same second: a breach recorded after a qualifying tick still
        // resets the run.
        let ticks = vec![
            tick(1_000_421, dec!(0.50)),
            tick(1_000_421, dec!(0.60)),
            tick(1_000_431, dec!(0.50)),
            tick(1_000_441, dec!(0.50)),
        ];
        let outcome = evaluate_cap(&ticks, &params(), 1_000_500);
        assert_eq!(outcome.status, CapCheckStatus::Pending);
        assert_eq!(outcome.consecutive_ticks, 2);
    }
}
