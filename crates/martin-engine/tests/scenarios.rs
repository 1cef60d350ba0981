//! End-to-end orchestrator scenarios over scripted collaborators.
//!
//! Every test drives the engine cycle-by-cycle with explicit clocks, a
//! real temp-file ledger, the paper executor and fake market sources.

use async_trait::async_trait;
use martin_core::{
    Asset, CancelReason, CapCheckStatus, DayWindow, Decision, Direction, FillStatus, MarketWindow,
    NightSessionMode, PolicyMode, PriceTick, TaSignal, TradeStatus,
};
use martin_detector::TaOracle;
use martin_engine::{Collaborators, EngineConfig, Orchestrator};
use martin_executor::PaperExecutor;
use martin_feed::{SnapshotCache, TaContext};
use martin_ledger::Ledger;
use martin_notify::{ApprovalCard, Notifier, NotifyResult, UserDecision, Verdict};
use martin_policy::{PolicyConfig, RollingQuantileConfig};
use martin_sources::{
    LimitOrder, MarketCatalog, OrderBook, OrderStatusReport, SettlementSource, SourceResult,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::Arc;

// Window under test: [1_000_000, 1_003_600), 13:46-14:46 UTC (day).
const START: i64 = 1_000_000;
const END: i64 = 1_003_600;
// Night window: [1_029_600, 1_033_200), 22:00-23:00 UTC.
const NIGHT_START: i64 = 1_029_600;
const NIGHT_END: i64 = 1_033_200;

fn day_window_fixture(slug: &str) -> MarketWindow {
    MarketWindow {
        id: 0,
        asset: Asset::from("BTC"),
        slug: slug.to_string(),
        condition_id: "0xc0ffee".to_string(),
        up_token_id: "tok-up".to_string(),
        down_token_id: "tok-down".to_string(),
        start_ts: START,
        end_ts: END,
        outcome: None,
    }
}

fn night_window_fixture(slug: &str) -> MarketWindow {
    MarketWindow {
        start_ts: NIGHT_START,
        end_ts: NIGHT_END,
        ..day_window_fixture(slug)
    }
}

fn ta_signal(signal_ts: i64, quality: f64) -> TaSignal {
    TaSignal {
        direction: Direction::Up,
        signal_ts,
        quality,
        breakdown: serde_json::json!({"kind": "scripted"}),
        anchor_bar_ts: signal_ts - 300,
    }
}

// ----------------------------------------------------------------------
// Scripted collaborators
// ----------------------------------------------------------------------

struct ScriptedCatalog {
    windows: Mutex<Vec<MarketWindow>>,
}

#[async_trait]
impl MarketCatalog for ScriptedCatalog {
    async fn list_open_windows(
        &self,
        _assets: &[Asset],
        now: i64,
    ) -> SourceResult<Vec<MarketWindow>> {
        Ok(self
            .windows
            .lock()
            .iter()
            .filter(|w| now < w.end_ts)
            .cloned()
            .collect())
    }
}

/// Oracle that pops one scripted response per evaluation.
struct ScriptedOracle {
    responses: Mutex<VecDeque<Option<TaSignal>>>,
}

impl TaOracle for ScriptedOracle {
    fn evaluate(&self, _window: &MarketWindow, _now: i64, _ctx: &TaContext) -> Option<TaSignal> {
        self.responses.lock().pop_front().flatten()
    }
}

struct ScriptedBook {
    ticks: Mutex<Vec<PriceTick>>,
}

#[async_trait]
impl OrderBook for ScriptedBook {
    async fn price_ticks(&self, _token_id: &str, from: i64, to: i64) -> SourceResult<Vec<PriceTick>> {
        Ok(self
            .ticks
            .lock()
            .iter()
            .filter(|t| t.ts >= from && t.ts <= to)
            .copied()
            .collect())
    }

    async fn place_limit(&self, _order: &LimitOrder) -> SourceResult<String> {
        unreachable!("paper mode never reaches the book")
    }

    async fn order_status(&self, _order_id: &str) -> SourceResult<OrderStatusReport> {
        unreachable!("paper mode never reaches the book")
    }
}

struct ScriptedSettlement {
    outcome: Mutex<Option<Direction>>,
}

#[async_trait]
impl SettlementSource for ScriptedSettlement {
    async fn resolved_outcome(&self, _window: &MarketWindow) -> SourceResult<Option<Direction>> {
        Ok(*self.outcome.lock())
    }
}

/// Notifier that records approval cards instead of delivering them.
#[derive(Default)]
struct CapturingNotifier {
    approvals: Mutex<Vec<ApprovalCard>>,
    statuses: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn emit_approval(&self, card: &ApprovalCard) -> NotifyResult<()> {
        self.approvals.lock().push(card.clone());
        Ok(())
    }

    async fn emit_status(&self, text: &str) -> NotifyResult<()> {
        self.statuses.lock().push(text.to_string());
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

struct Harness {
    orchestrator: Orchestrator,
    ledger: Arc<Ledger>,
    cache: Arc<SnapshotCache>,
    catalog: Arc<ScriptedCatalog>,
    oracle: Arc<ScriptedOracle>,
    book: Arc<ScriptedBook>,
    settlement: Arc<ScriptedSettlement>,
    notifier: Arc<CapturingNotifier>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(policy: PolicyConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path().join("martin.db")).unwrap());
        let cache = Arc::new(SnapshotCache::new());
        let catalog = Arc::new(ScriptedCatalog {
            windows: Mutex::new(Vec::new()),
        });
        let oracle = Arc::new(ScriptedOracle {
            responses: Mutex::new(VecDeque::new()),
        });
        let book = Arc::new(ScriptedBook {
            ticks: Mutex::new(Vec::new()),
        });
        let settlement = Arc::new(ScriptedSettlement {
            outcome: Mutex::new(None),
        });
        let notifier = Arc::new(CapturingNotifier::default());

        let config = EngineConfig {
            assets: vec![Asset::from("BTC")],
            price_cap: dec!(0.55),
            confirm_delay_seconds: 120,
            cap_min_ticks: 3,
            window_seconds: 3600,
            stake_amount: dec!(10),
            tick_secs: 60,
            snapshot_secs: 30,
            snapshot_stale_factor: 1_000_000, // snapshots never stale in tests
            day_window: DayWindow::new(chrono_tz::UTC, 8, 22).unwrap(),
            settle_timeout_secs: 21_600,
            settle_fast_window_secs: 600,
            settle_slow_every_cycles: 5,
        };
        let orchestrator = Orchestrator::new(
            config,
            policy,
            RollingQuantileConfig::default(),
            ledger.clone(),
            cache.clone(),
            Collaborators {
                catalog: catalog.clone(),
                book: book.clone(),
                settlement: settlement.clone(),
                oracle: oracle.clone(),
                executor: Arc::new(PaperExecutor::new(dec!(0.55))),
                notifier: notifier.clone(),
            },
        )
        .unwrap();

        Self {
            orchestrator,
            ledger,
            cache,
            catalog,
            oracle,
            book,
            settlement,
            notifier,
            _dir: dir,
        }
    }

    fn default_policy() -> PolicyConfig {
        PolicyConfig {
            base_day_min_quality: 35.0,
            base_night_min_quality: 35.0,
            switch_streak_at: 3,
            start_strict_after_n_wins: 3,
            strict_quality_increment: 5.0,
            night_max_win_streak: 5,
            night_autotrade_enabled: true,
            night_session_mode: NightSessionMode::Soft,
            max_response_seconds: 300,
        }
    }

    fn publish_window(&self, window: MarketWindow) {
        self.catalog.windows.lock().push(window);
    }

    fn script_oracle(&self, responses: Vec<Option<TaSignal>>) {
        self.oracle.responses.lock().extend(responses);
    }

    fn set_ticks(&self, ticks: Vec<PriceTick>) {
        *self.book.ticks.lock() = ticks;
    }

    fn resolve(&self, outcome: Direction) {
        *self.settlement.outcome.lock() = Some(outcome);
    }

    /// Keep the TA snapshot fresh for `now`.
    fn fresh_snapshot(&self, now: i64) {
        self.cache.store(
            Asset::from("BTC"),
            TaContext {
                candles_1m: Vec::new(),
                candles_5m: Vec::new(),
                fetched_at: now,
            },
        );
    }

    async fn cycle(&self, now: i64) {
        self.fresh_snapshot(now);
        self.orchestrator.run_cycle(now).await;
    }

    async fn decide(&self, trade_id: i64, verdict: Verdict, now: i64) {
        self.orchestrator
            .handle_decision(
                UserDecision {
                    trade_id,
                    verdict,
                    user_id: "user-1".to_string(),
                },
                now,
            )
            .await;
    }

    fn only_trade(&self) -> martin_core::Trade {
        let live = self.ledger.live_trades().unwrap();
        if live.len() == 1 {
            return live[0].clone();
        }
        let closed = self.ledger.recent_closed_trades(10).unwrap();
        assert_eq!(live.len() + closed.len(), 1, "expected exactly one trade");
        closed[0].clone()
    }
}

// ----------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------

/// Day-flow happy path: signal, confirm collapse, cap pass, user OK,
/// paper fill, winning settlement.
#[tokio::test]
async fn test_day_flow_happy_path() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-1000000"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    // Tick 1: discovery creates the trade and the signal is accepted.
    h.cycle(1_000_300).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Signalled);
    let signal = h.ledger.signal_for_window(trade.window_id).unwrap().unwrap();
    assert_eq!(signal.confirm_ts, 1_000_420);

    // Tick 2 at the confirm time: collapses into WAITING_CAP.
    h.cycle(1_000_420).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::WaitingCap);

    // Tick 3: three consecutive ticks at or under the cap pass it.
    h.set_ticks(vec![
        PriceTick::new(1_000_421, dec!(0.50)),
        PriceTick::new(1_000_431, dec!(0.54)),
        PriceTick::new(1_000_441, dec!(0.52)),
    ]);
    h.cycle(1_000_500).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Ready);
    let cap = h.ledger.cap_check_for_trade(trade.id).unwrap().unwrap();
    assert_eq!(cap.status, CapCheckStatus::Pass);
    assert_eq!(cap.first_pass_ts, Some(1_000_441));

    // Tick 4: approval card goes out.
    h.cycle(1_000_560).await;
    assert_eq!(h.notifier.approvals.lock().len(), 1);

    // User approves; paper order fills at the cap.
    h.decide(trade.id, Verdict::Ok, 1_000_600).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::OrderPlaced);
    assert_eq!(trade.decision, Decision::Ok);
    assert_eq!(trade.fill_status, FillStatus::Filled);
    assert_eq!(trade.fill_price, Some(dec!(0.55)));
    assert_eq!(trade.order_id.as_deref(), Some(&format!("paper-{}", trade.id)[..]));

    // Window resolves UP; the trade settles as a win and the streak
    // moves.
    h.resolve(Direction::Up);
    h.cycle(1_003_700).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Settled);
    assert_eq!(trade.is_win, Some(true));
    assert!(trade.pnl.unwrap() > dec!(8));

    let stats = h.ledger.stats().unwrap();
    assert_eq!(stats.trade_level_streak, 1);
    assert_eq!(stats.total_wins, 1);
    assert_eq!(stats.total_trades, 1);
}

/// A signal whose confirm time lands past the window close cancels
/// LATE without touching streaks.
#[tokio::test]
async fn test_late_confirm_cancels() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-late"));
    // Signal near the close: confirm 1_003_620 >= end 1_003_600.
    h.script_oracle(vec![Some(ta_signal(1_003_500, 50.0))]);

    h.cycle(1_003_510).await;
    assert_eq!(h.only_trade().status, TradeStatus::Signalled);

    h.cycle(1_003_570).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(trade.cancel_reason, Some(CancelReason::Late));

    let stats = h.ledger.stats().unwrap();
    assert_eq!(stats.trade_level_streak, 0);
    assert_eq!(stats.total_trades, 0);
}

/// Pre-confirm dips never count toward the cap run; with nothing
/// qualifying after confirm, the check fails at the close.
#[tokio::test]
async fn test_cap_fail_ignores_pre_confirm_ticks() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-capfail"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    h.cycle(1_000_420).await;
    assert_eq!(h.only_trade().status, TradeStatus::WaitingCap);

    // Cheap ticks before confirm (1_000_420), expensive ones after.
    h.set_ticks(vec![
        PriceTick::new(1_000_400, dec!(0.40)),
        PriceTick::new(1_000_410, dec!(0.42)),
        PriceTick::new(1_000_425, dec!(0.60)),
        PriceTick::new(1_000_500, dec!(0.58)),
    ]);
    h.cycle(1_003_600).await;

    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(trade.cancel_reason, Some(CancelReason::CapFail));
    let cap = h.ledger.cap_check_for_trade(trade.id).unwrap().unwrap();
    assert_eq!(cap.status, CapCheckStatus::Fail);
    assert_eq!(cap.consecutive_ticks, 0);
    assert_eq!(cap.first_pass_ts, None);
}

/// SEARCHING_SIGNAL holds through weak and absent signals and accepts
/// the first qualifying one.
#[tokio::test]
async fn test_searching_holds_until_qualifying_signal() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-hold"));
    h.script_oracle(vec![
        Some(ta_signal(1_000_100, 20.0)), // below threshold 35
        None,
        Some(ta_signal(1_000_220, 40.0)), // qualifies
    ]);

    h.cycle(1_000_120).await;
    assert_eq!(h.only_trade().status, TradeStatus::SearchingSignal);

    h.cycle(1_000_180).await;
    assert_eq!(h.only_trade().status, TradeStatus::SearchingSignal);

    h.cycle(1_000_240).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Signalled);
    // The accepted signal is the third one, not the weak first.
    let signal = h.ledger.signal_for_window(trade.window_id).unwrap().unwrap();
    assert_eq!(signal.quality, 40.0);
    assert_eq!(signal.signal_ts, 1_000_220);
}

/// Night auto-OK under SOFT reset: the winning night trade takes the
/// night streak to its cap, which zeroes it and drops to BASE while
/// leaving the trade-level streak counting.
#[tokio::test]
async fn test_night_auto_ok_soft_reset() {
    let h = Harness::new(Harness::default_policy());

    // Pre-existing streaks: 6 straight wins, 4 of them at night.
    let mut stats = h.ledger.stats().unwrap();
    stats.trade_level_streak = 6;
    stats.night_streak = 4;
    stats.policy_mode = PolicyMode::Strict;
    stats.total_trades = 6;
    stats.total_wins = 6;
    h.ledger.update_stats(&stats, NIGHT_START).unwrap();

    h.publish_window(night_window_fixture("btc-up-or-down-night"));
    // STRICT threshold at streak 6: 35 + (6-3+1)*5 = 55.
    h.script_oracle(vec![Some(ta_signal(NIGHT_START + 300, 60.0))]);

    h.cycle(NIGHT_START + 300).await;
    assert_eq!(h.only_trade().status, TradeStatus::Signalled);
    h.cycle(NIGHT_START + 420).await;
    h.set_ticks(vec![
        PriceTick::new(NIGHT_START + 421, dec!(0.50)),
        PriceTick::new(NIGHT_START + 431, dec!(0.54)),
        PriceTick::new(NIGHT_START + 441, dec!(0.52)),
    ]);
    h.cycle(NIGHT_START + 500).await;
    assert_eq!(h.only_trade().status, TradeStatus::Ready);

    // Night tick: auto-approved without any approval card.
    h.cycle(NIGHT_START + 560).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::OrderPlaced);
    assert_eq!(trade.decision, Decision::AutoOk);
    assert!(h.notifier.approvals.lock().is_empty());

    h.resolve(Direction::Up);
    h.cycle(NIGHT_END + 100).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Settled);
    assert_eq!(trade.is_win, Some(true));

    // The win took night_streak to 5 (the cap), so SOFT reset fired.
    let stats = h.ledger.stats().unwrap();
    assert_eq!(stats.night_streak, 0);
    assert_eq!(stats.policy_mode, PolicyMode::Base);
    assert_eq!(stats.trade_level_streak, 7);
    assert_eq!(stats.total_wins, 7);
}

/// Day-mode approval that never gets an answer auto-skips at the
/// response deadline; streaks are untouched.
#[tokio::test]
async fn test_user_timeout_auto_skips() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-timeout"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    h.cycle(1_000_420).await;
    h.set_ticks(vec![
        PriceTick::new(1_000_421, dec!(0.50)),
        PriceTick::new(1_000_431, dec!(0.54)),
        PriceTick::new(1_000_441, dec!(0.52)),
    ]);
    h.cycle(1_000_500).await;

    // Approval emitted at t0 = 1_000_560.
    h.cycle(1_000_560).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Ready);
    assert_eq!(trade.approval_emitted_at, Some(1_000_560));

    // Still waiting one tick before the deadline.
    h.cycle(1_000_700).await;
    assert_eq!(h.only_trade().status, TradeStatus::Ready);

    // Next tick at t0 + 300: auto-skip.
    h.cycle(1_000_860).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(trade.cancel_reason, Some(CancelReason::Expired));
    assert_eq!(trade.decision, Decision::AutoSkip);

    let stats = h.ledger.stats().unwrap();
    assert_eq!(stats.trade_level_streak, 0);
    assert_eq!(stats.total_trades, 0);
}

/// User SKIP cancels with the SKIP decision recorded.
#[tokio::test]
async fn test_user_skip() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-skip"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    h.cycle(1_000_420).await;
    h.set_ticks(vec![
        PriceTick::new(1_000_421, dec!(0.50)),
        PriceTick::new(1_000_431, dec!(0.54)),
        PriceTick::new(1_000_441, dec!(0.52)),
    ]);
    h.cycle(1_000_500).await;
    let trade = h.only_trade();

    h.decide(trade.id, Verdict::Skip, 1_000_600).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(trade.cancel_reason, Some(CancelReason::Skip));
    assert_eq!(trade.decision, Decision::Skip);
}

/// Night trading disabled: READY at night cancels NIGHT_DISABLED.
#[tokio::test]
async fn test_night_disabled() {
    let mut policy = Harness::default_policy();
    policy.night_autotrade_enabled = false;
    let h = Harness::new(policy);

    h.publish_window(night_window_fixture("btc-up-or-down-nightoff"));
    h.script_oracle(vec![Some(ta_signal(NIGHT_START + 300, 60.0))]);

    h.cycle(NIGHT_START + 300).await;
    h.cycle(NIGHT_START + 420).await;
    h.set_ticks(vec![
        PriceTick::new(NIGHT_START + 421, dec!(0.50)),
        PriceTick::new(NIGHT_START + 431, dec!(0.54)),
        PriceTick::new(NIGHT_START + 441, dec!(0.52)),
    ]);
    h.cycle(NIGHT_START + 500).await;
    assert_eq!(h.only_trade().status, TradeStatus::Ready);

    h.cycle(NIGHT_START + 560).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(trade.cancel_reason, Some(CancelReason::NightDisabled));
}

/// SEARCHING_SIGNAL expires with NO_SIGNAL once the window closes.
#[tokio::test]
async fn test_search_expires_no_signal() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-nosig"));
    h.script_oracle(vec![None, None]);

    h.cycle(1_000_300).await;
    assert_eq!(h.only_trade().status, TradeStatus::SearchingSignal);

    h.cycle(1_003_650).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(trade.cancel_reason, Some(CancelReason::NoSignal));
}

/// Replaying a cycle with unchanged inputs produces no additional
/// transitions and no new rows.
#[tokio::test]
async fn test_cycle_replay_is_idempotent() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-replay"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    let before = h.only_trade();
    assert_eq!(before.status, TradeStatus::Signalled);

    // Same clock, no new oracle output, no ticks: nothing may change.
    h.cycle(1_000_300).await;
    h.cycle(1_000_300).await;
    let after = h.only_trade();
    assert_eq!(after.status, TradeStatus::Signalled);
    assert_eq!(after.signal_id, before.signal_id);
    assert_eq!(h.ledger.live_trades().unwrap().len(), 1);

    // Re-discovery of the same window creates no second trade.
    let windows = h.catalog.windows.lock().clone();
    assert_eq!(windows.len(), 1);
}

/// Paused: no new windows are tracked, in-flight trades keep moving.
#[tokio::test]
async fn test_pause_blocks_new_trades_only() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-pausedold"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    assert_eq!(h.only_trade().status, TradeStatus::Signalled);

    h.ledger.set_paused(true, 1_000_350).unwrap();
    h.publish_window(MarketWindow {
        slug: "btc-up-or-down-pausednew".to_string(),
        ..day_window_fixture("ignored")
    });

    // The in-flight trade still advances through its confirm gate.
    h.cycle(1_000_420).await;
    let live = h.ledger.live_trades().unwrap();
    assert_eq!(live.len(), 1, "no trade created while paused");
    assert_eq!(live[0].status, TradeStatus::WaitingCap);

    // Unpausing picks the second window up.
    h.ledger.set_paused(false, 1_000_450).unwrap();
    h.cycle(1_000_480).await;
    assert_eq!(h.ledger.live_trades().unwrap().len(), 2);
}

/// A decision arriving before READY is held and consumed at READY.
#[tokio::test]
async fn test_early_decision_consumed_at_ready() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-early"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    let trade = h.only_trade();
    // User answers while the trade is still SIGNALLED.
    h.decide(trade.id, Verdict::Ok, 1_000_310).await;
    assert_eq!(h.only_trade().status, TradeStatus::Signalled);

    h.cycle(1_000_420).await;
    h.set_ticks(vec![
        PriceTick::new(1_000_421, dec!(0.50)),
        PriceTick::new(1_000_431, dec!(0.54)),
        PriceTick::new(1_000_441, dec!(0.52)),
    ]);
    h.cycle(1_000_500).await;

    // The cap step reached READY; the held decision is consumed on the
    // next evaluation of the trade.
    h.cycle(1_000_560).await;
    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::OrderPlaced);
    assert_eq!(trade.decision, Decision::Ok);
}

/// Losing settlement zeroes the streaks.
#[tokio::test]
async fn test_losing_settlement_resets_streaks() {
    let h = Harness::new(Harness::default_policy());

    let mut stats = h.ledger.stats().unwrap();
    stats.trade_level_streak = 2;
    stats.total_trades = 2;
    stats.total_wins = 2;
    h.ledger.update_stats(&stats, START).unwrap();

    h.publish_window(day_window_fixture("btc-up-or-down-loss"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    h.cycle(1_000_420).await;
    h.set_ticks(vec![
        PriceTick::new(1_000_421, dec!(0.50)),
        PriceTick::new(1_000_431, dec!(0.54)),
        PriceTick::new(1_000_441, dec!(0.52)),
    ]);
    h.cycle(1_000_500).await;
    let trade = h.only_trade();
    h.decide(trade.id, Verdict::Ok, 1_000_600).await;

    h.resolve(Direction::Down);
    h.cycle(1_003_700).await;

    let trade = h.only_trade();
    assert_eq!(trade.status, TradeStatus::Settled);
    assert_eq!(trade.is_win, Some(false));
    assert_eq!(trade.pnl, Some(dec!(-10)));

    let stats = h.ledger.stats().unwrap();
    assert_eq!(stats.trade_level_streak, 0);
    assert_eq!(stats.policy_mode, PolicyMode::Base);
    assert_eq!(stats.total_losses, 1);
    assert_eq!(stats.total_trades, 3);
}

/// An unresolved window keeps the trade in ORDER_PLACED; resolution on
/// a later cycle settles it.
#[tokio::test]
async fn test_settlement_waits_for_outcome() {
    let h = Harness::new(Harness::default_policy());
    h.publish_window(day_window_fixture("btc-up-or-down-slow"));
    h.script_oracle(vec![Some(ta_signal(1_000_300, 50.0))]);

    h.cycle(1_000_300).await;
    h.cycle(1_000_420).await;
    h.set_ticks(vec![
        PriceTick::new(1_000_421, dec!(0.50)),
        PriceTick::new(1_000_431, dec!(0.54)),
        PriceTick::new(1_000_441, dec!(0.52)),
    ]);
    h.cycle(1_000_500).await;
    let trade = h.only_trade();
    h.decide(trade.id, Verdict::Ok, 1_000_600).await;

    // Window closed but no outcome yet.
    h.cycle(1_003_700).await;
    assert_eq!(h.only_trade().status, TradeStatus::OrderPlaced);

    h.resolve(Direction::Up);
    h.cycle(1_003_760).await;
    assert_eq!(h.only_trade().status, TradeStatus::Settled);
}
