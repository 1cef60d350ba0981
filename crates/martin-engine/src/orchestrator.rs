//! The per-tick trading orchestrator.
//!
//! Drives every non-terminal trade forward at most one status step per
//! cycle (the confirm-gate collapse being the one sanctioned
//! exception), creates trades for newly-discovered windows, and hands
//! settled trades to the policy engine. Every evaluation of a trade
//! runs behind its advisory lock; a failure on one trade is logged and
//! never aborts the cycle.

use crate::cap::{evaluate_cap, CapParams};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::locks::TradeLocks;
use dashmap::DashMap;
use martin_core::{
    Decision, FillStatus, MarketWindow, TaSignal, TimeMode, Trade, TradeEvent, TradeStatus,
};
use martin_detector::TaOracle;
use martin_executor::{settle as resolve_settlement, Executor, ExecutorError, PlacementRequest};
use martin_feed::SnapshotCache;
use martin_ledger::{Ledger, SignalRecord};
use martin_notify::{ApprovalCard, Notifier, UserDecision, Verdict};
use martin_policy::{
    acceptance_threshold, apply_night_reset, night_streak_capped, on_settlement, PolicyConfig,
    RollingQuantileConfig,
};
use martin_sources::{MarketCatalog, OrderBook, SettlementSource};
use martin_telemetry::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Summary of one orchestrator cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: u64,
    pub windows_discovered: usize,
    pub trades_created: usize,
    pub trades_processed: usize,
    pub trades_failed: usize,
}

/// External collaborators handed to the orchestrator.
pub struct Collaborators {
    pub catalog: Arc<dyn MarketCatalog>,
    pub book: Arc<dyn OrderBook>,
    pub settlement: Arc<dyn SettlementSource>,
    pub oracle: Arc<dyn TaOracle>,
    pub executor: Arc<dyn Executor>,
    pub notifier: Arc<dyn Notifier>,
}

/// The per-tick driver.
pub struct Orchestrator {
    config: EngineConfig,
    policy: PolicyConfig,
    quantile: RollingQuantileConfig,
    ledger: Arc<Ledger>,
    cache: Arc<SnapshotCache>,
    peers: Collaborators,
    locks: TradeLocks,
    /// Decisions received but not yet consumed by a READY evaluation.
    pending_decisions: DashMap<i64, UserDecision>,
    cycle_id: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        policy: PolicyConfig,
        quantile: RollingQuantileConfig,
        ledger: Arc<Ledger>,
        cache: Arc<SnapshotCache>,
        peers: Collaborators,
    ) -> EngineResult<Self> {
        config.validate()?;
        policy
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        quantile
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config,
            policy,
            quantile,
            ledger,
            cache,
            peers,
            locks: TradeLocks::new(),
            pending_decisions: DashMap::new(),
            cycle_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record a user decision and evaluate its trade immediately.
    ///
    /// Goes through the same advisory lock as cycle processing, so a
    /// decision and a tick can never both transition the trade.
    pub async fn handle_decision(&self, decision: UserDecision, now: i64) {
        let trade_id = decision.trade_id;
        debug!(trade_id, verdict = ?decision.verdict, "User decision received");
        self.pending_decisions.insert(trade_id, decision);

        let _guard = self.locks.acquire(trade_id).await;
        if let Err(e) = self.process_trade(trade_id, self.current_cycle(), now).await {
            self.handle_trade_failure(trade_id, &e, now);
        }
        // Decisions for dead or unknown trades must not pile up; a
        // decision for a trade still on its way to READY stays queued.
        match self.ledger.get_trade(trade_id) {
            Ok(trade) if !trade.status.is_terminal() => {}
            _ => {
                self.pending_decisions.remove(&trade_id);
                self.locks.release(trade_id);
            }
        }
    }

    fn current_cycle(&self) -> u64 {
        self.cycle_id.load(Ordering::SeqCst)
    }

    /// Execute one full cycle at wall-clock `now`.
    pub async fn run_cycle(&self, now: i64) -> CycleReport {
        let cycle_id = self.cycle_id.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let mut report = CycleReport {
            cycle_id,
            ..Default::default()
        };

        let stats = match self.ledger.stats() {
            Ok(stats) => stats,
            Err(e) => {
                error!(cycle_id, error = %e, "Cannot read stats, skipping cycle");
                Metrics::cycle_completed(false);
                return report;
            }
        };

        // Discovery. Paused inhibits new trades; in-flight ones below
        // keep progressing.
        if !stats.is_paused {
            match self
                .peers
                .catalog
                .list_open_windows(&self.config.assets, now)
                .await
            {
                Ok(windows) => {
                    report.windows_discovered = windows.len();
                    for window in windows {
                        match self.track_window(&window, now) {
                            Ok(true) => report.trades_created += 1,
                            Ok(false) => {}
                            Err(e) => warn!(slug = %window.slug, error = %e, "Discovery skip"),
                        }
                    }
                }
                Err(e) => {
                    warn!(cycle_id, error = %e, "Discovery fetch failed");
                    Metrics::fetch_failure("catalog");
                }
            }
        }

        // Per-trade processing, strictly serialized per trade.
        let live = match self.ledger.live_trades() {
            Ok(live) => live,
            Err(e) => {
                error!(cycle_id, error = %e, "Cannot list live trades");
                Metrics::cycle_completed(false);
                return report;
            }
        };
        for trade in live {
            let guard = self.locks.acquire(trade.id).await;
            let result = self.process_trade(trade.id, cycle_id, now).await;
            drop(guard);
            match result {
                Ok(()) => report.trades_processed += 1,
                Err(e) => {
                    report.trades_failed += 1;
                    self.handle_trade_failure(trade.id, &e, now);
                }
            }
            if let Ok(after) = self.ledger.get_trade(trade.id) {
                if after.status.is_terminal() {
                    self.locks.release(trade.id);
                    self.pending_decisions.remove(&trade.id);
                }
            }
        }

        Metrics::cycle_completed(true);
        Metrics::cycle_duration(started.elapsed().as_secs_f64());
        info!(
            cycle_id,
            windows = report.windows_discovered,
            created = report.trades_created,
            processed = report.trades_processed,
            failed = report.trades_failed,
            "Cycle complete"
        );
        report
    }

    fn handle_trade_failure(&self, trade_id: i64, error: &EngineError, now: i64) {
        error!(trade_id, error = %error, "Trade step failed");
        if error.freezes_trade() {
            if let Err(freeze_err) = self.ledger.freeze_error(trade_id, &error.to_string(), now) {
                error!(trade_id, error = %freeze_err, "Failed to freeze trade");
            }
        }
    }

    /// Register a discovered window; returns true when a trade was
    /// created. A window already carrying a non-terminal trade is a
    /// no-op.
    fn track_window(&self, window: &MarketWindow, now: i64) -> EngineResult<bool> {
        if window.is_expired_at(now) {
            return Ok(false);
        }
        let stored = self.ledger.upsert_window(window, now)?;
        if stored.end_ts - stored.start_ts != self.config.window_seconds {
            debug!(
                slug = %stored.slug,
                length = stored.end_ts - stored.start_ts,
                expected = self.config.window_seconds,
                "Window length differs from configured"
            );
        }
        if self.ledger.find_live_trade(stored.id)?.is_some() {
            return Ok(false);
        }
        let trade = self.ledger.create_trade(stored.id, now)?;
        self.ledger.start_search(trade.id, now)?;
        Metrics::transition(TradeStatus::SearchingSignal.as_str());
        info!(trade_id = trade.id, slug = %stored.slug, "Tracking new window");
        Ok(true)
    }

    /// Advance one trade by (at most) one lifecycle step.
    ///
    /// Caller holds the trade's advisory lock.
    async fn process_trade(&self, trade_id: i64, cycle_id: u64, now: i64) -> EngineResult<()> {
        let trade = self.ledger.get_trade(trade_id)?;
        if trade.status.is_terminal() {
            return Ok(());
        }
        let window = self.ledger.get_window(trade.window_id)?;
        let stats = self.ledger.stats()?;

        match trade.status {
            TradeStatus::New => {
                // Normally discovery advances NEW immediately; a trade
                // seen here was caught by a crash or a pause.
                if stats.is_paused {
                    self.cancel(trade.id, TradeEvent::Paused, now)?;
                } else if window.is_expired_at(now) {
                    self.cancel(trade.id, TradeEvent::WindowExpired, now)?;
                } else {
                    self.ledger.start_search(trade.id, now)?;
                    Metrics::transition(TradeStatus::SearchingSignal.as_str());
                }
                Ok(())
            }
            TradeStatus::SearchingSignal => self.step_searching(&trade, &window, &stats, now).await,
            TradeStatus::Signalled | TradeStatus::WaitingConfirm => {
                self.step_confirm_gate(&trade, &window, &stats, now)
            }
            TradeStatus::WaitingCap => self.step_cap(&trade, &window, now).await,
            TradeStatus::Ready => self.step_ready(&trade, &window, &stats, now).await,
            TradeStatus::OrderPlaced => self.step_order(&trade, &window, cycle_id, now).await,
            TradeStatus::Settled | TradeStatus::Cancelled | TradeStatus::Error => Ok(()),
        }
    }

    fn cancel(&self, trade_id: i64, event: TradeEvent, now: i64) -> EngineResult<Trade> {
        let trade = self.ledger.cancel(trade_id, event, now)?;
        Metrics::transition(trade.status.as_str());
        Ok(trade)
    }

    /// Threshold samples for the rolling-quantile source, if enabled.
    fn quantile_samples(&self, time_mode: TimeMode, now: i64) -> EngineResult<Vec<f64>> {
        if !self.quantile.enabled {
            return Ok(Vec::new());
        }
        let since = now - self.quantile.rolling_days as i64 * 86_400;
        Ok(self
            .ledger
            .settled_qualities(time_mode, since, self.quantile.max_samples)?)
    }

    // ------------------------------------------------------------------
    // SEARCHING_SIGNAL
    // ------------------------------------------------------------------

    async fn step_searching(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        stats: &martin_core::Stats,
        now: i64,
    ) -> EngineResult<()> {
        if window.is_expired_at(now) {
            self.cancel(trade.id, TradeEvent::WindowExpired, now)?;
            return Ok(());
        }
        if stats.is_paused {
            debug!(trade_id = trade.id, "Paused, search deferred");
            return Ok(());
        }
        let time_mode = self.config.day_window.mode_at(now);
        if (stats.day_only && time_mode == TimeMode::Night)
            || (stats.night_only && time_mode == TimeMode::Day)
        {
            debug!(trade_id = trade.id, mode = %time_mode, "Outside allowed session, search deferred");
            return Ok(());
        }

        let Some(ctx) = self.cache.get(&window.asset) else {
            debug!(trade_id = trade.id, asset = %window.asset, "No snapshot yet");
            return Ok(());
        };
        Metrics::snapshot_age(window.asset.as_str(), ctx.age_secs(now) as f64);
        if !ctx.is_fresh(now, self.config.max_snapshot_age_secs()) {
            debug!(
                trade_id = trade.id,
                asset = %window.asset,
                age_secs = ctx.age_secs(now),
                "Snapshot stale, search deferred"
            );
            return Ok(());
        }

        let Some(signal) = self.peers.oracle.evaluate(window, now, &ctx) else {
            debug!(trade_id = trade.id, "No signal");
            return Ok(());
        };
        if let Err(detail) = validate_signal(&signal, window, now) {
            warn!(trade_id = trade.id, %detail, "Oracle output rejected");
            return Ok(());
        }

        let samples = self.quantile_samples(time_mode, now)?;
        let threshold =
            acceptance_threshold(&self.policy, &self.quantile, stats, time_mode, &samples);
        if signal.quality < threshold {
            debug!(
                trade_id = trade.id,
                quality = signal.quality,
                threshold,
                "Signal below threshold, staying in search"
            );
            return Ok(());
        }

        let (trade, record) = self.ledger.accept_signal(
            trade.id,
            window,
            &signal,
            self.config.confirm_delay_seconds,
            now,
        )?;
        Metrics::transition(trade.status.as_str());
        Metrics::signal_accepted(window.asset.as_str(), record.direction.as_str());
        if let Err(e) = self
            .peers
            .notifier
            .emit_status(&format!(
                "signal accepted: {} {} q={:.1} confirm at {}",
                window.asset, record.direction, record.quality, record.confirm_ts
            ))
            .await
        {
            warn!(trade_id = trade.id, error = %e, "Signal notification failed");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // SIGNALLED / WAITING_CONFIRM
    // ------------------------------------------------------------------

    fn step_confirm_gate(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        stats: &martin_core::Stats,
        now: i64,
    ) -> EngineResult<()> {
        let signal = self.require_signal(trade, window)?;

        if trade.status == TradeStatus::Signalled {
            if signal.confirm_ts >= window.end_ts {
                self.cancel(trade.id, TradeEvent::ConfirmLate, now)?;
                return Ok(());
            }
            // The threshold may have risen since acceptance (STRICT).
            let time_mode = self.config.day_window.mode_at(now);
            let samples = self.quantile_samples(time_mode, now)?;
            let threshold =
                acceptance_threshold(&self.policy, &self.quantile, stats, time_mode, &samples);
            if signal.quality < threshold {
                info!(
                    trade_id = trade.id,
                    quality = signal.quality,
                    threshold,
                    "Signal no longer meets the strict threshold"
                );
                self.cancel(trade.id, TradeEvent::QualityBelowStrict, now)?;
                return Ok(());
            }
        }

        if now < signal.confirm_ts {
            return Ok(());
        }

        // Confirm reached. SIGNALLED collapses through WAITING_CONFIRM
        // into WAITING_CAP in one cycle; both steps are individually
        // legal.
        let token_id = trade
            .token_id
            .clone()
            .unwrap_or_else(|| window.token_for(signal.direction).to_string());
        let mut current = self.ledger.mark_confirm_reached(
            trade.id,
            &token_id,
            signal.confirm_ts,
            window.end_ts,
            now,
        )?;
        Metrics::transition(current.status.as_str());
        if current.status == TradeStatus::WaitingConfirm {
            current = self.ledger.mark_confirm_reached(
                trade.id,
                &token_id,
                signal.confirm_ts,
                window.end_ts,
                now,
            )?;
            Metrics::transition(current.status.as_str());
        }
        debug!(trade_id = trade.id, status = %current.status, "Confirm gate passed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // WAITING_CAP
    // ------------------------------------------------------------------

    async fn step_cap(&self, trade: &Trade, window: &MarketWindow, now: i64) -> EngineResult<()> {
        let signal = self.require_signal(trade, window)?;
        let token_id = trade.token_id.as_deref().ok_or(EngineError::Invariant {
            trade_id: trade.id,
            detail: "WAITING_CAP without token_id".to_string(),
        })?;

        let params = CapParams {
            confirm_ts: signal.confirm_ts,
            end_ts: window.end_ts,
            price_cap: self.config.price_cap,
            cap_min_ticks: self.config.cap_min_ticks,
        };

        let to = now.min(window.end_ts);
        let ticks = match self
            .peers
            .book
            .price_ticks(token_id, signal.confirm_ts, to)
            .await
        {
            Ok(ticks) => ticks,
            Err(e) => {
                // Transient: stay in WAITING_CAP for the next cycle.
                warn!(trade_id = trade.id, error = %e, "Tick fetch failed");
                Metrics::fetch_failure("book_ticks");
                return Ok(());
            }
        };

        let outcome = evaluate_cap(&ticks, &params, now);
        let updated = self.ledger.apply_cap_verdict(
            trade.id,
            outcome.status,
            outcome.consecutive_ticks,
            outcome.first_pass_ts,
            outcome.price_at_pass,
            now,
        )?;
        if updated.status != TradeStatus::WaitingCap {
            Metrics::transition(updated.status.as_str());
            info!(
                trade_id = trade.id,
                verdict = %outcome.status,
                consecutive_ticks = outcome.consecutive_ticks,
                "Cap check resolved"
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // READY
    // ------------------------------------------------------------------

    async fn step_ready(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        stats: &martin_core::Stats,
        now: i64,
    ) -> EngineResult<()> {
        // A recorded user decision wins regardless of time mode.
        if let Some((_, decision)) = self.pending_decisions.remove(&trade.id) {
            return match decision.verdict {
                Verdict::Ok => {
                    self.execute(trade, window, stats, TradeEvent::UserApproved, Decision::Ok, now)
                        .await
                }
                Verdict::Skip => {
                    self.cancel(trade.id, TradeEvent::UserSkipped, now)?;
                    Ok(())
                }
            };
        }

        let time_mode = self.config.day_window.mode_at(now);
        match time_mode {
            TimeMode::Day => {
                match trade.approval_emitted_at {
                    None => {
                        let signal = self.require_signal(trade, window)?;
                        let card = ApprovalCard {
                            trade_id: trade.id,
                            asset: window.asset.to_string(),
                            slug: window.slug.clone(),
                            direction: signal.direction,
                            quality: signal.quality,
                            entry_price: self.config.price_cap,
                            stake: self.config.stake_amount,
                            time_mode,
                            response_window_secs: self.policy.max_response_seconds,
                        };
                        // Record the emission only after delivery; a
                        // failed emit retries next cycle.
                        self.peers.notifier.emit_approval(&card).await?;
                        self.ledger.record_approval_emitted(trade.id, time_mode, now)?;
                    }
                    Some(emitted_at) => {
                        if now - emitted_at >= self.policy.max_response_seconds {
                            info!(trade_id = trade.id, "Approval window elapsed, auto-skip");
                            self.cancel(trade.id, TradeEvent::DecisionTimeout, now)?;
                        }
                    }
                }
                Ok(())
            }
            TimeMode::Night => {
                let night_allowed = self.policy.night_autotrade_enabled
                    && self.policy.night_session_mode != martin_core::NightSessionMode::Off
                    && !stats.day_only;
                if !night_allowed {
                    self.cancel(trade.id, TradeEvent::NightDisabled, now)?;
                    return Ok(());
                }
                if night_streak_capped(&self.policy, stats) {
                    let mut reset = stats.clone();
                    apply_night_reset(&self.policy, &mut reset);
                    self.ledger.update_stats(&reset, now)?;
                    info!(
                        trade_id = trade.id,
                        "Night streak capped, session reset applied"
                    );
                    self.cancel(trade.id, TradeEvent::NightDisabled, now)?;
                    return Ok(());
                }
                self.execute(
                    trade,
                    window,
                    stats,
                    TradeEvent::AutoApproved,
                    Decision::AutoOk,
                    now,
                )
                .await
            }
        }
    }

    /// Approve the trade and place (or simulate) its order.
    async fn execute(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        stats: &martin_core::Stats,
        event: TradeEvent,
        decision: Decision,
        now: i64,
    ) -> EngineResult<()> {
        let signal = self.require_signal(trade, window)?;
        let time_mode = self.config.day_window.mode_at(now);
        let approved = self.ledger.approve(
            trade.id,
            event,
            decision,
            time_mode,
            stats,
            self.config.stake_amount,
            now,
        )?;
        Metrics::transition(approved.status.as_str());

        let request = PlacementRequest {
            trade_id: trade.id,
            token_id: approved
                .token_id
                .clone()
                .unwrap_or_else(|| window.token_for(signal.direction).to_string()),
            limit_price: self.config.price_cap,
            stake: self.config.stake_amount,
        };
        match self.peers.executor.place(&request).await {
            Ok(order) => {
                self.ledger.record_order(
                    trade.id,
                    &order.order_id,
                    order.fill_status,
                    order.fill_price,
                    now,
                )?;
                Ok(())
            }
            Err(ExecutorError::Rejected(reason)) => {
                warn!(trade_id = trade.id, reason = %reason, "Placement rejected");
                let errored = self.ledger.reject_order(trade.id, now)?;
                Metrics::transition(errored.status.as_str());
                Ok(())
            }
            Err(e) => {
                // Transient: the trade stays ORDER_PLACED without an
                // order id and the next cycle re-places idempotently.
                warn!(trade_id = trade.id, error = %e, "Placement failed, will retry");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // ORDER_PLACED
    // ------------------------------------------------------------------

    async fn step_order(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        cycle_id: u64,
        now: i64,
    ) -> EngineResult<()> {
        let trade = if trade.fill_status.counts_as_filled() {
            trade.clone()
        } else {
            self.refresh_fill(trade, window, now).await?
        };
        if !trade.status.is_terminal() && trade.fill_status.counts_as_filled() {
            self.try_settle(&trade, window, cycle_id, now).await?;
        }
        Ok(())
    }

    /// Re-place or re-poll an unfilled order.
    async fn refresh_fill(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        now: i64,
    ) -> EngineResult<Trade> {
        let placed = match &trade.order_id {
            None => {
                // Placement never completed; `place` is idempotent per
                // trade id, so a retry cannot double-submit.
                let signal = self.require_signal(trade, window)?;
                let request = PlacementRequest {
                    trade_id: trade.id,
                    token_id: trade
                        .token_id
                        .clone()
                        .unwrap_or_else(|| window.token_for(signal.direction).to_string()),
                    limit_price: self.config.price_cap,
                    stake: trade.stake_amount,
                };
                self.peers.executor.place(&request).await
            }
            Some(order_id) => self.peers.executor.poll(trade.id, order_id).await,
        };

        match placed {
            Ok(order) => {
                let updated = self.ledger.record_order(
                    trade.id,
                    &order.order_id,
                    order.fill_status,
                    order.fill_price,
                    now,
                )?;
                match order.fill_status {
                    FillStatus::Rejected | FillStatus::Cancelled => {
                        warn!(
                            trade_id = trade.id,
                            fill_status = order.fill_status.as_str(),
                            "Order did not fill"
                        );
                        let errored = self.ledger.reject_order(trade.id, now)?;
                        Metrics::transition(errored.status.as_str());
                        Ok(errored)
                    }
                    _ => Ok(updated),
                }
            }
            Err(ExecutorError::Rejected(reason)) => {
                warn!(trade_id = trade.id, reason = %reason, "Placement rejected");
                let errored = self.ledger.reject_order(trade.id, now)?;
                Metrics::transition(errored.status.as_str());
                Ok(errored)
            }
            Err(e) => {
                warn!(trade_id = trade.id, error = %e, "Fill refresh failed, retrying next cycle");
                Ok(trade.clone())
            }
        }
    }

    /// Resolve the window outcome and settle a filled trade.
    async fn try_settle(
        &self,
        trade: &Trade,
        window: &MarketWindow,
        cycle_id: u64,
        now: i64,
    ) -> EngineResult<()> {
        if now < window.end_ts {
            return Ok(());
        }
        let past_close = now - window.end_ts;
        if past_close > self.config.settle_timeout_secs {
            return Err(EngineError::Invariant {
                trade_id: trade.id,
                detail: format!("no outcome {past_close}s after window close"),
            });
        }
        // Outcome polls decay after the fast window.
        if past_close > self.config.settle_fast_window_secs
            && cycle_id % self.config.settle_slow_every_cycles != 0
        {
            return Ok(());
        }

        let outcome = match self.peers.settlement.resolved_outcome(window).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!(trade_id = trade.id, slug = %window.slug, "Window not resolved yet");
                return Ok(());
            }
            Err(e) => {
                warn!(trade_id = trade.id, error = %e, "Outcome fetch failed");
                Metrics::fetch_failure("settlement");
                return Ok(());
            }
        };

        let signal = self.require_signal(trade, window)?;
        let fill_price = trade.fill_price.ok_or(EngineError::Invariant {
            trade_id: trade.id,
            detail: "filled trade without fill_price".to_string(),
        })?;
        let settlement =
            resolve_settlement(signal.direction, outcome, trade.stake_amount, fill_price)?;

        // Policy sees the trade as it will be settled.
        let mut settled_view = trade.clone();
        settled_view.is_win = Some(settlement.is_win);
        let stats = self.ledger.stats()?;
        let new_stats = on_settlement(&self.policy, &stats, &settled_view);

        let settled = self.ledger.settle(
            trade.id,
            window.id,
            outcome,
            settlement.is_win,
            settlement.pnl,
            &new_stats,
            now,
        )?;
        Metrics::transition(settled.status.as_str());
        if let Err(e) = self
            .peers
            .notifier
            .emit_status(&format!(
                "settled {}: {} {} pnl={}",
                window.slug,
                window.asset,
                if settlement.is_win { "WIN" } else { "LOSS" },
                settlement.pnl
            ))
            .await
        {
            warn!(trade_id = trade.id, error = %e, "Settlement notification failed");
        }
        Ok(())
    }

    fn require_signal(
        &self,
        trade: &Trade,
        window: &MarketWindow,
    ) -> EngineResult<SignalRecord> {
        self.ledger
            .signal_for_window(window.id)?
            .ok_or(EngineError::Invariant {
                trade_id: trade.id,
                detail: format!("{} without a persisted signal", trade.status),
            })
    }
}

/// Check the oracle honoured its contract.
fn validate_signal(signal: &TaSignal, window: &MarketWindow, now: i64) -> Result<(), String> {
    if signal.quality < 0.0 {
        return Err(format!("negative quality {}", signal.quality));
    }
    if signal.signal_ts < window.start_ts || signal.signal_ts > now {
        return Err(format!(
            "signal_ts {} outside [{}, {now}]",
            signal.signal_ts, window.start_ts
        ));
    }
    Ok(())
}
