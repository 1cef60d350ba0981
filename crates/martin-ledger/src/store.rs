//! The trade ledger.
//!
//! Single writer for windows, signals, trades, cap checks, stats and
//! settings. Every status change goes through `apply_transition`, which
//! re-reads the current status inside the write transaction and
//! consults the core state machine; an illegal event rolls back without
//! mutating anything. Stats updates on settlement happen in the same
//! transaction as the trade row update.

use crate::error::{LedgerError, LedgerResult};
use crate::schema;
use martin_core::{
    transition, CancelReason, CapCheck, CapCheckStatus, Decision, Direction, FillStatus,
    MarketWindow, PolicyMode, Stats, Step, TaSignal, TimeMode, Trade, TradeEvent, TradeStatus,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A persisted signal row.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub id: i64,
    pub window_id: i64,
    pub direction: Direction,
    pub signal_ts: i64,
    pub confirm_ts: i64,
    pub quality: f64,
    pub breakdown: serde_json::Value,
    pub anchor_bar_ts: i64,
}

/// SQLite-backed trade ledger.
pub struct Ledger {
    conn: Mutex<Connection>,
}

impl Ledger {
    /// Open (and migrate) a ledger at `path`.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory ledger (tests, dry runs).
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ------------------------------------------------------------------
    // Windows
    // ------------------------------------------------------------------

    /// Insert a window if its slug is new, otherwise return the stored
    /// row. Discovery runs this every cycle; re-seeing a window is a
    /// no-op.
    pub fn upsert_window(&self, window: &MarketWindow, now: i64) -> LedgerResult<MarketWindow> {
        window
            .validate()
            .map_err(|e| LedgerError::CorruptRow(e.to_string()))?;
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, asset, slug, condition_id, up_token_id, down_token_id,
                        start_ts, end_ts, outcome
                 FROM market_windows WHERE slug = ?1",
                [&window.slug],
                window_from_row,
            )
            .optional()?;
        if let Some(found) = existing {
            return Ok(found);
        }

        conn.execute(
            "INSERT INTO market_windows
                (asset, slug, condition_id, up_token_id, down_token_id,
                 start_ts, end_ts, outcome, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
            params![
                window.asset.as_str(),
                window.slug,
                window.condition_id,
                window.up_token_id,
                window.down_token_id,
                window.start_ts,
                window.end_ts,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(window_id = id, slug = %window.slug, "Window registered");

        let mut stored = window.clone();
        stored.id = id;
        stored.outcome = None;
        Ok(stored)
    }

    pub fn get_window(&self, id: i64) -> LedgerResult<MarketWindow> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, asset, slug, condition_id, up_token_id, down_token_id,
                    start_ts, end_ts, outcome
             FROM market_windows WHERE id = ?1",
            [id],
            window_from_row,
        )
        .optional()?
        .ok_or(LedgerError::WindowNotFound(id))
    }

    /// Record the resolved outcome. Setting it twice to the same value
    /// is a no-op; changing a set outcome is an invariant violation.
    pub fn set_window_outcome(&self, window_id: i64, outcome: Direction) -> LedgerResult<()> {
        let conn = self.conn.lock();
        let current: Option<String> = conn
            .query_row(
                "SELECT outcome FROM market_windows WHERE id = ?1",
                [window_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(LedgerError::WindowNotFound(window_id))?;

        match current {
            Some(existing) if existing == outcome.as_str() => Ok(()),
            Some(existing) => Err(LedgerError::CorruptRow(format!(
                "window {window_id} outcome already {existing}, refusing {outcome}"
            ))),
            None => {
                conn.execute(
                    "UPDATE market_windows SET outcome = ?1 WHERE id = ?2",
                    params![outcome.as_str(), window_id],
                )?;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Trades
    // ------------------------------------------------------------------

    /// Create a NEW trade for a window.
    ///
    /// The partial unique index refuses a second non-terminal trade per
    /// window even if the caller's dedup check raced.
    pub fn create_trade(&self, window_id: i64, now: i64) -> LedgerResult<Trade> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO trades (window_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![window_id, TradeStatus::New.as_str(), now],
        );
        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                debug!(trade_id = id, window_id, "Trade created");
                fetch_trade(&conn, id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::DuplicateTrade { window_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_trade(&self, id: i64) -> LedgerResult<Trade> {
        let conn = self.conn.lock();
        fetch_trade(&conn, id)
    }

    /// The non-terminal trade for a window, if one exists.
    pub fn find_live_trade(&self, window_id: i64) -> LedgerResult<Option<Trade>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE window_id = ?1
                   AND status NOT IN ('SETTLED', 'CANCELLED', 'ERROR')"
            ),
            [window_id],
            trade_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// All non-terminal trades, oldest first.
    pub fn live_trades(&self) -> LedgerResult<Vec<Trade>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades
             WHERE status NOT IN ('SETTLED', 'CANCELLED', 'ERROR')
             ORDER BY id ASC"
        ))?;
        let trades = stmt
            .query_map([], trade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    /// Recently settled/cancelled trades, newest first (status report).
    pub fn recent_closed_trades(&self, limit: u32) -> LedgerResult<Vec<Trade>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades
             WHERE status IN ('SETTLED', 'CANCELLED', 'ERROR')
             ORDER BY updated_at DESC, id DESC LIMIT ?1"
        ))?;
        let trades = stmt
            .query_map([limit], trade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Begin signal search for a freshly-created trade.
    pub fn start_search(&self, trade_id: i64, now: i64) -> LedgerResult<Trade> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        apply_transition(&tx, trade_id, TradeEvent::StartSearch, now)?;
        tx.commit()?;
        fetch_trade(&conn, trade_id)
    }

    /// Cancel a trade with the given domain event.
    ///
    /// `UserSkipped` records the SKIP decision and `DecisionTimeout`
    /// records AUTO_SKIP in the same transaction.
    pub fn cancel(&self, trade_id: i64, event: TradeEvent, now: i64) -> LedgerResult<Trade> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let step = apply_transition(&tx, trade_id, event, now)?;
        if step.next != TradeStatus::Cancelled {
            return Err(LedgerError::InvariantViolation {
                trade_id,
                detail: format!("event {event} is not a cancellation"),
            });
        }
        let decision = match event {
            TradeEvent::UserSkipped => Some(Decision::Skip),
            TradeEvent::DecisionTimeout => Some(Decision::AutoSkip),
            _ => None,
        };
        if let Some(decision) = decision {
            tx.execute(
                "UPDATE trades SET decision = ?1 WHERE id = ?2",
                params![decision.as_str(), trade_id],
            )?;
        }
        tx.commit()?;
        let trade = fetch_trade(&conn, trade_id)?;
        info!(
            trade_id,
            reason = %trade.cancel_reason.map(|r| r.as_str()).unwrap_or("-"),
            "Trade cancelled"
        );
        Ok(trade)
    }

    /// Persist an accepted signal and advance the trade to SIGNALLED.
    ///
    /// The signal row, the trade's `signal_id`/`token_id`, and the
    /// status change land in one transaction. A window can hold at most
    /// one signal.
    pub fn accept_signal(
        &self,
        trade_id: i64,
        window: &MarketWindow,
        signal: &TaSignal,
        confirm_delay_secs: i64,
        now: i64,
    ) -> LedgerResult<(Trade, SignalRecord)> {
        let confirm_ts = signal.signal_ts + confirm_delay_secs;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        apply_transition(&tx, trade_id, TradeEvent::SignalAccepted, now)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO signals
                (window_id, direction, signal_ts, confirm_ts, quality,
                 quality_breakdown, anchor_bar_ts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                window.id,
                signal.direction.as_str(),
                signal.signal_ts,
                confirm_ts,
                signal.quality,
                signal.breakdown.to_string(),
                signal.anchor_bar_ts,
                now,
            ],
        )?;
        if inserted == 0 {
            return Err(LedgerError::DuplicateSignal {
                window_id: window.id,
            });
        }
        let signal_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE trades SET signal_id = ?1, token_id = ?2 WHERE id = ?3",
            params![signal_id, window.token_for(signal.direction), trade_id],
        )?;
        tx.commit()?;

        let trade = fetch_trade(&conn, trade_id)?;
        let record = read_signal_for_window(&conn, window.id)?
            .ok_or(LedgerError::CorruptRow(format!(
                "signal {signal_id} vanished after insert"
            )))?;
        info!(
            trade_id,
            signal_id,
            direction = %record.direction,
            quality = record.quality,
            confirm_ts,
            "Signal accepted"
        );
        Ok((trade, record))
    }

    pub fn signal_for_window(&self, window_id: i64) -> LedgerResult<Option<SignalRecord>> {
        let conn = self.conn.lock();
        read_signal_for_window(&conn, window_id)
    }

    /// Advance past the confirm gate: SIGNALLED becomes WAITING_CONFIRM,
    /// WAITING_CONFIRM becomes WAITING_CAP. On entry to WAITING_CAP a
    /// cap-check row is created if none exists (idempotent per trade).
    pub fn mark_confirm_reached(
        &self,
        trade_id: i64,
        token_id: &str,
        confirm_ts: i64,
        end_ts: i64,
        now: i64,
    ) -> LedgerResult<Trade> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let step = apply_transition(&tx, trade_id, TradeEvent::ConfirmReached, now)?;
        if step.next == TradeStatus::WaitingCap {
            tx.execute(
                "INSERT OR IGNORE INTO cap_checks
                    (trade_id, token_id, confirm_ts, end_ts, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)",
                params![trade_id, token_id, confirm_ts, end_ts, now],
            )?;
        }
        tx.commit()?;
        fetch_trade(&conn, trade_id)
    }

    pub fn cap_check_for_trade(&self, trade_id: i64) -> LedgerResult<Option<CapCheck>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, trade_id, token_id, confirm_ts, end_ts, status,
                    consecutive_ticks, first_pass_ts, price_at_pass
             FROM cap_checks WHERE trade_id = ?1",
            [trade_id],
            cap_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Store a cap evaluation and apply the matching transition.
    ///
    /// PASS moves the trade to READY, FAIL and LATE cancel it, PENDING
    /// only updates the counters.
    pub fn apply_cap_verdict(
        &self,
        trade_id: i64,
        status: CapCheckStatus,
        consecutive_ticks: u32,
        first_pass_ts: Option<i64>,
        price_at_pass: Option<Decimal>,
        now: i64,
    ) -> LedgerResult<Trade> {
        if status == CapCheckStatus::Pass && first_pass_ts.is_none() {
            return Err(LedgerError::InvariantViolation {
                trade_id,
                detail: "cap PASS without first_pass_ts".to_string(),
            });
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let event = match status {
            CapCheckStatus::Pass => Some(TradeEvent::CapPass),
            CapCheckStatus::Fail => Some(TradeEvent::CapFail),
            CapCheckStatus::Late => Some(TradeEvent::CapLate),
            CapCheckStatus::Pending => None,
        };
        if let Some(event) = event {
            apply_transition(&tx, trade_id, event, now)?;
        }
        let updated = tx.execute(
            "UPDATE cap_checks
             SET status = ?1, consecutive_ticks = ?2, first_pass_ts = ?3, price_at_pass = ?4
             WHERE trade_id = ?5",
            params![
                status.as_str(),
                consecutive_ticks,
                first_pass_ts,
                price_at_pass.map(|p| p.to_string()),
                trade_id,
            ],
        )?;
        if updated == 0 {
            return Err(LedgerError::InvariantViolation {
                trade_id,
                detail: "cap verdict for trade without cap_check row".to_string(),
            });
        }
        tx.commit()?;
        fetch_trade(&conn, trade_id)
    }

    /// Record that the approval card was emitted, with the time mode at
    /// emission. Idempotent: a later call never overwrites the first
    /// emission time.
    pub fn record_approval_emitted(
        &self,
        trade_id: i64,
        time_mode: TimeMode,
        now: i64,
    ) -> LedgerResult<Trade> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE trades
             SET approval_emitted_at = COALESCE(approval_emitted_at, ?1),
                 time_mode = COALESCE(time_mode, ?2),
                 updated_at = ?1
             WHERE id = ?3",
            params![now, time_mode.as_str(), trade_id],
        )?;
        fetch_trade(&conn, trade_id)
    }

    /// Approve a READY trade and move it to ORDER_PLACED, snapshotting
    /// the streaks and policy mode it was taken under.
    #[allow(clippy::too_many_arguments)]
    pub fn approve(
        &self,
        trade_id: i64,
        event: TradeEvent,
        decision: Decision,
        time_mode: TimeMode,
        stats: &Stats,
        stake: Decimal,
        now: i64,
    ) -> LedgerResult<Trade> {
        if !decision.is_approved() {
            return Err(LedgerError::InvariantViolation {
                trade_id,
                detail: format!("approve with non-approving decision {}", decision.as_str()),
            });
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let step = apply_transition(&tx, trade_id, event, now)?;
        if step.next != TradeStatus::OrderPlaced {
            return Err(LedgerError::InvariantViolation {
                trade_id,
                detail: format!("event {event} did not place an order"),
            });
        }
        tx.execute(
            "UPDATE trades
             SET decision = ?1, time_mode = ?2, policy_mode = ?3,
                 trade_level_streak = ?4, night_streak = ?5, stake_amount = ?6
             WHERE id = ?7",
            params![
                decision.as_str(),
                time_mode.as_str(),
                stats.policy_mode.as_str(),
                stats.trade_level_streak,
                stats.night_streak,
                stake.to_string(),
                trade_id,
            ],
        )?;
        tx.commit()?;
        fetch_trade(&conn, trade_id)
    }

    /// Record the executor's placement result on an ORDER_PLACED trade.
    pub fn record_order(
        &self,
        trade_id: i64,
        order_id: &str,
        fill_status: FillStatus,
        fill_price: Option<Decimal>,
        now: i64,
    ) -> LedgerResult<Trade> {
        let conn = self.conn.lock();
        let trade = fetch_trade(&conn, trade_id)?;
        if trade.status != TradeStatus::OrderPlaced {
            return Err(LedgerError::WrongStatus {
                trade_id,
                status: trade.status,
                expected: TradeStatus::OrderPlaced,
            });
        }
        conn.execute(
            "UPDATE trades
             SET order_id = ?1, fill_status = ?2, fill_price = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                order_id,
                fill_status.as_str(),
                fill_price.map(|p| p.to_string()),
                now,
                trade_id,
            ],
        )?;
        fetch_trade(&conn, trade_id)
    }

    /// Settle a filled trade: trade row, window outcome and the stats
    /// singleton all change in one transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn settle(
        &self,
        trade_id: i64,
        window_id: i64,
        outcome: Direction,
        is_win: bool,
        pnl: Decimal,
        new_stats: &Stats,
        now: i64,
    ) -> LedgerResult<Trade> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        apply_transition(&tx, trade_id, TradeEvent::Filled, now)?;

        tx.execute(
            "UPDATE trades SET is_win = ?1, pnl = ?2 WHERE id = ?3",
            params![is_win as i64, pnl.to_string(), trade_id],
        )?;
        tx.execute(
            "UPDATE market_windows SET outcome = COALESCE(outcome, ?1) WHERE id = ?2",
            params![outcome.as_str(), window_id],
        )?;
        write_stats(&tx, new_stats, now)?;
        tx.commit()?;

        let trade = fetch_trade(&conn, trade_id)?;
        info!(trade_id, is_win, pnl = %pnl, "Trade settled");
        Ok(trade)
    }

    /// Move an ORDER_PLACED trade to ERROR after a venue rejection.
    pub fn reject_order(&self, trade_id: i64, now: i64) -> LedgerResult<Trade> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        apply_transition(&tx, trade_id, TradeEvent::Rejected, now)?;
        tx.commit()?;
        fetch_trade(&conn, trade_id)
    }

    /// Freeze a trade in ERROR after an invariant violation.
    ///
    /// This is the one write that bypasses the state machine: the
    /// machine has no row for "the machine itself was violated".
    /// Terminal trades are left untouched.
    pub fn freeze_error(&self, trade_id: i64, detail: &str, now: i64) -> LedgerResult<Trade> {
        let conn = self.conn.lock();
        let trade = fetch_trade(&conn, trade_id)?;
        if trade.status.is_terminal() {
            return Ok(trade);
        }
        warn!(trade_id, detail, "Freezing trade in ERROR");
        conn.execute(
            "UPDATE trades SET status = 'ERROR', updated_at = ?1 WHERE id = ?2",
            params![now, trade_id],
        )?;
        fetch_trade(&conn, trade_id)
    }

    // ------------------------------------------------------------------
    // Stats and settings
    // ------------------------------------------------------------------

    pub fn stats(&self) -> LedgerResult<Stats> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT trade_level_streak, night_streak, policy_mode, total_trades,
                    total_wins, total_losses, last_strict_day_threshold,
                    last_strict_night_threshold, last_quantile_update_ts,
                    is_paused, day_only, night_only, updated_at
             FROM stats WHERE id = 1",
            [],
            stats_from_row,
        )
        .map_err(Into::into)
    }

    pub fn update_stats(&self, stats: &Stats, now: i64) -> LedgerResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        write_stats(&tx, stats, now)?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_paused(&self, paused: bool, now: i64) -> LedgerResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE stats SET is_paused = ?1, updated_at = ?2 WHERE id = 1",
            params![paused as i64, now],
        )?;
        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str, now: i64) -> LedgerResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                           updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn settings(&self) -> LedgerResult<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Qualities of settled, taken-and-filled trades in a time mode,
    /// newest first, bounded by `since_ts` and `max_samples`. Feeds the
    /// rolling-quantile threshold source.
    pub fn settled_qualities(
        &self,
        time_mode: TimeMode,
        since_ts: i64,
        max_samples: u32,
    ) -> LedgerResult<Vec<f64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.quality
             FROM trades t JOIN signals s ON s.id = t.signal_id
             WHERE t.status = 'SETTLED'
               AND t.time_mode = ?1
               AND t.decision IN ('OK', 'AUTO_OK')
               AND t.fill_status IN ('FILLED', 'PARTIAL')
               AND t.updated_at >= ?2
             ORDER BY t.updated_at DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![time_mode.as_str(), since_ts, max_samples], |row| {
                row.get::<_, f64>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ----------------------------------------------------------------------
// Row plumbing
// ----------------------------------------------------------------------

const TRADE_COLUMNS: &str = "id, window_id, signal_id, status, time_mode, policy_mode, decision, \
     cancel_reason, token_id, order_id, fill_status, fill_price, stake_amount, pnl, is_win, \
     trade_level_streak, night_streak, approval_emitted_at, created_at, updated_at";

fn read_signal_for_window(
    conn: &Connection,
    window_id: i64,
) -> LedgerResult<Option<SignalRecord>> {
    conn.query_row(
        "SELECT id, window_id, direction, signal_ts, confirm_ts, quality,
                quality_breakdown, anchor_bar_ts
         FROM signals WHERE window_id = ?1",
        [window_id],
        signal_from_row,
    )
    .optional()
    .map_err(Into::into)
}

fn fetch_trade(conn: &Connection, id: i64) -> LedgerResult<Trade> {
    conn.query_row(
        &format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?1"),
        [id],
        trade_from_row,
    )
    .optional()?
    .ok_or(LedgerError::TradeNotFound(id))
}

/// Re-read the status inside the transaction, consult the state
/// machine, and write the step. Illegal events roll back untouched.
fn apply_transition(
    tx: &Transaction<'_>,
    trade_id: i64,
    event: TradeEvent,
    now: i64,
) -> LedgerResult<Step> {
    let status_text: Option<String> = tx
        .query_row("SELECT status FROM trades WHERE id = ?1", [trade_id], |row| {
            row.get(0)
        })
        .optional()?;
    let status_text = status_text.ok_or(LedgerError::TradeNotFound(trade_id))?;
    let status = TradeStatus::from_str(&status_text)
        .map_err(|e| LedgerError::CorruptRow(e.to_string()))?;

    let step = transition(status, event)?;

    tx.execute(
        "UPDATE trades SET status = ?1, cancel_reason = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            step.next.as_str(),
            step.cancel_reason.map(|r| r.as_str()),
            now,
            trade_id,
        ],
    )?;
    debug!(trade_id, from = %status, event = %event, to = %step.next, "Transition applied");
    Ok(step)
}

fn write_stats(tx: &Transaction<'_>, stats: &Stats, now: i64) -> LedgerResult<()> {
    tx.execute(
        "UPDATE stats SET
            trade_level_streak = ?1, night_streak = ?2, policy_mode = ?3,
            total_trades = ?4, total_wins = ?5, total_losses = ?6,
            last_strict_day_threshold = ?7, last_strict_night_threshold = ?8,
            last_quantile_update_ts = ?9, is_paused = ?10, day_only = ?11,
            night_only = ?12, updated_at = ?13
         WHERE id = 1",
        params![
            stats.trade_level_streak,
            stats.night_streak,
            stats.policy_mode.as_str(),
            stats.total_trades,
            stats.total_wins,
            stats.total_losses,
            stats.last_strict_day_threshold,
            stats.last_strict_night_threshold,
            stats.last_quantile_update_ts,
            stats.is_paused as i64,
            stats.day_only as i64,
            stats.night_only as i64,
            now,
        ],
    )?;
    Ok(())
}

fn parse_decimal(value: Option<String>, field: &str) -> rusqlite::Result<Option<Decimal>> {
    match value {
        None => Ok(None),
        Some(text) => text.parse::<Decimal>().map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("{field}: {e}").into(),
            )
        }),
    }
}

fn parse_enum<T: FromStr>(text: String, field: &str) -> rusqlite::Result<T>
where
    T::Err: std::fmt::Display,
{
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("{field}: {e}").into(),
        )
    })
}

fn window_from_row(row: &Row<'_>) -> rusqlite::Result<MarketWindow> {
    let outcome: Option<String> = row.get(8)?;
    Ok(MarketWindow {
        id: row.get(0)?,
        asset: martin_core::Asset::new(row.get::<_, String>(1)?),
        slug: row.get(2)?,
        condition_id: row.get(3)?,
        up_token_id: row.get(4)?,
        down_token_id: row.get(5)?,
        start_ts: row.get(6)?,
        end_ts: row.get(7)?,
        outcome: outcome
            .map(|text| parse_enum::<Direction>(text, "outcome"))
            .transpose()?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let time_mode: Option<String> = row.get(4)?;
    let cancel_reason: Option<String> = row.get(7)?;
    let is_win: Option<i64> = row.get(14)?;
    Ok(Trade {
        id: row.get(0)?,
        window_id: row.get(1)?,
        signal_id: row.get(2)?,
        status: parse_enum(row.get::<_, String>(3)?, "status")?,
        time_mode: time_mode
            .map(|text| parse_enum::<TimeMode>(text, "time_mode"))
            .transpose()?,
        policy_mode: parse_enum::<PolicyMode>(row.get::<_, String>(5)?, "policy_mode")?,
        decision: parse_enum::<Decision>(row.get::<_, String>(6)?, "decision")?,
        cancel_reason: cancel_reason
            .map(|text| parse_enum::<CancelReason>(text, "cancel_reason"))
            .transpose()?,
        token_id: row.get(8)?,
        order_id: row.get(9)?,
        fill_status: parse_enum::<FillStatus>(row.get::<_, String>(10)?, "fill_status")?,
        fill_price: parse_decimal(row.get(11)?, "fill_price")?,
        stake_amount: parse_decimal(row.get(12)?, "stake_amount")?.unwrap_or(Decimal::ZERO),
        pnl: parse_decimal(row.get(13)?, "pnl")?,
        is_win: is_win.map(|v| v != 0),
        trade_level_streak_at_trade: row.get(15)?,
        night_streak_at_trade: row.get(16)?,
        approval_emitted_at: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<SignalRecord> {
    let breakdown_text: String = row.get(6)?;
    Ok(SignalRecord {
        id: row.get(0)?,
        window_id: row.get(1)?,
        direction: parse_enum::<Direction>(row.get::<_, String>(2)?, "direction")?,
        signal_ts: row.get(3)?,
        confirm_ts: row.get(4)?,
        quality: row.get(5)?,
        breakdown: serde_json::from_str(&breakdown_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("quality_breakdown: {e}").into(),
            )
        })?,
        anchor_bar_ts: row.get(7)?,
    })
}

fn cap_from_row(row: &Row<'_>) -> rusqlite::Result<CapCheck> {
    Ok(CapCheck {
        id: row.get(0)?,
        trade_id: row.get(1)?,
        token_id: row.get(2)?,
        confirm_ts: row.get(3)?,
        end_ts: row.get(4)?,
        status: parse_enum::<CapCheckStatus>(row.get::<_, String>(5)?, "status")?,
        consecutive_ticks: row.get(6)?,
        first_pass_ts: row.get(7)?,
        price_at_pass: parse_decimal(row.get(8)?, "price_at_pass")?,
    })
}

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<Stats> {
    Ok(Stats {
        trade_level_streak: row.get(0)?,
        night_streak: row.get(1)?,
        policy_mode: parse_enum::<PolicyMode>(row.get::<_, String>(2)?, "policy_mode")?,
        total_trades: row.get(3)?,
        total_wins: row.get(4)?,
        total_losses: row.get(5)?,
        last_strict_day_threshold: row.get(6)?,
        last_strict_night_threshold: row.get(7)?,
        last_quantile_update_ts: row.get(8)?,
        is_paused: row.get::<_, i64>(9)? != 0,
        day_only: row.get::<_, i64>(10)? != 0,
        night_only: row.get::<_, i64>(11)? != 0,
        updated_at: row.get(12)?,
    })
}
