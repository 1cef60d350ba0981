//! Schema and idempotent migrations.
//!
//! Every migration is `CREATE ... IF NOT EXISTS`-safe and recorded in
//! the `migrations` table, so re-running the full list on an existing
//! database is a no-op. Decimal columns are stored as TEXT: replaying
//! the event log must reproduce the ledger bit-for-bit, which REAL
//! columns would break.

use crate::error::LedgerResult;
use rusqlite::Connection;
use tracing::info;

/// Connection pragmas applied at open.
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
"#;

/// Ordered migrations. The index + 1 is the migration id.
const MIGRATIONS: &[&str] = &[
    // 1: base tables
    r#"
CREATE TABLE IF NOT EXISTS market_windows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    condition_id TEXT NOT NULL,
    up_token_id TEXT NOT NULL,
    down_token_id TEXT NOT NULL,
    start_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL,
    outcome TEXT,
    created_at INTEGER NOT NULL,
    CHECK (end_ts > start_ts)
);

CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    window_id INTEGER NOT NULL UNIQUE REFERENCES market_windows(id),
    direction TEXT NOT NULL,
    signal_ts INTEGER NOT NULL,
    confirm_ts INTEGER NOT NULL,
    quality REAL NOT NULL,
    quality_breakdown TEXT NOT NULL,
    anchor_bar_ts INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    window_id INTEGER NOT NULL REFERENCES market_windows(id),
    signal_id INTEGER REFERENCES signals(id),
    status TEXT NOT NULL,
    time_mode TEXT,
    policy_mode TEXT NOT NULL DEFAULT 'BASE',
    decision TEXT NOT NULL DEFAULT 'PENDING',
    cancel_reason TEXT,
    token_id TEXT,
    order_id TEXT,
    fill_status TEXT NOT NULL DEFAULT 'PENDING',
    fill_price TEXT,
    stake_amount TEXT NOT NULL DEFAULT '0',
    pnl TEXT,
    is_win INTEGER,
    trade_level_streak INTEGER NOT NULL DEFAULT 0,
    night_streak INTEGER NOT NULL DEFAULT 0,
    approval_emitted_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_trades_one_live_per_window
    ON trades(window_id)
    WHERE status NOT IN ('SETTLED', 'CANCELLED', 'ERROR');

CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status);

CREATE TABLE IF NOT EXISTS cap_checks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_id INTEGER NOT NULL UNIQUE REFERENCES trades(id),
    token_id TEXT NOT NULL,
    confirm_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    consecutive_ticks INTEGER NOT NULL DEFAULT 0,
    first_pass_ts INTEGER,
    price_at_pass TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    trade_level_streak INTEGER NOT NULL DEFAULT 0,
    night_streak INTEGER NOT NULL DEFAULT 0,
    policy_mode TEXT NOT NULL DEFAULT 'BASE',
    total_trades INTEGER NOT NULL DEFAULT 0,
    total_wins INTEGER NOT NULL DEFAULT 0,
    total_losses INTEGER NOT NULL DEFAULT 0,
    last_strict_day_threshold REAL,
    last_strict_night_threshold REAL,
    last_quantile_update_ts INTEGER,
    is_paused INTEGER NOT NULL DEFAULT 0,
    day_only INTEGER NOT NULL DEFAULT 0,
    night_only INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT 0,
    CHECK (total_trades = total_wins + total_losses)
);

INSERT OR IGNORE INTO stats (id, updated_at) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#,
];

/// Apply pragmas and all pending migrations.
pub fn migrate(conn: &Connection) -> LedgerResult<()> {
    conn.execute_batch(PRAGMAS)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;

    let mut applied = 0u32;
    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let id = (idx + 1) as i64;
        let exists: bool = conn
            .prepare("SELECT 1 FROM migrations WHERE id = ?1")?
            .exists([id])?;
        if exists {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO migrations (id, applied_at) VALUES (?1, ?2)",
            rusqlite::params![id, chrono::Utc::now().timestamp()],
        )?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, total = MIGRATIONS.len(), "Ledger migrations applied");
    }
    Ok(())
}
