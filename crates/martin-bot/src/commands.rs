//! Operational commands over the ledger.
//!
//! `pause`, `resume` and `set` write the stats/settings tables and take
//! effect at the running bot's next cycle; `status` and `report` read
//! and print.

use crate::error::AppResult;
use martin_ledger::Ledger;
use rust_decimal::Decimal;

pub fn pause(ledger: &Ledger, now: i64) -> AppResult<()> {
    ledger.set_paused(true, now)?;
    println!("paused");
    Ok(())
}

pub fn resume(ledger: &Ledger, now: i64) -> AppResult<()> {
    ledger.set_paused(false, now)?;
    println!("resumed");
    Ok(())
}

pub fn set(ledger: &Ledger, key: &str, value: &str, now: i64) -> AppResult<()> {
    ledger.set_setting(key, value, now)?;
    println!("{key} = {value}");
    Ok(())
}

pub fn status(ledger: &Ledger) -> AppResult<()> {
    let stats = ledger.stats()?;
    println!(
        "mode={} paused={} streak={} night_streak={} trades={} ({}W/{}L)",
        stats.policy_mode.as_str(),
        stats.is_paused,
        stats.trade_level_streak,
        stats.night_streak,
        stats.total_trades,
        stats.total_wins,
        stats.total_losses,
    );

    let live = ledger.live_trades()?;
    if live.is_empty() {
        println!("no live trades");
    }
    for trade in live {
        let window = ledger.get_window(trade.window_id)?;
        println!(
            "  #{} {} {} decision={} fill={}",
            trade.id,
            window.slug,
            trade.status,
            trade.decision.as_str(),
            trade.fill_status.as_str(),
        );
    }
    Ok(())
}

pub fn report(ledger: &Ledger, limit: u32) -> AppResult<()> {
    let closed = ledger.recent_closed_trades(limit)?;
    let mut pnl_total = Decimal::ZERO;
    for trade in &closed {
        let window = ledger.get_window(trade.window_id)?;
        let outcome = match trade.is_win {
            Some(true) => "WIN",
            Some(false) => "LOSS",
            None => trade
                .cancel_reason
                .map(|r| r.as_str())
                .unwrap_or(trade.status.as_str()),
        };
        let pnl = trade.pnl.unwrap_or(Decimal::ZERO);
        pnl_total += pnl;
        println!(
            "  #{} {} {} {} pnl={}",
            trade.id, window.slug, trade.status, outcome, pnl
        );
    }
    println!("total pnl over last {}: {}", closed.len(), pnl_total);
    Ok(())
}
