//! Settlement resolution.
//!
//! Binary markets pay 1.0 per winning share. A stake `s` filled at
//! price `p` buys `s / p` shares, so a win pays out `s / p` and the
//! pnl is `s / p - s`; a loss forfeits the stake.

use crate::error::{ExecutorError, ExecutorResult};
use martin_core::Direction;
use rust_decimal::Decimal;

/// Outcome of settling one filled trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub is_win: bool,
    pub pnl: Decimal,
}

/// Resolve a filled trade against the window outcome.
pub fn settle(
    direction: Direction,
    outcome: Direction,
    stake: Decimal,
    fill_price: Decimal,
) -> ExecutorResult<Settlement> {
    if fill_price <= Decimal::ZERO || fill_price > Decimal::ONE {
        return Err(ExecutorError::InvalidOrder(format!(
            "fill price {fill_price} outside (0, 1]"
        )));
    }
    if stake < Decimal::ZERO {
        return Err(ExecutorError::InvalidOrder(format!("negative stake {stake}")));
    }

    let is_win = direction == outcome;
    let pnl = if is_win {
        stake / fill_price - stake
    } else {
        -stake
    };
    Ok(Settlement { is_win, pnl })
}
