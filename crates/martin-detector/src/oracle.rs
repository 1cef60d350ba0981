//! The TA oracle capability.
//!
//! The orchestrator treats the oracle as a black box: it may only
//! compare the returned `quality` against the acceptance threshold and
//! must never inspect or modify the breakdown. Implementations are
//! pure: equivalent inputs return equivalent outputs.

use martin_core::{MarketWindow, TaSignal};
use martin_feed::TaContext;

/// Pure function from candle snapshots to an optional signal.
pub trait TaOracle: Send + Sync {
    /// Evaluate the window at `now` against the asset's TA context.
    ///
    /// Returns `None` when no qualifying setup is present. When a
    /// signal is returned, `signal_ts` lies in `[window.start_ts, now]`.
    fn evaluate(&self, window: &MarketWindow, now: i64, ctx: &TaContext) -> Option<TaSignal>;
}
