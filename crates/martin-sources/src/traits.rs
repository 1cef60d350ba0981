//! Collaborator interfaces.
//!
//! The orchestrator and workers depend only on these traits; the HTTP
//! adapters in this crate are one implementation, and tests substitute
//! scripted in-memory fakes.

use crate::error::SourceResult;
use async_trait::async_trait;
use martin_core::{Asset, Candle, CandleInterval, Direction, MarketWindow, PriceTick};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market catalog: yields currently-open hourly windows.
#[async_trait]
pub trait MarketCatalog: Send + Sync {
    /// List windows open at `now` for the given assets.
    async fn list_open_windows(
        &self,
        assets: &[Asset],
        now: i64,
    ) -> SourceResult<Vec<MarketWindow>>;
}

/// Candle source for TA snapshots.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch candles for `asset` over `[from, to]` at the given interval.
    async fn candles(
        &self,
        asset: &Asset,
        interval: CandleInterval,
        from: i64,
        to: i64,
    ) -> SourceResult<Vec<Candle>>;
}

/// A limit order submitted to the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrder {
    pub token_id: String,
    /// Limit price in [0, 1].
    pub price: Decimal,
    /// Stake size in quote currency.
    pub size: Decimal,
    /// Client-side order key for idempotent submission.
    pub client_id: String,
}

/// Venue-reported status of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub order_id: String,
    /// Venue status string: "live", "matched", "partially_matched",
    /// "rejected" or "cancelled".
    pub status: String,
    pub fill_price: Option<Decimal>,
}

/// Order book: tick history plus order placement and polling.
#[async_trait]
pub trait OrderBook: Send + Sync {
    /// Price observations for an outcome token over `[from, to]`,
    /// ordered by timestamp ascending.
    async fn price_ticks(&self, token_id: &str, from: i64, to: i64)
        -> SourceResult<Vec<PriceTick>>;

    /// Submit a single limit order; returns the venue order id.
    async fn place_limit(&self, order: &LimitOrder) -> SourceResult<String>;

    /// Poll the status of a previously-placed order.
    async fn order_status(&self, order_id: &str) -> SourceResult<OrderStatusReport>;
}

/// Settlement source: resolved outcome of a closed window.
#[async_trait]
pub trait SettlementSource: Send + Sync {
    /// The resolved outcome, or `None` while the window is unresolved.
    async fn resolved_outcome(&self, window: &MarketWindow) -> SourceResult<Option<Direction>>;
}
