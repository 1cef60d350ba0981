//! Outbound data-source interfaces and HTTP adapters.
//!
//! The rest of the system depends on the traits in `traits`; the HTTP
//! clients here are the production implementations. All transient
//! failures are retried with bounded exponential backoff inside the
//! adapter, so callers only ever see a final verdict.

pub mod book;
pub mod candles;
pub mod catalog;
pub mod error;
pub mod retry;
pub mod traits;

pub use book::{HttpOrderBook, NoopSigner, RequestSigner};
pub use candles::HttpCandleSource;
pub use catalog::HttpMarketCatalog;
pub use error::{SourceError, SourceResult};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use traits::{
    CandleSource, LimitOrder, MarketCatalog, OrderBook, OrderStatusReport, SettlementSource,
};
