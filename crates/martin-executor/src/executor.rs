//! Executor trait plus paper and live implementations.
//!
//! `place` is idempotent per trade id: placing twice for the same trade
//! returns the first result instead of double-submitting. The live
//! implementation also keys the venue order by a client id derived from
//! the trade id, so a crash between placement and the ledger write
//! cannot duplicate an order.

use crate::error::{ExecutorError, ExecutorResult};
use async_trait::async_trait;
use dashmap::DashMap;
use martin_core::FillStatus;
use martin_sources::{LimitOrder, OrderBook, SourceError};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of placing (or re-polling) an order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: String,
    pub token_id: String,
    pub fill_status: FillStatus,
    pub fill_price: Option<Decimal>,
}

/// Order placement request, one per trade.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub trade_id: i64,
    pub token_id: String,
    /// Limit price (the entry cap).
    pub limit_price: Decimal,
    /// Flat stake in quote currency.
    pub stake: Decimal,
}

/// Order executor. Paper and live implementations share this surface.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Place the trade's order, or return the already-recorded result
    /// if this trade has placed before.
    async fn place(&self, request: &PlacementRequest) -> ExecutorResult<PlacedOrder>;

    /// Poll the current fill state of a previously-placed order.
    async fn poll(&self, trade_id: i64, order_id: &str) -> ExecutorResult<PlacedOrder>;
}

// ----------------------------------------------------------------------
// Paper
// ----------------------------------------------------------------------

/// Paper executor: synthesizes instantly-filled orders, no network I/O.
pub struct PaperExecutor {
    /// Simulated fill price (normally the entry cap).
    fill_price: Decimal,
    placed: DashMap<i64, PlacedOrder>,
}

impl PaperExecutor {
    pub fn new(fill_price: Decimal) -> Self {
        Self {
            fill_price,
            placed: DashMap::new(),
        }
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    async fn place(&self, request: &PlacementRequest) -> ExecutorResult<PlacedOrder> {
        if let Some(existing) = self.placed.get(&request.trade_id) {
            return Ok(existing.clone());
        }
        let order = PlacedOrder {
            order_id: format!("paper-{}", request.trade_id),
            token_id: request.token_id.clone(),
            fill_status: FillStatus::Filled,
            fill_price: Some(self.fill_price),
        };
        self.placed.insert(request.trade_id, order.clone());
        info!(
            trade_id = request.trade_id,
            order_id = %order.order_id,
            fill_price = %self.fill_price,
            "Paper order filled"
        );
        Ok(order)
    }

    async fn poll(&self, trade_id: i64, order_id: &str) -> ExecutorResult<PlacedOrder> {
        self.placed
            .get(&trade_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ExecutorError::InvalidOrder(format!("unknown paper order {order_id}")))
    }
}

// ----------------------------------------------------------------------
// Live
// ----------------------------------------------------------------------

/// Live executor configuration.
#[derive(Debug, Clone)]
pub struct LiveExecutorConfig {
    /// Interval between status polls after placement.
    pub poll_interval: Duration,
    /// Total time to wait for a fill before reporting the pending state.
    pub poll_timeout: Duration,
}

impl Default for LiveExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(30),
        }
    }
}

/// Live executor: submits one signed limit order per trade and polls
/// its status with a bounded timeout.
pub struct LiveExecutor {
    book: Arc<dyn OrderBook>,
    config: LiveExecutorConfig,
    placed: DashMap<i64, PlacedOrder>,
}

impl LiveExecutor {
    pub fn new(book: Arc<dyn OrderBook>, config: LiveExecutorConfig) -> Self {
        Self {
            book,
            config,
            placed: DashMap::new(),
        }
    }

    fn map_status(status: &str, fill_price: Option<Decimal>) -> (FillStatus, Option<Decimal>) {
        match status {
            "matched" => (FillStatus::Filled, fill_price),
            "partially_matched" => (FillStatus::Partial, fill_price),
            "rejected" => (FillStatus::Rejected, None),
            "cancelled" => (FillStatus::Cancelled, None),
            _ => (FillStatus::Pending, None),
        }
    }
}

#[async_trait]
impl Executor for LiveExecutor {
    async fn place(&self, request: &PlacementRequest) -> ExecutorResult<PlacedOrder> {
        if let Some(existing) = self.placed.get(&request.trade_id) {
            return Ok(existing.clone());
        }
        if request.stake <= Decimal::ZERO {
            return Err(ExecutorError::InvalidOrder(format!(
                "non-positive stake {}",
                request.stake
            )));
        }

        let order = LimitOrder {
            token_id: request.token_id.clone(),
            price: request.limit_price,
            size: request.stake,
            client_id: format!("martin-{}", request.trade_id),
        };
        let order_id = match self.book.place_limit(&order).await {
            Ok(id) => id,
            Err(SourceError::OrderRejected(reason)) => {
                warn!(trade_id = request.trade_id, reason = %reason, "Order rejected at placement");
                return Err(ExecutorError::Rejected(reason));
            }
            Err(e) => return Err(e.into()),
        };

        // Poll until matched/rejected or the timeout elapses; the trade
        // stays in ORDER_PLACED and later cycles keep polling.
        let deadline = tokio::time::Instant::now() + self.config.poll_timeout;
        let mut placed = PlacedOrder {
            order_id: order_id.clone(),
            token_id: request.token_id.clone(),
            fill_status: FillStatus::Pending,
            fill_price: None,
        };
        loop {
            let report = self.book.order_status(&order_id).await?;
            let (fill_status, fill_price) = Self::map_status(&report.status, report.fill_price);
            placed.fill_status = fill_status;
            placed.fill_price = fill_price;
            if fill_status != FillStatus::Pending || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!(
            trade_id = request.trade_id,
            order_id = %placed.order_id,
            fill_status = placed.fill_status.as_str(),
            "Live order placed"
        );
        self.placed.insert(request.trade_id, placed.clone());
        Ok(placed)
    }

    async fn poll(&self, trade_id: i64, order_id: &str) -> ExecutorResult<PlacedOrder> {
        let report = self.book.order_status(order_id).await?;
        let (fill_status, fill_price) = Self::map_status(&report.status, report.fill_price);
        let token_id = self
            .placed
            .get(&trade_id)
            .map(|entry| entry.token_id.clone())
            .unwrap_or_default();
        let placed = PlacedOrder {
            order_id: order_id.to_string(),
            token_id,
            fill_status,
            fill_price,
        };
        self.placed.insert(trade_id, placed.clone());
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use martin_core::PriceTick;
    use martin_sources::{OrderStatusReport, SourceResult};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request(trade_id: i64) -> PlacementRequest {
        PlacementRequest {
            trade_id,
            token_id: "tok-up".to_string(),
            limit_price: dec!(0.55),
            stake: dec!(10),
        }
    }

    #[tokio::test]
    async fn test_paper_fills_at_configured_price() {
        let executor = PaperExecutor::new(dec!(0.55));
        let order = executor.place(&request(7)).await.unwrap();
        assert_eq!(order.order_id, "paper-7");
        assert_eq!(order.fill_status, FillStatus::Filled);
        assert_eq!(order.fill_price, Some(dec!(0.55)));
    }

    #[tokio::test]
    async fn test_paper_place_idempotent() {
        let executor = PaperExecutor::new(dec!(0.55));
        let first = executor.place(&request(7)).await.unwrap();
        let second = executor.place(&request(7)).await.unwrap();
        assert_eq!(first, second);

        let polled = executor.poll(7, &first.order_id).await.unwrap();
        assert_eq!(polled, first);
    }

    /// Book fake that reports "live" for a few polls, then "matched".
    struct SlowMatchBook {
        polls_until_match: u32,
        polls: AtomicU32,
        placements: AtomicU32,
    }

    #[async_trait]
    impl OrderBook for SlowMatchBook {
        async fn price_ticks(
            &self,
            _token_id: &str,
            _from: i64,
            _to: i64,
        ) -> SourceResult<Vec<PriceTick>> {
            Ok(Vec::new())
        }

        async fn place_limit(&self, order: &LimitOrder) -> SourceResult<String> {
            self.placements.fetch_add(1, Ordering::SeqCst);
            Ok(format!("live-{}", order.client_id))
        }

        async fn order_status(&self, order_id: &str) -> SourceResult<OrderStatusReport> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n + 1 >= self.polls_until_match {
                Ok(OrderStatusReport {
                    order_id: order_id.to_string(),
                    status: "matched".to_string(),
                    fill_price: Some(dec!(0.54)),
                })
            } else {
                Ok(OrderStatusReport {
                    order_id: order_id.to_string(),
                    status: "live".to_string(),
                    fill_price: None,
                })
            }
        }
    }

    #[tokio::test]
    async fn test_live_polls_to_fill() {
        let book = Arc::new(SlowMatchBook {
            polls_until_match: 3,
            polls: AtomicU32::new(0),
            placements: AtomicU32::new(0),
        });
        let executor = LiveExecutor::new(
            book.clone(),
            LiveExecutorConfig {
                poll_interval: Duration::from_millis(1),
                poll_timeout: Duration::from_secs(5),
            },
        );

        let order = executor.place(&request(9)).await.unwrap();
        assert_eq!(order.order_id, "live-martin-9");
        assert_eq!(order.fill_status, FillStatus::Filled);
        assert_eq!(order.fill_price, Some(dec!(0.54)));

        // Second place call re-uses the recorded result.
        executor.place(&request(9)).await.unwrap();
        assert_eq!(book.placements.load(Ordering::SeqCst), 1);
    }

    /// Book fake that rejects every placement.
    struct RejectingBook;

    #[async_trait]
    impl OrderBook for RejectingBook {
        async fn price_ticks(
            &self,
            _token_id: &str,
            _from: i64,
            _to: i64,
        ) -> SourceResult<Vec<PriceTick>> {
            Ok(Vec::new())
        }

        async fn place_limit(&self, _order: &LimitOrder) -> SourceResult<String> {
            Err(SourceError::OrderRejected("insufficient balance".to_string()))
        }

        async fn order_status(&self, _order_id: &str) -> SourceResult<OrderStatusReport> {
            unreachable!("rejected orders are never polled")
        }
    }

    #[tokio::test]
    async fn test_live_rejection_surfaces() {
        let executor = LiveExecutor::new(Arc::new(RejectingBook), LiveExecutorConfig::default());
        let err = executor.place(&request(11)).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_live_zero_stake_refused() {
        let executor = LiveExecutor::new(Arc::new(RejectingBook), LiveExecutorConfig::default());
        let mut req = request(12);
        req.stake = dec!(0);
        let err = executor.place(&req).await.unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidOrder(_)));
    }
}
