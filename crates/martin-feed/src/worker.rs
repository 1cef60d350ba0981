//! Snapshot worker loop.
//!
//! Refreshes the TA context of every configured asset on a fixed
//! period, independently of market-window discovery. One asset's fetch
//! failure never blocks another; the failed asset keeps serving its
//! previous snapshot until the next successful refresh.

use crate::cache::{SnapshotCache, TaContext};
use crate::error::{FeedError, FeedResult};
use martin_core::{Asset, CandleInterval};
use martin_sources::CandleSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot worker configuration.
#[derive(Debug, Clone)]
pub struct SnapshotWorkerConfig {
    pub assets: Vec<Asset>,
    /// Refresh period in seconds.
    pub snapshot_secs: u64,
    /// How much candle history to keep warm, in seconds.
    pub warmup_secs: i64,
}

/// Periodic snapshot worker.
pub struct SnapshotWorker {
    config: SnapshotWorkerConfig,
    candles: Arc<dyn CandleSource>,
    cache: Arc<SnapshotCache>,
}

impl SnapshotWorker {
    pub fn new(
        config: SnapshotWorkerConfig,
        candles: Arc<dyn CandleSource>,
        cache: Arc<SnapshotCache>,
    ) -> Self {
        Self {
            config,
            candles,
            cache,
        }
    }

    /// Refresh a single asset's snapshot at `now`.
    pub async fn refresh_asset(&self, asset: &Asset, now: i64) -> FeedResult<()> {
        let from = now - self.config.warmup_secs;

        let candles_1m = self
            .candles
            .candles(asset, CandleInterval::OneMinute, from, now)
            .await
            .map_err(|source| FeedError::Fetch {
                asset: asset.to_string(),
                source,
            })?;
        let candles_5m = self
            .candles
            .candles(asset, CandleInterval::FiveMinutes, from, now)
            .await
            .map_err(|source| FeedError::Fetch {
                asset: asset.to_string(),
                source,
            })?;

        debug!(
            asset = %asset,
            candles_1m = candles_1m.len(),
            candles_5m = candles_5m.len(),
            "Snapshot refreshed"
        );

        self.cache.store(
            asset.clone(),
            TaContext {
                candles_1m,
                candles_5m,
                fetched_at: now,
            },
        );
        Ok(())
    }

    /// Refresh all configured assets once. Failures are logged per
    /// asset and do not abort the sweep.
    pub async fn refresh_all(&self, now: i64) {
        for asset in &self.config.assets {
            if let Err(e) = self.refresh_asset(asset, now).await {
                warn!(asset = %asset, error = %e, "Snapshot refresh failed, keeping previous");
            }
        }
    }

    /// Run the worker until `shutdown` is cancelled.
    ///
    /// An overrunning refresh delays the next tick instead of letting
    /// ticks pile up.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.snapshot_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            assets = ?self.config.assets.iter().map(Asset::as_str).collect::<Vec<_>>(),
            period_secs = self.config.snapshot_secs,
            "Snapshot worker started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = chrono::Utc::now().timestamp();
                    self.refresh_all(now).await;
                }
                _ = shutdown.cancelled() => {
                    info!("Snapshot worker stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use martin_core::Candle;
    use martin_sources::{SourceError, SourceResult};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Candle source that fails for one asset and succeeds for the rest.
    struct FlakySource {
        failing_asset: Asset,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CandleSource for FlakySource {
        async fn candles(
            &self,
            asset: &Asset,
            _interval: CandleInterval,
            from: i64,
            _to: i64,
        ) -> SourceResult<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *asset == self.failing_asset {
                return Err(SourceError::HttpClient("connection reset".to_string()));
            }
            Ok(vec![Candle {
                ts: from,
                open: dec!(0.5),
                high: dec!(0.6),
                low: dec!(0.4),
                close: dec!(0.55),
                volume: dec!(1),
            }])
        }
    }

    fn worker(cache: Arc<SnapshotCache>, source: Arc<FlakySource>) -> SnapshotWorker {
        SnapshotWorker::new(
            SnapshotWorkerConfig {
                assets: vec![Asset::from("BTC"), Asset::from("ETH")],
                snapshot_secs: 30,
                warmup_secs: 3600,
            },
            source,
            cache,
        )
    }

    #[tokio::test]
    async fn test_one_asset_failure_does_not_block_others() {
        let cache = Arc::new(SnapshotCache::new());
        let source = Arc::new(FlakySource {
            failing_asset: Asset::from("BTC"),
            calls: AtomicU32::new(0),
        });
        worker(cache.clone(), source).refresh_all(1_000_000).await;

        assert!(cache.get(&Asset::from("BTC")).is_none());
        let eth = cache.get(&Asset::from("ETH")).unwrap();
        assert_eq!(eth.fetched_at, 1_000_000);
        assert_eq!(eth.candles_1m.len(), 1);
        assert_eq!(eth.candles_5m.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let cache = Arc::new(SnapshotCache::new());

        // First sweep: ETH fails, BTC succeeds.
        let source = Arc::new(FlakySource {
            failing_asset: Asset::from("ETH"),
            calls: AtomicU32::new(0),
        });
        worker(cache.clone(), source).refresh_all(1_000_000).await;
        assert_eq!(cache.get(&Asset::from("BTC")).unwrap().fetched_at, 1_000_000);

        // Second sweep: BTC fails; its earlier snapshot must survive.
        let source = Arc::new(FlakySource {
            failing_asset: Asset::from("BTC"),
            calls: AtomicU32::new(0),
        });
        worker(cache.clone(), source).refresh_all(1_000_030).await;

        assert_eq!(cache.get(&Asset::from("BTC")).unwrap().fetched_at, 1_000_000);
        assert_eq!(cache.get(&Asset::from("ETH")).unwrap().fetched_at, 1_000_030);
    }
}
