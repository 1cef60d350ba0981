//! Per-asset TA context cache.
//!
//! Each asset maps to a single `Arc<TaContext>` that is swapped whole on
//! every successful refresh, so readers always observe a consistent
//! `(candles_1m, candles_5m, fetched_at)` triple and an in-flight
//! refresh can never expose a torn view.

use dashmap::DashMap;
use martin_core::{Asset, Candle};
use std::sync::Arc;

/// One immutable snapshot of an asset's TA inputs.
#[derive(Debug, Clone)]
pub struct TaContext {
    pub candles_1m: Vec<Candle>,
    pub candles_5m: Vec<Candle>,
    /// When this snapshot was fetched (Unix seconds, UTC).
    pub fetched_at: i64,
}

impl TaContext {
    /// Snapshot age in seconds at `now`.
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.fetched_at
    }

    /// Whether the snapshot is fresh enough to feed the TA oracle.
    pub fn is_fresh(&self, now: i64, max_age_secs: i64) -> bool {
        self.age_secs(now) <= max_age_secs
    }
}

/// Read-heavy cache of TA contexts, one per asset.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    contexts: DashMap<Asset, Arc<TaContext>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    /// Current snapshot for `asset`, if any fetch has succeeded yet.
    pub fn get(&self, asset: &Asset) -> Option<Arc<TaContext>> {
        self.contexts.get(asset).map(|entry| entry.value().clone())
    }

    /// Replace the snapshot for `asset`.
    ///
    /// A failed refresh never calls this, so the previous snapshot is
    /// retained until a new successful fetch.
    pub fn store(&self, asset: Asset, context: TaContext) {
        self.contexts.insert(asset, Arc::new(context));
    }

    /// Fetch timestamp per asset, for staleness reporting.
    pub fn freshness(&self) -> Vec<(Asset, i64)> {
        self.contexts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().fetched_at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
