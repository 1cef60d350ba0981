//! Per-trade advisory locks.
//!
//! Cycle processing and user-decision handling both take the trade's
//! lock before evaluating it, so two transitions can never land on the
//! same trade concurrently.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of advisory locks keyed by trade id.
#[derive(Debug, Default)]
pub struct TradeLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl TradeLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for a trade, creating it on first use.
    pub async fn acquire(&self, trade_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(trade_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for a terminal trade.
    pub fn release(&self, trade_id: i64) {
        self.locks.remove(&trade_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_trade_serializes() {
        let locks = Arc::new(TradeLocks::new());
        let concurrent = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let concurrent = concurrent.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(7).await;
                let inside = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(inside, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_trades_do_not_block() {
        let locks = TradeLocks::new();
        let _a = locks.acquire(1).await;
        // A second trade's lock is immediately available.
        let acquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_release_drops_entry() {
        let locks = TradeLocks::new();
        drop(locks.acquire(1).await);
        assert_eq!(locks.len(), 1);
        locks.release(1);
        assert!(locks.is_empty());
    }
}
