//! Cancellable background sweeps: hourly cache expiry and daily 90-day
//! usage-record retention.
//!
//! Grounded on the lineage's `tokio::spawn` + `tokio::time::interval`
//! background-loop convention, raced against a `CancellationToken` so a
//! shutdown signal stops the loop between ticks rather than mid-sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::ledger::BudgetLedger;

const RETENTION_DAYS: i64 = 90;

pub fn spawn_cache_sweep(cache: Arc<ResponseCache>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.sweep_expired(Utc::now());
                    if removed > 0 {
                        tracing::info!(removed, "expired cache entries swept");
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("cache sweep task shutting down");
                    return;
                }
            }
        }
    })
}

pub fn spawn_retention_sweep(ledger: Arc<BudgetLedger>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(86_400));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);
                    let removed = ledger.prune_before(cutoff);
                    if removed > 0 {
                        tracing::info!(removed, "usage records past retention window pruned");
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("retention sweep task shutting down");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectorrt_config::{BudgetsConfig, CacheConfig};

    #[tokio::test(start_paused = true)]
    async fn cache_sweep_stops_on_cancel() {
        let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
        let cancel = CancellationToken::new();
        let handle = spawn_cache_sweep(cache, cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retention_sweep_stops_on_cancel() {
        let ledger = Arc::new(BudgetLedger::new(BudgetsConfig::default()));
        let cancel = CancellationToken::new();
        let handle = spawn_retention_sweep(ledger, cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
