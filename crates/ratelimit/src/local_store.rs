//! In-process bucket store: mirrors the shared-store math so a single-node
//! deployment (or a shared-store outage) degrades gracefully.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use connectorrt_core::TokenBucket;

use crate::{AcquireAttempt, BucketConfig, RateLimitError};

/// Above this many distinct keys, a sweep drops buckets untouched past
/// their TTL — mirrors the lineage's size-triggered cleanup of its
/// per-client timestamp map.
const SWEEP_THRESHOLD: usize = 10_000;

pub struct LocalBucketStore {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl Default for LocalBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBucketStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(
        &self,
        key: &str,
        tokens: f64,
        config: BucketConfig,
    ) -> Result<AcquireAttempt, RateLimitError> {
        let now = Utc::now();
        let mut guard = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        if guard.len() > SWEEP_THRESHOLD {
            sweep(&mut guard, now);
        }

        let bucket = guard
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(key, config.capacity, config.rate_per_sec));
        bucket.capacity = config.capacity;
        bucket.rate_per_sec = config.rate_per_sec;

        if bucket.try_take(tokens, now) {
            Ok(AcquireAttempt {
                allowed: true,
                retry_ms: 0,
            })
        } else {
            Ok(AcquireAttempt {
                allowed: false,
                retry_ms: bucket.wait_ms_for(tokens),
            })
        }
    }

    pub async fn schedule_penalty(
        &self,
        key: &str,
        wait_ms: u64,
        config: BucketConfig,
    ) -> Result<(), RateLimitError> {
        let now = Utc::now();
        let mut guard = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = guard
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(key, config.capacity, config.rate_per_sec));
        bucket.refill(now);
        let penalty = wait_ms as f64 / 1000.0 * bucket.rate_per_sec;
        bucket.tokens = (bucket.tokens - penalty).max(0.0);
        Ok(())
    }

    pub async fn health(&self) -> bool {
        true
    }
}

fn sweep(buckets: &mut HashMap<String, TokenBucket>, now: chrono::DateTime<Utc>) {
    buckets.retain(|_, bucket| {
        let idle = (now - bucket.last_refill).num_seconds().max(0) as f64;
        idle < (2.0 * bucket.capacity / bucket.rate_per_sec.max(0.1)).max(60.0)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_decrements_and_denies_past_capacity() {
        let store = LocalBucketStore::new();
        let config = BucketConfig {
            rate_per_sec: 1.0,
            capacity: 2.0,
            ttl: std::time::Duration::from_secs(60),
        };

        let first = store.acquire("k", 1.0, config).await.unwrap();
        assert!(first.allowed);
        let second = store.acquire("k", 1.0, config).await.unwrap();
        assert!(second.allowed);
        let third = store.acquire("k", 1.0, config).await.unwrap();
        assert!(!third.allowed);
    }

    #[tokio::test]
    async fn schedule_penalty_drains_tokens() {
        let store = LocalBucketStore::new();
        let config = BucketConfig {
            rate_per_sec: 1.0,
            capacity: 5.0,
            ttl: std::time::Duration::from_secs(60),
        };
        store.acquire("k", 1.0, config).await.unwrap();
        store.schedule_penalty("k", 4000, config).await.unwrap();

        let attempt = store.acquire("k", 1.0, config).await.unwrap();
        assert!(!attempt.allowed);
    }
}
