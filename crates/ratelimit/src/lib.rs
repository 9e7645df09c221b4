//! Token-bucket rate limiting (C4): a shared-store trait with an in-process
//! fallback, generalized from a sliding-window client limiter into
//! continuous-refill token buckets addressed by connector/connection/org.

mod local_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connectorrt_core::RateLimitRules;
use tokio_util::sync::CancellationToken;

pub use local_store::LocalBucketStore;

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("shared bucket store unreachable: {0}")]
    StoreUnreachable(String),
    #[error("acquisition cancelled")]
    Cancelled,
}

/// Effective bucket parameters derived from `RateLimitRules` (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub rate_per_sec: f64,
    pub capacity: f64,
    pub ttl: Duration,
}

impl BucketConfig {
    pub fn from_rules(rules: &RateLimitRules) -> Self {
        let raw_rate = rules
            .requests_per_second
            .or_else(|| rules.requests_per_minute.map(|rpm| rpm / 60.0))
            .or_else(|| rules.requests_per_hour.map(|rph| rph / 3600.0))
            .or_else(|| rules.requests_per_day.map(|rpd| rpd / 86_400.0))
            .unwrap_or(1.0);
        let rate = raw_rate.clamp(0.1, 1000.0);
        let capacity = rules
            .burst
            .map(|b| b as f64)
            .unwrap_or_else(|| (3.0 * rate).ceil())
            .max(1.0);
        let ttl_secs = (2.0 * capacity / rate).max(60.0);
        Self {
            rate_per_sec: rate,
            capacity,
            ttl: Duration::from_secs_f64(ttl_secs),
        }
    }
}

/// Normalize a raw identifier to `[a-z0-9:_-]`, replacing anything else
/// with `-`, then build the `rate:{connector}:{connection}` bucket key.
pub fn bucket_key(connector: &str, connection: Option<&str>) -> String {
    fn normalize(raw: &str) -> String {
        raw.chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ':' | '_' | '-') {
                    c
                } else if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect()
    }
    let conn_part = connection.map(normalize).unwrap_or_else(|| "global".into());
    format!("rate:{}:{}", normalize(connector), conn_part)
}

/// Outcome of a single acquire attempt against a bucket.
#[derive(Debug, Clone, Copy)]
pub struct AcquireAttempt {
    pub allowed: bool,
    /// Milliseconds the caller should wait before retrying, when denied.
    pub retry_ms: u64,
}

/// Abstracts the bucket backing store so the runtime can run against an
/// in-process map in tests/single-node deployments, or (in multi-node
/// deployments) a networked store addressed by `rate_limiter.store_url`.
#[async_trait]
pub trait SharedBucketStore: Send + Sync {
    /// Attempt to take `tokens` from the bucket at `key`, refilling first.
    async fn acquire(
        &self,
        key: &str,
        tokens: f64,
        config: BucketConfig,
    ) -> Result<AcquireAttempt, RateLimitError>;

    /// Drain `wait_ms * rate` capacity-equivalent tokens from the bucket so
    /// subsequent acquires naturally stall (called by C5 on vendor 429/503).
    async fn schedule_penalty(
        &self,
        key: &str,
        wait_ms: u64,
        config: BucketConfig,
    ) -> Result<(), RateLimitError>;

    /// Cheap reachability probe used to decide shared-vs-local fallback.
    async fn health(&self) -> bool;
}

/// Reserved for future in-flight concurrency accounting; currently a no-op
/// on drop. Exists so callers keep the `acquire -> call -> release`
/// discipline even though release does nothing today.
pub struct ReleaseGuard {
    _private: (),
}

impl ReleaseGuard {
    fn new() -> Self {
        Self { _private: () }
    }

    /// Explicit release, equivalent to dropping the guard.
    pub fn release(self) {}
}

/// Result of a completed `acquire` call.
pub struct Acquisition {
    pub wait_ms: u64,
    pub attempts: u32,
    pub enforced: bool,
    pub guard: ReleaseGuard,
}

/// The token-bucket facade: runs against a shared store when reachable,
/// falls back to an in-process store on connection loss, and warns once
/// per process per outage.
pub struct RateLimiter {
    shared: Option<Arc<dyn SharedBucketStore>>,
    local: Arc<LocalBucketStore>,
    fallback_warned: std::sync::atomic::AtomicBool,
}

impl RateLimiter {
    pub fn new(shared: Option<Arc<dyn SharedBucketStore>>) -> Self {
        Self {
            shared,
            local: Arc::new(LocalBucketStore::new()),
            fallback_warned: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn local_only() -> Self {
        Self::new(None)
    }

    /// Acquire `tokens` (default 1) for `connector`/`connection`, sleeping
    /// and retrying until allowed or `cancel` fires.
    pub async fn acquire(
        &self,
        connector: &str,
        connection: Option<&str>,
        tokens: f64,
        rules: &RateLimitRules,
        cancel: &CancellationToken,
    ) -> Result<Acquisition, RateLimitError> {
        let key = bucket_key(connector, connection);
        let config = BucketConfig::from_rules(rules);

        let mut total_wait_ms: u64 = 0;
        let mut attempts: u32 = 0;
        let mut enforced = false;

        loop {
            attempts += 1;
            let attempt = self.acquire_once(&key, tokens, config).await?;

            if attempt.allowed {
                return Ok(Acquisition {
                    wait_ms: total_wait_ms,
                    attempts,
                    enforced,
                    guard: ReleaseGuard::new(),
                });
            }

            enforced = true;
            let sleep_ms = attempt.retry_ms.max(50);
            total_wait_ms += sleep_ms;

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {}
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            }
        }
    }

    async fn acquire_once(
        &self,
        key: &str,
        tokens: f64,
        config: BucketConfig,
    ) -> Result<AcquireAttempt, RateLimitError> {
        if let Some(shared) = &self.shared {
            match shared.acquire(key, tokens, config).await {
                Ok(attempt) => return Ok(attempt),
                Err(e) => {
                    if !self.fallback_warned.swap(true, std::sync::atomic::Ordering::Relaxed) {
                        tracing::warn!(error = %e, "shared bucket store unreachable, falling back to local");
                    }
                }
            }
        }
        self.local.acquire(key, tokens, config).await
    }

    pub async fn schedule_penalty(
        &self,
        connector: &str,
        connection: Option<&str>,
        wait_ms: u64,
        rules: &RateLimitRules,
    ) {
        let key = bucket_key(connector, connection);
        let config = BucketConfig::from_rules(rules);
        if let Some(shared) = &self.shared {
            if shared.schedule_penalty(&key, wait_ms, config).await.is_ok() {
                return;
            }
        }
        let _ = self.local.schedule_penalty(&key, wait_ms, config).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_key_normalizes_unsafe_characters() {
        assert_eq!(bucket_key("Slack App!", Some("conn 1")), "rate:slack-app-:conn-1");
    }

    #[test]
    fn bucket_key_defaults_connection_to_global() {
        assert_eq!(bucket_key("slack", None), "rate:slack:global");
    }

    #[test]
    fn bucket_config_clamps_rate_and_derives_capacity() {
        let rules = RateLimitRules {
            requests_per_second: Some(5000.0),
            ..Default::default()
        };
        let config = BucketConfig::from_rules(&rules);
        assert_eq!(config.rate_per_sec, 1000.0);
        assert_eq!(config.capacity, 3000.0);
    }

    #[test]
    fn bucket_config_converts_rpm_when_rps_absent() {
        let rules = RateLimitRules {
            requests_per_minute: Some(60.0),
            ..Default::default()
        };
        let config = BucketConfig::from_rules(&rules);
        assert_eq!(config.rate_per_sec, 1.0);
    }

    #[tokio::test]
    async fn acquire_succeeds_immediately_when_capacity_available() {
        let limiter = RateLimiter::local_only();
        let rules = RateLimitRules {
            requests_per_second: Some(10.0),
            burst: Some(10),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let result = limiter
            .acquire("slack", Some("conn-1"), 1.0, &rules, &cancel)
            .await
            .unwrap();
        assert!(!result.enforced);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn acquire_once_denies_when_bucket_is_drained() {
        let limiter = RateLimiter::local_only();
        let rules = RateLimitRules {
            requests_per_second: Some(1.0),
            burst: Some(1),
            ..Default::default()
        };
        let config = BucketConfig::from_rules(&rules);
        let key = bucket_key("slack", Some("conn-1"));

        let first = limiter.acquire_once(&key, 1.0, config).await.unwrap();
        assert!(first.allowed);

        let second = limiter.acquire_once(&key, 1.0, config).await.unwrap();
        assert!(!second.allowed);
        assert!(second.retry_ms > 0);
    }
}
