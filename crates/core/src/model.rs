//! Runtime state records: rate-limit buckets, LLM usage/cache entries, and
//! the audit trail shape written by C11.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single token bucket keyed by connector/connection/operation.
///
/// `last_refill` uses wall-clock time rather than `Instant` so a bucket can
/// be serialized to a shared store and rehydrated on another node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucket {
    pub key: String,
    pub tokens: f64,
    pub capacity: f64,
    pub rate_per_sec: f64,
    pub last_refill: DateTime<Utc>,
}

impl TokenBucket {
    pub fn new(key: impl Into<String>, capacity: f64, rate_per_sec: f64) -> Self {
        Self {
            key: key.into(),
            tokens: capacity,
            capacity,
            rate_per_sec,
            last_refill: Utc::now(),
        }
    }

    /// Refill tokens for elapsed wall-clock time, capped at capacity.
    pub fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        if elapsed <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Try to take `cost` tokens; returns true and deducts on success.
    pub fn try_take(&mut self, cost: f64, now: DateTime<Utc>) -> bool {
        self.refill(now);
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Milliseconds until `cost` tokens will be available, assuming no other
    /// consumer drains the bucket in the meantime.
    pub fn wait_ms_for(&self, cost: f64) -> u64 {
        if self.tokens >= cost || self.rate_per_sec <= 0.0 {
            return 0;
        }
        let deficit = cost - self.tokens;
        ((deficit / self.rate_per_sec) * 1000.0).ceil().max(0.0) as u64
    }
}

/// One billed LLM call, the unit C10's budget ledger accumulates over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub ts: DateTime<Utc>,
}

/// A cached LLM response, addressed by a content hash of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub provider: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub ts: DateTime<Utc>,
    pub ttl_secs: u64,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.ts).num_seconds().max(0) as u64;
        age >= self.ttl_secs
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}

/// Which backoff loop produced a `BackoffEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    RateLimiter,
    HttpRetry,
    NetworkRetry,
}

/// One recorded wait, folded into an `AuditEntry`'s `meta.backoffs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffEvent {
    pub kind: BackoffKind,
    pub wait_ms: u64,
    pub attempt: u32,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limiter_attempts: Option<u32>,
}

/// Metadata folded into every audit entry beyond the bare pass/fail outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiter_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiter_wait_ms: Option<u64>,
    #[serde(default)]
    pub backoffs: Vec<BackoffEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One append-only line of the audit trail (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub request_id: String,
    pub connector_id: String,
    pub operation_id: String,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub meta: AuditMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn bucket_refills_proportionally_to_elapsed_time() {
        let mut bucket = TokenBucket::new("acme:slack:post_message", 10.0, 5.0);
        let now = bucket.last_refill;
        assert!(bucket.try_take(10.0, now));
        assert!(!bucket.try_take(1.0, now));

        let later = now + Duration::milliseconds(400);
        assert!(bucket.try_take(2.0, later));
    }

    #[test]
    fn wait_ms_for_is_zero_when_tokens_available() {
        let bucket = TokenBucket::new("acme:slack:post_message", 10.0, 5.0);
        assert_eq!(bucket.wait_ms_for(1.0), 0);
    }

    #[test]
    fn wait_ms_for_scales_with_deficit_and_rate() {
        let mut bucket = TokenBucket::new("acme:slack:post_message", 1.0, 2.0);
        let now = bucket.last_refill;
        assert!(bucket.try_take(1.0, now));
        let wait = bucket.wait_ms_for(1.0);
        assert_eq!(wait, 500);
    }

    #[test]
    fn cache_entry_expires_after_ttl() {
        let now = Utc::now();
        let entry = CacheEntry {
            key: "abc".into(),
            prompt: "hello".into(),
            response: "world".into(),
            model: "gpt".into(),
            provider: "openai".into(),
            tokens_used: 10,
            cost_usd: 0.001,
            ts: now - Duration::seconds(120),
            ttl_secs: 60,
            access_count: 0,
            last_accessed: now - Duration::seconds(120),
        };
        assert!(entry.is_expired(now));
    }
}
