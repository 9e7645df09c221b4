//! Retry decisions (C5) and HTTP-status classification (§4.9 step 8),
//! generalized from a provider-facing status-code classifier into a
//! connector-agnostic retry/terminal decision plus a human error code.

mod classify;

pub use classify::{classify_status, HttpErrorCode};

use rand::Rng;

/// A non-2xx outcome observed by the HTTP transport, fed to `decide`.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub attempt: u32,
    pub max_attempts: u32,
    pub status_code: Option<u16>,
    pub retry_after_ms: Option<u64>,
    /// Set when the attempt failed before a response was received
    /// (timeout, DNS, connection reset).
    pub network_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyScope {
    Connection,
}

/// The decision returned by C5 for one failed attempt.
#[derive(Debug, Clone)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub wait_ms: u64,
    pub reason: &'static str,
    pub penalty_ms: Option<u64>,
    pub penalty_scope: Option<PenaltyScope>,
}

const RETRYABLE_STATUSES: &[u16] = &[408, 425, 429, 500, 502, 503, 504];
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 4000;

/// Decide whether to retry, and how long to wait, for one failed attempt.
pub fn decide(outcome: &AttemptOutcome) -> RetryDecision {
    if outcome.attempt >= outcome.max_attempts {
        return RetryDecision {
            should_retry: false,
            wait_ms: 0,
            reason: "max_attempts_exceeded",
            penalty_ms: None,
            penalty_scope: None,
        };
    }

    let (retryable, reason, status) = match outcome.status_code {
        Some(status) if RETRYABLE_STATUSES.contains(&status) => {
            (true, status_reason(status), Some(status))
        }
        Some(status) => (false, status_reason(status), Some(status)),
        None if outcome.network_error => (true, "network_error", None),
        None => (false, "unknown_error", None),
    };

    if !retryable {
        return RetryDecision {
            should_retry: false,
            wait_ms: 0,
            reason,
            penalty_ms: None,
            penalty_scope: None,
        };
    }

    let wait_ms = if let Some(retry_after) = outcome.retry_after_ms {
        retry_after
    } else {
        jittered_backoff(outcome.attempt)
    };

    let penalty_ms = match status {
        Some(429) | Some(503) => Some(wait_ms.max(1000)),
        _ => None,
    };

    RetryDecision {
        should_retry: true,
        wait_ms,
        reason: if status.is_none() && outcome.retry_after_ms.is_some() {
            "retry_after"
        } else {
            reason
        },
        penalty_ms,
        penalty_scope: penalty_ms.map(|_| PenaltyScope::Connection),
    }
}

fn status_reason(status: u16) -> &'static str {
    match status {
        408 => "http_408",
        425 => "http_425",
        429 => "http_429",
        500 => "http_500",
        502 => "http_502",
        503 => "http_503",
        504 => "http_504",
        _ => "http_terminal",
    }
}

fn jittered_backoff(attempt: u32) -> u64 {
    let exp = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let capped = exp.min(MAX_BACKOFF_MS) as f64;
    let jitter_frac = rand::rng().random_range(-0.2..=0.2);
    (capped * (1.0 + jitter_frac)).max(0.0) as u64
}
