//! C6: the HTTP attempt state machine — `PRE -> LIMITED -> IN_FLIGHT ->
//! DECIDE -> {DONE_OK, DONE_FAIL, RETRY}` — orchestrating the SSRF guard,
//! rate limiter, and retry policy around one `reqwest` call.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use connectorrt_core::{BackoffEvent, BackoffKind, HttpMethod, RateLimitRules};
use connectorrt_ratelimit::RateLimiter;
use connectorrt_retry::{decide, AttemptOutcome};
use connectorrt_security::{assert_addresses_safe, validate_syntax, SsrfError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::builder::BodyFormat;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request denied: {0}")]
    Ssrf(#[from] SsrfError),
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error after {attempts} attempt(s): {message}")]
    Exhausted {
        message: String,
        attempts: u32,
        status_code: Option<u16>,
        backoff_events: Vec<BackoffEvent>,
        rate_limiter_wait_ms: u64,
        rate_limiter_attempts: u32,
    },
    #[error("network error: {0}")]
    Network(String),
}

/// The parsed result of a completed (successful or exhausted) attempt loop.
pub struct TransportOutcome {
    pub status: u16,
    pub body: Value,
    pub attempts: u32,
    pub backoff_events: Vec<BackoffEvent>,
    pub rate_limiter_wait_ms: u64,
    pub rate_limiter_attempts: u32,
    pub last_retry_after_ms: Option<u64>,
}

pub struct HttpTransport {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl HttpTransport {
    pub fn new(rate_limiter: RateLimiter) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build reqwest client");
        Self { client, rate_limiter }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        headers: HashMap<String, String>,
        query: Vec<(String, String)>,
        body: Option<(BodyFormat, Value)>,
        connector: &str,
        connection: Option<&str>,
        rules: &RateLimitRules,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<TransportOutcome, TransportError> {
        assert_safe(url).await?;

        let mut backoff_events = Vec::new();
        let mut rate_limiter_wait_ms = 0u64;
        let mut rate_limiter_attempts = 0u32;
        let mut last_retry_after_ms = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let acquisition = self
                .rate_limiter
                .acquire(connector, connection, 1.0, rules, cancel)
                .await
                .map_err(|_| TransportError::Cancelled)?;
            rate_limiter_wait_ms += acquisition.wait_ms;
            rate_limiter_attempts += acquisition.attempts;

            let send_result = self
                .send_once(url, method, &headers, &query, body.as_ref())
                .await;
            acquisition.guard.release();

            let (status, parsed_body, network_error) = match send_result {
                Ok((status, parsed)) => (Some(status), parsed, false),
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "http attempt failed before a response");
                    (None, Value::Null, true)
                }
            };

            let retry_after_ms = status
                .and_then(|_| parsed_body.get("__retry_after_ms"))
                .and_then(Value::as_u64);
            if retry_after_ms.is_some() {
                last_retry_after_ms = retry_after_ms;
            }

            let terminal_ok = matches!(status, Some(s) if s < 400);
            if terminal_ok {
                return Ok(TransportOutcome {
                    status: status.unwrap(),
                    body: parsed_body,
                    attempts: attempt,
                    backoff_events,
                    rate_limiter_wait_ms,
                    rate_limiter_attempts,
                    last_retry_after_ms,
                });
            }

            let decision = decide(&AttemptOutcome {
                attempt,
                max_attempts,
                status_code: status,
                retry_after_ms,
                network_error,
            });

            if decision.should_retry {
                backoff_events.push(BackoffEvent {
                    kind: BackoffKind::HttpRetry,
                    wait_ms: decision.wait_ms,
                    attempt,
                    reason: decision.reason.to_string(),
                    status_code: status,
                    limiter_attempts: Some(acquisition.attempts),
                });

                if let Some(penalty_ms) = decision.penalty_ms {
                    self.rate_limiter
                        .schedule_penalty(connector, connection, penalty_ms, rules)
                        .await;
                }

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(decision.wait_ms)) => {}
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                }
                continue;
            }

            let message = if network_error {
                "network error".to_string()
            } else {
                format!("http {}", status.unwrap_or(0))
            };
            return Err(TransportError::Exhausted {
                message,
                attempts: attempt,
                status_code: status,
                backoff_events,
                rate_limiter_wait_ms,
                rate_limiter_attempts,
            });
        }
    }

    async fn send_once(
        &self,
        url: &str,
        method: HttpMethod,
        headers: &HashMap<String, String>,
        query: &[(String, String)],
        body: Option<&(BodyFormat, Value)>,
    ) -> Result<(u16, Value), reqwest::Error> {
        let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut builder = self.client.request(reqwest_method, url).query(query);

        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        builder = match body {
            Some((BodyFormat::Json, value)) => builder.json(value),
            Some((BodyFormat::Form, value)) => builder.form(value),
            Some((BodyFormat::Multipart, value)) => {
                let mut form = reqwest::multipart::Form::new();
                if let Some(obj) = value.as_object() {
                    for (k, v) in obj {
                        form = form.text(k.clone(), v.to_string());
                    }
                }
                builder.multipart(form)
            }
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);

        let text = response.text().await.unwrap_or_default();
        let mut parsed = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        if let Some(retry_after_ms) = retry_after_ms {
            if let Value::Object(ref mut map) = parsed {
                map.insert("__retry_after_ms".to_string(), Value::from(retry_after_ms));
            }
        }
        Ok((status, parsed))
    }
}

async fn assert_safe(raw_url: &str) -> Result<(), SsrfError> {
    let url = validate_syntax(raw_url)?;
    let host = url.host_str().expect("validated url always has a host").to_string();

    if let Ok(ip) = host.parse::<IpAddr>() {
        return assert_addresses_safe(&host, &[ip]);
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| SsrfError::DnsResolutionFailed {
            host: host.clone(),
            reason: e.to_string(),
        })?
        .map(|sock_addr| sock_addr.ip())
        .collect();

    assert_addresses_safe(&host, &addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assert_safe_rejects_loopback_literal() {
        let err = assert_safe("http://127.0.0.1/admin").await.unwrap_err();
        assert!(matches!(err, SsrfError::TargetNotAllowed(_)));
    }

    #[tokio::test]
    async fn assert_safe_rejects_non_http_scheme() {
        let err = assert_safe("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, SsrfError::ProtocolNotAllowed(_)));
    }

    #[tokio::test]
    async fn transport_rejects_ssrf_target_before_rate_limiting() {
        let transport = HttpTransport::new(RateLimiter::local_only());
        let rules = RateLimitRules::default();
        let cancel = CancellationToken::new();
        let result = transport
            .request(
                "http://169.254.169.254/latest/meta-data",
                HttpMethod::Get,
                HashMap::new(),
                Vec::new(),
                None,
                "generic",
                None,
                &rules,
                3,
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(TransportError::Ssrf(_))));
    }
}
