//! The request/response envelope every executor contract returns —
//! `{success, data?, error?}` — and the conversion from the aggregated
//! `RuntimeError` into the user-visible error shape the error handling
//! design requires: a code, a message, the attempt count, and the last
//! `Retry-After` observed.

use connectorrt_core::{ErrorKind, RuntimeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub app_id: String,
    pub function_id: String,
    pub parameters: Value,
    pub credentials: connectorrt_core::Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteError {
    pub code: String,
    pub message: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecuteError>,
}

impl ExecuteResult {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: ExecuteError) -> Self {
        Self { success: false, data: None, error: Some(error) }
    }
}

/// Default human-facing code for a `RuntimeError` that didn't originate
/// from a classified HTTP status (those carry their own finer-grained code,
/// attached by the caller before this function ever runs).
pub fn default_code_for_kind(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Config => "unknown_connector",
        ErrorKind::Validation => "validation_error",
        ErrorKind::Auth => "unauthorized",
        ErrorKind::Policy => "policy_denied",
        ErrorKind::Transient => "server_error",
        ErrorKind::Vendor => "vendor_error",
        ErrorKind::Quota => "budget_exceeded",
        ErrorKind::Internal => "internal_error",
    }
}

/// Build an `ExecuteError` from a `RuntimeError`, optionally overriding the
/// code with one already computed from a classified HTTP status.
pub fn to_execute_error(err: &RuntimeError, attempts: u32, code_override: Option<&str>) -> ExecuteError {
    let retry_after_ms = match err {
        RuntimeError::Transient { retry_after_ms, .. } => *retry_after_ms,
        _ => None,
    };
    ExecuteError {
        code: code_override.map(str::to_string).unwrap_or_else(|| default_code_for_kind(err.kind()).to_string()),
        message: err.to_string(),
        attempts,
        retry_after_ms,
    }
}
