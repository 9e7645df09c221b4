//! The aggregated runtime error and the error-kind taxonomy every crate maps into.
//!
//! Every bounded context (schema, security, ratelimit, retry, http, budget) owns
//! its own `thiserror` enum; `RuntimeError` is the single type the executor and
//! the gateway actually propagate, built from those via `#[from]` at the seams.

use thiserror::Error;

/// The error-kind taxonomy from the error handling design: used to decide
/// retry/terminal behavior and to pick an HTTP status code at the gateway edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown connector or operation.
    Config,
    /// Parameters violate the operation's schema.
    Validation,
    /// Missing/invalid credential; vendor 401/403.
    Auth,
    /// SSRF denial, protocol denial, concurrency exceeded.
    Policy,
    /// HTTP 408/425/429/5xx, network timeout, DNS transient.
    Transient,
    /// 2xx response with a vendor-level failure envelope.
    Vendor,
    /// LLM budget denial.
    Quota,
    /// Schema compile failure, audit write failure, bug.
    Internal,
}

/// The runtime's single propagated error type.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("unknown connector: {0}")]
    UnknownConnector(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid parameters: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("request denied: {0}")]
    Policy(String),

    /// A retryable or exhausted-retry failure from the HTTP layer.
    #[error("transient error: {message}")]
    Transient {
        message: String,
        status_code: Option<u16>,
        retry_after_ms: Option<u64>,
    },

    #[error("vendor error: {0}")]
    Vendor(String),

    #[error("budget exceeded: {0}")]
    Quota(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::UnknownConnector(_) | RuntimeError::UnknownOperation(_) => {
                ErrorKind::Config
            }
            RuntimeError::Validation(_) => ErrorKind::Validation,
            RuntimeError::Auth(_) => ErrorKind::Auth,
            RuntimeError::Policy(_) => ErrorKind::Policy,
            RuntimeError::Transient { .. } => ErrorKind::Transient,
            RuntimeError::Vendor(_) => ErrorKind::Vendor,
            RuntimeError::Quota(_) => ErrorKind::Quota,
            RuntimeError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error kind is ever retried by C5. Internal/config/validation/
    /// auth/policy/quota/vendor errors are terminal at C9; only `Transient` loops.
    pub fn is_retryable_kind(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_config_variants() {
        assert_eq!(
            RuntimeError::UnknownConnector("demo".into()).kind(),
            ErrorKind::Config
        );
        assert_eq!(
            RuntimeError::UnknownOperation("ping".into()).kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn only_transient_is_retryable() {
        let transient = RuntimeError::Transient {
            message: "gateway timeout".into(),
            status_code: Some(504),
            retry_after_ms: None,
        };
        assert!(transient.is_retryable_kind());
        assert!(!RuntimeError::Validation("bad field".into()).is_retryable_kind());
        assert!(!RuntimeError::Quota("daily cap".into()).is_retryable_kind());
    }
}
