//! # connectorrt-core
//!
//! Domain types and the error taxonomy for the connector execution runtime.
//! This crate has **zero I/O** — it defines the connector/operation model
//! and runtime state records that every other crate builds against.

pub mod definition;
pub mod error;
pub mod model;

// Re-export key types at crate root for ergonomics
pub use definition::{
    AuthConfig, ConcurrencyPolicy, ConcurrencyScope, ConnectorDefinition, ConnectorOperation,
    Credentials, DeprecationWindow, HttpMethod, Lifecycle, LifecycleStatus, NetworkPolicy,
    OperationKind, ParamLocation, RateLimitHeaderNames, RateLimitRules, RequiredOutbound,
    TestConnectionSpec,
};
pub use error::{ErrorKind, Result, RuntimeError};
pub use model::{
    AuditEntry, AuditMeta, BackoffEvent, BackoffKind, CacheEntry, TokenBucket, UsageRecord,
};
