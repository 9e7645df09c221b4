//! HTTP gateway for the connector execution runtime.
//!
//! Exposes the generic executor (C9), the paginated-execution and
//! test-connection contracts, the audit trail (C11), and the budget ledger
//! (C10) over a REST API built on Axum.
//!
//! Security layers applied by [`build_router`]:
//! - Bearer token authentication on all `/v1` routes
//! - CORS with an explicit allowed-origin list
//! - Request body size limit (1 MB)
//! - In-memory rate limiting of the gateway surface itself (separate from
//!   the per-connector token buckets C4 enforces downstream)
//! - HTTP trace logging

pub mod api_v1;
pub mod definitions;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    http::StatusCode,
    middleware::{self, Next},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use connectorrt_budget::BudgetLedger;
use connectorrt_config::RuntimeConfig;
use connectorrt_executor::{DefinitionRegistry, GenericExecutor, ResidencyRouter};
use connectorrt_http::HttpTransport;
use connectorrt_ratelimit::RateLimiter;
use connectorrt_schema::SchemaValidator;
use connectorrt_security::AuditLog;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub registry: Arc<DefinitionRegistry>,
    pub executor: Arc<GenericExecutor>,
    pub budget: Arc<BudgetLedger>,
    pub audit: Arc<AuditLog>,
    pub bearer_tokens: Vec<String>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full Axum router.
pub fn build_router(state: SharedState) -> Router {
    let v1 = api_v1::v1_router(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::any())
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(3600));

    let rate_limiter = Arc::new(GatewayRateLimiter::new(120, std::time::Duration::from_secs(60)));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server: wires the rate limiter, HTTP transport,
/// budget ledger, and audit log from `config`, loads connector definitions
/// from `definitions_dir`, and serves until the process is signalled to stop.
pub async fn start(
    config: RuntimeConfig,
    definitions_dir: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(DefinitionRegistry::new());
    if let Some(dir) = definitions_dir {
        let loaded = definitions::load_dir(&registry, dir).await?;
        info!(count = loaded, dir = %dir.display(), "loaded connector definitions");
    }

    let shared_store = None; // no networked SharedBucketStore implementation is wired up yet
    if config.rate_limiter.store_url.is_some() {
        warn!("rate_limiter.store_url is configured but no shared bucket store backend is built in; falling back to local-only buckets");
    }
    let rate_limiter = RateLimiter::new(shared_store);
    let transport = Arc::new(HttpTransport::new(rate_limiter));
    let validator = Arc::new(SchemaValidator::new());
    let audit = Arc::new(AuditLog::new(config.audit.file_path.clone()));
    let residency = Arc::new(ResidencyRouter::new());
    let budget = Arc::new(BudgetLedger::new(config.budgets.clone()));

    let executor = Arc::new(GenericExecutor::new(
        registry.clone(),
        validator,
        transport,
        audit.clone(),
        residency,
        config.rate_limiter.max_attempts,
    ));

    let state = Arc::new(GatewayState {
        registry,
        executor,
        budget,
        audit,
        bearer_tokens: config.gateway.bearer_tokens.clone(),
    });

    let app = build_router(state);

    info!(addr = %config.gateway.bind_addr, "gateway starting");
    let listener = tokio::net::TcpListener::bind(&config.gateway.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining in-flight requests");
}

// --- Gateway-surface rate limiter ---

/// Simple in-memory sliding-window rate limiter protecting the gateway's own
/// HTTP surface. Independent of the per-connector token buckets (C4) the
/// executor enforces against vendor APIs.
struct GatewayRateLimiter {
    max_requests: usize,
    window: std::time::Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl GatewayRateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps.last().is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rate-limits every request except `/health`, keyed on the bearer token (or
/// "anonymous"). Returns 429 when exceeded.
async fn rate_limit_middleware(
    limiter: Arc<GatewayRateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key.chars().take(20).collect::<String>(), "rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

/// Requires a valid `Authorization: Bearer <token>` header on every `/v1`
/// route once at least one token is configured. With no tokens configured
/// the gateway is open — intended for local development only.
async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<SharedState>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if state.bearer_tokens.is_empty() {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match auth_header {
        Some(token) if state.bearer_tokens.iter().any(|t| t == token) => Ok(next.run(req).await),
        _ => {
            warn!("unauthorized request to /v1 API — missing or invalid bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let registry = Arc::new(DefinitionRegistry::new());
        let transport = Arc::new(HttpTransport::new(RateLimiter::local_only()));
        let audit = Arc::new(AuditLog::new(std::env::temp_dir().join("gateway-lib-test-audit.jsonl")));
        let residency = Arc::new(ResidencyRouter::new());
        let executor = Arc::new(GenericExecutor::new(
            registry.clone(),
            Arc::new(SchemaValidator::new()),
            transport,
            audit.clone(),
            residency,
            3,
        ));
        Arc::new(GatewayState {
            registry,
            executor,
            budget: Arc::new(BudgetLedger::new(connectorrt_config::BudgetsConfig::default())),
            audit,
            bearer_tokens: Vec::new(),
        })
    }

    #[tokio::test]
    async fn health_endpoint_needs_no_auth() {
        let app = build_router(test_state());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_routes_are_open_when_no_bearer_tokens_are_configured() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/v1/budget/status")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_routes_reject_missing_bearer_token_once_configured() {
        let mut state = test_state();
        Arc::get_mut(&mut state).unwrap().bearer_tokens = vec!["secret-token".into()];
        let app = build_router(state);

        let req = Request::builder().uri("/v1/budget/status").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
