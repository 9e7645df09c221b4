//! HTTP API v1 — the REST surface over the generic executor.
//!
//! Endpoints:
//!
//! - `POST /v1/execute`            — run one connector operation (Contract A)
//! - `POST /v1/execute/paginated`  — run it across pages (Contract B)
//! - `POST /v1/test-connection`    — cheap reachability probe (Contract C)
//! - `GET  /v1/audit`              — tail the audit trail
//! - `GET  /v1/budget/status`      — current budget decision for an org/user/workflow

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use connectorrt_core::Credentials;
use connectorrt_executor::{execute_paginated, test_connection, ExecuteRequest, ExecuteResult};

use crate::GatewayState;

pub type SharedApiState = Arc<GatewayState>;

pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/execute", post(execute_handler))
        .route("/execute/paginated", post(execute_paginated_handler))
        .route("/test-connection", post(test_connection_handler))
        .route("/audit", get(audit_handler))
        .route("/budget/status", get(budget_status_handler))
        .with_state(state)
}

// ── Request / response types ─────────────────────────────────────────────

#[derive(Deserialize)]
struct ExecuteBody {
    app_id: String,
    function_id: String,
    #[serde(default = "default_params")]
    parameters: serde_json::Value,
    #[serde(default)]
    credentials: Credentials,
    #[serde(default)]
    organization_id: Option<String>,
}

fn default_params() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Deserialize)]
struct ExecutePaginatedBody {
    #[serde(flatten)]
    execute: ExecuteBody,
    #[serde(default)]
    max_pages: Option<u32>,
}

#[derive(Deserialize)]
struct TestConnectionBody {
    app_id: String,
    #[serde(default)]
    credentials: Credentials,
    #[serde(default)]
    organization_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn execute_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ExecuteBody>,
) -> Json<ExecuteResult> {
    info!(app_id = %payload.app_id, function_id = %payload.function_id, "v1/execute request");

    let request = ExecuteRequest {
        app_id: payload.app_id,
        function_id: payload.function_id,
        parameters: payload.parameters,
        credentials: payload.credentials,
    };
    let cancel = CancellationToken::new();
    let result = state
        .executor
        .execute(request, payload.organization_id.as_deref(), &cancel)
        .await;

    Json(result)
}

async fn execute_paginated_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ExecutePaginatedBody>,
) -> Json<connectorrt_executor::PaginatedResult> {
    let body = payload.execute;
    info!(app_id = %body.app_id, function_id = %body.function_id, "v1/execute/paginated request");

    let request = ExecuteRequest {
        app_id: body.app_id,
        function_id: body.function_id,
        parameters: body.parameters,
        credentials: body.credentials,
    };
    let cancel = CancellationToken::new();
    let result = execute_paginated(
        &state.executor,
        request,
        body.organization_id.as_deref(),
        payload.max_pages,
        &cancel,
    )
    .await;

    Json(result)
}

async fn test_connection_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<TestConnectionBody>,
) -> Json<ExecuteResult> {
    info!(app_id = %payload.app_id, "v1/test-connection request");

    let cancel = CancellationToken::new();
    let result = test_connection(
        &state.executor,
        &payload.app_id,
        payload.credentials,
        payload.organization_id.as_deref(),
        &cancel,
    )
    .await;

    Json(result)
}

#[derive(Deserialize)]
struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    limit: usize,
}

fn default_audit_limit() -> usize {
    50
}

#[derive(Serialize)]
struct AuditResponse {
    entries: Vec<connectorrt_core::AuditEntry>,
    count: usize,
}

async fn audit_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, (StatusCode, Json<ErrorResponse>)> {
    let entries = state.audit.read_last(query.limit).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: format!("failed to read audit trail: {e}") }),
        )
    })?;
    let count = entries.len();
    Ok(Json(AuditResponse { entries, count }))
}

#[derive(Deserialize)]
struct BudgetStatusQuery {
    #[serde(default)]
    organization_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    estimate_usd: Option<f64>,
}

async fn budget_status_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<BudgetStatusQuery>,
) -> Json<connectorrt_budget::BudgetDecision> {
    let decision = state.budget.check_budget(
        query.estimate_usd.unwrap_or(0.0),
        query.organization_id.as_deref(),
        query.user_id.as_deref(),
        query.workflow_id.as_deref(),
    );
    Json(decision)
}
