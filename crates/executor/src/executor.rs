//! C9 Contract A: `execute`, the eleven-step pipeline that turns one
//! `{appId, functionId, parameters, credentials}` call into a normalized
//! `{success, data?, error?}` result, with an audit record emitted on the
//! way out regardless of outcome.

use std::sync::Arc;
use std::time::Instant;

use connectorrt_core::{
    AuditEntry, AuditMeta, BackoffEvent, ConnectorDefinition, ConnectorOperation, Credentials,
    RateLimitRules, RuntimeError,
};
use connectorrt_http::{auth, builder, HttpTransport, TransportError};
use connectorrt_retry::{classify_status, HttpErrorCode};
use connectorrt_schema::{normalize, SchemaValidator, ValidationOutcome};
use connectorrt_security::AuditLog;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::envelope::{extract_error_message, vendor_failure_message};
use crate::registry::DefinitionRegistry;
use crate::residency::ResidencyRouter;
use crate::result::{to_execute_error, ExecuteRequest, ExecuteResult};

pub struct GenericExecutor {
    registry: Arc<DefinitionRegistry>,
    validator: Arc<SchemaValidator>,
    transport: Arc<HttpTransport>,
    audit: Arc<AuditLog>,
    residency: Arc<ResidencyRouter>,
    max_attempts: u32,
}

/// Everything a successful or exhausted attempt loop leaves behind, folded
/// into the audit entry's `meta` regardless of whether C9 ultimately
/// succeeds.
#[derive(Default)]
struct AttemptMeta {
    attempts: u32,
    rate_limiter_wait_ms: u64,
    rate_limiter_attempts: u32,
    backoffs: Vec<BackoffEvent>,
}

impl AttemptMeta {
    fn total_backoff_ms(&self) -> u64 {
        self.backoffs.iter().map(|b| b.wait_ms).sum()
    }
}

impl GenericExecutor {
    pub fn new(
        registry: Arc<DefinitionRegistry>,
        validator: Arc<SchemaValidator>,
        transport: Arc<HttpTransport>,
        audit: Arc<AuditLog>,
        residency: Arc<ResidencyRouter>,
        max_attempts: u32,
    ) -> Self {
        Self { registry, validator, transport, audit, residency, max_attempts }
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    /// A bare reachability probe: auth injection and the HTTP call, with no
    /// schema validation and no response normalization. Used by `testConnection`
    /// when a connector has no named `test_connection` operation of its own.
    pub async fn probe(
        &self,
        definition: &ConnectorDefinition,
        endpoint: &str,
        method: connectorrt_core::HttpMethod,
        credentials: &Credentials,
        organization_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ExecuteResult {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let outcome = self.run_probe(definition, endpoint, method, credentials, cancel).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let region = self.residency.region_for(organization_id);
        let (result, error_message, meta) = match outcome {
            Ok(()) => (ExecuteResult::ok(json!({ "status": "reachable" })), None, self.build_meta(&AttemptMeta::default(), organization_id, &region)),
            Err((err, code)) => {
                let execute_error = to_execute_error(&err, 1, code.as_deref());
                let message = execute_error.message.clone();
                (ExecuteResult::failure(execute_error), Some(message), self.build_meta(&AttemptMeta::default(), organization_id, &region))
            }
        };

        self.audit
            .record(&AuditEntry {
                ts: chrono::Utc::now(),
                request_id,
                connector_id: definition.id.clone(),
                operation_id: "test_connection".to_string(),
                duration_ms,
                success: result.success,
                error: error_message,
                meta,
            })
            .await;

        result
    }

    async fn run_probe(
        &self,
        definition: &ConnectorDefinition,
        endpoint: &str,
        method: connectorrt_core::HttpMethod,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<(), (RuntimeError, Option<String>)> {
        let mutation = auth::inject(&definition.auth_type_config, credentials)
            .map_err(|e| (RuntimeError::Auth(e.to_string()), None))?;

        let path = auth::substitute_placeholders(endpoint, &serde_json::Map::new(), credentials);
        let url = format!("{}/{}", definition.base_url.trim_end_matches('/'), path.trim_start_matches('/'));

        let connection_id = credentials.connection_id.clone();
        let transport_result = self
            .transport
            .request(
                &url,
                method,
                mutation.headers,
                mutation.query.into_iter().collect(),
                None,
                &definition.id,
                connection_id.as_deref(),
                &definition.rate_limits,
                1,
                cancel,
            )
            .await;

        match transport_result {
            Ok(outcome) if outcome.status < 400 => Ok(()),
            Ok(outcome) => {
                let http_code = classify_status(outcome.status);
                let message = extract_error_message(&outcome.body).unwrap_or_else(|| format!("http {}", outcome.status));
                let (err, code) = classify_to_runtime_error(http_code, outcome.status, message);
                Err((err, Some(code)))
            }
            Err(TransportError::Ssrf(e)) => Err((RuntimeError::Policy(e.to_string()), Some("policy_denied".to_string()))),
            Err(TransportError::Cancelled) => Err((RuntimeError::Internal("execution cancelled".to_string()), None)),
            Err(TransportError::Network(msg)) => Err((
                RuntimeError::Transient { message: msg, status_code: None, retry_after_ms: None },
                Some("network_error".to_string()),
            )),
            Err(TransportError::Exhausted { message, status_code, .. }) => {
                let (err, code) = map_terminal_status(status_code, message);
                Err((err, Some(code)))
            }
        }
    }

    pub async fn execute(
        &self,
        request: ExecuteRequest,
        organization_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ExecuteResult {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let connection_id = request.credentials.connection_id.clone();

        let outcome = self
            .run_pipeline(&request, connection_id.as_deref(), cancel)
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let region = self.residency.region_for(organization_id);

        let (result, error_message, meta) = match outcome {
            Ok((data, attempt_meta)) => {
                let meta = self.build_meta(&attempt_meta, organization_id, &region);
                (ExecuteResult::ok(data), None, meta)
            }
            Err((err, code, attempt_meta)) => {
                let execute_error = to_execute_error(&err, attempt_meta.attempts.max(1), code.as_deref());
                let meta = self.build_meta(&attempt_meta, organization_id, &region);
                let message = execute_error.message.clone();
                (ExecuteResult::failure(execute_error), Some(message), meta)
            }
        };

        self.audit
            .record(&AuditEntry {
                ts: chrono::Utc::now(),
                request_id,
                connector_id: request.app_id.clone(),
                operation_id: request.function_id.clone(),
                duration_ms,
                success: result.success,
                error: error_message,
                meta,
            })
            .await;

        result
    }

    fn build_meta(&self, attempt_meta: &AttemptMeta, organization_id: Option<&str>, region: &str) -> AuditMeta {
        AuditMeta {
            rate_limiter_attempts: Some(attempt_meta.rate_limiter_attempts),
            rate_limiter_wait_ms: Some(attempt_meta.rate_limiter_wait_ms),
            backoffs: attempt_meta.backoffs.clone(),
            total_backoff_ms: Some(attempt_meta.total_backoff_ms()),
            organization_id: organization_id.map(str::to_string),
            region: Some(region.to_string()),
            extra: Default::default(),
        }
    }

    #[allow(clippy::type_complexity)]
    async fn run_pipeline(
        &self,
        request: &ExecuteRequest,
        connection_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(Value, AttemptMeta), (RuntimeError, Option<String>, AttemptMeta)> {
        let definition = self
            .registry
            .get(&request.app_id)
            .ok_or_else(|| {
                (RuntimeError::UnknownConnector(request.app_id.clone()), Some("unknown_connector".to_string()), AttemptMeta::default())
            })?;

        let operation = definition
            .find_operation(&request.function_id)
            .cloned()
            .ok_or_else(|| {
                (RuntimeError::UnknownOperation(request.function_id.clone()), Some("unknown_operation".to_string()), AttemptMeta::default())
            })?;

        if let ValidationOutcome::Invalid(errors) =
            self.validator.validate(&definition.id, &operation.id, &operation.parameters, &request.parameters)
        {
            return Err((RuntimeError::Validation(errors.join("; ")), Some("validation_error".to_string()), AttemptMeta::default()));
        }

        let rules = merged_rate_limits(&definition, &operation);

        let mutation = auth::inject(&definition.auth_type_config, &request.credentials)
            .map_err(|e| (RuntimeError::Auth(e.to_string()), None, AttemptMeta::default()))?;

        let params_obj = request.parameters.as_object().cloned().unwrap_or_default();
        let base_url = auth::substitute_placeholders(&definition.base_url, &params_obj, &request.credentials);

        let mut built = builder::build(
            &definition.id,
            &base_url,
            &operation.endpoint,
            operation.method,
            &request.parameters,
            &request.credentials,
        );
        let mut headers = mutation.headers;
        for (k, v) in mutation.query {
            built.query.push((k, v));
        }
        headers.entry("Accept".to_string()).or_insert_with(|| "application/json".to_string());

        let body = built.body.map(|v| (built.format, v));

        let transport_result = self
            .transport
            .request(
                &built.url,
                operation.method,
                headers,
                built.query,
                body,
                &definition.id,
                connection_id,
                &rules,
                self.max_attempts,
                cancel,
            )
            .await;

        let (status, raw_body, attempt_meta) = match transport_result {
            Ok(outcome) => {
                let meta = AttemptMeta {
                    attempts: outcome.attempts,
                    rate_limiter_wait_ms: outcome.rate_limiter_wait_ms,
                    rate_limiter_attempts: outcome.rate_limiter_attempts,
                    backoffs: outcome.backoff_events,
                };
                (outcome.status, outcome.body, meta)
            }
            Err(TransportError::Ssrf(e)) => {
                return Err((RuntimeError::Policy(e.to_string()), Some("policy_denied".to_string()), AttemptMeta::default()))
            }
            Err(TransportError::Cancelled) => {
                return Err((RuntimeError::Internal("execution cancelled".to_string()), None, AttemptMeta::default()))
            }
            Err(TransportError::Network(msg)) => {
                return Err((
                    RuntimeError::Transient { message: msg, status_code: None, retry_after_ms: None },
                    Some("network_error".to_string()),
                    AttemptMeta::default(),
                ))
            }
            Err(TransportError::Exhausted { message, attempts, status_code, backoff_events, rate_limiter_wait_ms, rate_limiter_attempts }) => {
                let attempt_meta = AttemptMeta { attempts, rate_limiter_wait_ms, rate_limiter_attempts, backoffs: backoff_events };
                let (err, code) = map_terminal_status(status_code, message);
                return Err((err, Some(code), attempt_meta));
            }
        };

        if status >= 400 {
            let http_code = classify_status(status);
            let message = extract_error_message(&raw_body).unwrap_or_else(|| format!("http {status}"));
            let (err, code) = classify_to_runtime_error(http_code, status, message);
            return Err((err, Some(code), attempt_meta));
        }

        if let Some(vendor_message) = vendor_failure_message(&raw_body) {
            return Err((RuntimeError::Vendor(vendor_message), Some("vendor_error".to_string()), attempt_meta));
        }

        let data = match normalize(&definition.id, &raw_body) {
            Some(page) => json!({ "items": page.items, "meta": page.meta, "nextCursor": page.next_cursor }),
            None => attach_fallback_meta(raw_body),
        };

        Ok((data, attempt_meta))
    }
}

fn merged_rate_limits(definition: &ConnectorDefinition, operation: &ConnectorOperation) -> RateLimitRules {
    match &operation.rate_limits {
        Some(op_rules) => definition.rate_limits.merge_stricter(op_rules),
        None => definition.rate_limits.clone(),
    }
}

fn attach_fallback_meta(raw_body: Value) -> Value {
    let Value::Object(mut map) = raw_body else { return raw_body };
    if !map.contains_key("meta") {
        let mut meta = serde_json::Map::new();
        for key in ["next", "next_cursor", "has_more"] {
            if let Some(v) = map.get(key) {
                meta.insert(key.to_string(), v.clone());
            }
        }
        if !meta.is_empty() {
            map.insert("meta".to_string(), Value::Object(meta));
        }
    }
    Value::Object(map)
}

fn classify_to_runtime_error(http_code: HttpErrorCode, status: u16, message: String) -> (RuntimeError, String) {
    let code = http_code.as_str().to_string();
    let err = match http_code {
        HttpErrorCode::ValidationError | HttpErrorCode::UnprocessableEntity => RuntimeError::Validation(message),
        HttpErrorCode::Unauthorized => RuntimeError::Auth(message),
        HttpErrorCode::Forbidden => RuntimeError::Policy(message),
        HttpErrorCode::RateLimitExceeded | HttpErrorCode::ServerError => {
            RuntimeError::Transient { message, status_code: Some(status), retry_after_ms: None }
        }
        HttpErrorCode::NotFound | HttpErrorCode::Conflict | HttpErrorCode::Other => RuntimeError::Vendor(message),
    };
    (err, code)
}

fn map_terminal_status(status_code: Option<u16>, message: String) -> (RuntimeError, String) {
    match status_code {
        Some(status) => classify_to_runtime_error(classify_status(status), status, message),
        None => (RuntimeError::Transient { message, status_code: None, retry_after_ms: None }, "network_error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectorrt_core::{
        AuthConfig, ConcurrencyPolicy, HttpMethod, Lifecycle, LifecycleStatus, NetworkPolicy, OperationKind,
    };
    use connectorrt_ratelimit::RateLimiter;

    fn make_executor() -> (GenericExecutor, Arc<DefinitionRegistry>, tempfile::TempDir) {
        let registry = Arc::new(DefinitionRegistry::new());
        let validator = Arc::new(SchemaValidator::new());
        let transport = Arc::new(HttpTransport::new(RateLimiter::local_only()));
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit.jsonl")));
        let residency = Arc::new(ResidencyRouter::new());
        let executor = GenericExecutor::new(registry.clone(), validator, transport, audit, residency, 3);
        (executor, registry, dir)
    }

    fn demo_definition() -> ConnectorDefinition {
        ConnectorDefinition {
            id: "demo".into(),
            name: "Demo".into(),
            version: "1".into(),
            lifecycle: Lifecycle { status: LifecycleStatus::Stable, beta_started_at: None, deprecation: None },
            base_url: "http://169.254.169.254".into(),
            auth_type_config: AuthConfig::Custom,
            actions: vec![ConnectorOperation {
                id: "ping".into(),
                kind: OperationKind::Action,
                endpoint: "/ping".into(),
                method: HttpMethod::Get,
                parameters: json!({ "type": "object", "required": ["id"], "properties": { "id": { "type": "string" } } }),
                response_schema: None,
                output_schema: None,
                sample: None,
                rate_limits: None,
            }],
            triggers: Vec::new(),
            rate_limits: RateLimitRules::default(),
            concurrency: ConcurrencyPolicy::default(),
            network: NetworkPolicy::default(),
            test_connection: None,
        }
    }

    #[tokio::test]
    async fn unknown_connector_is_a_config_error() {
        let (executor, _registry, _dir) = make_executor();
        let cancel = CancellationToken::new();
        let result = executor
            .execute(
                ExecuteRequest { app_id: "ghost".into(), function_id: "ping".into(), parameters: json!({}), credentials: Credentials::new() },
                None,
                &cancel,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "unknown_connector");
    }

    #[tokio::test]
    async fn unknown_operation_is_a_config_error() {
        let (executor, registry, _dir) = make_executor();
        registry.register(demo_definition());
        let cancel = CancellationToken::new();
        let result = executor
            .execute(
                ExecuteRequest { app_id: "demo".into(), function_id: "missing".into(), parameters: json!({}), credentials: Credentials::new() },
                None,
                &cancel,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "unknown_operation");
    }

    #[tokio::test]
    async fn invalid_parameters_fail_before_any_network_call() {
        let (executor, registry, _dir) = make_executor();
        registry.register(demo_definition());
        let cancel = CancellationToken::new();
        let result = executor
            .execute(
                ExecuteRequest { app_id: "demo".into(), function_id: "ping".into(), parameters: json!({}), credentials: Credentials::new() },
                None,
                &cancel,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "validation_error");
    }

    #[tokio::test]
    async fn ssrf_target_is_denied_as_policy_error() {
        let (executor, registry, _dir) = make_executor();
        registry.register(demo_definition());
        let cancel = CancellationToken::new();
        let result = executor
            .execute(
                ExecuteRequest { app_id: "demo".into(), function_id: "ping".into(), parameters: json!({"id": "1"}), credentials: Credentials::new() },
                None,
                &cancel,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "policy_denied");
    }
}
