//! `connectorrt execute` — run a single connector operation and print the result.

use std::path::Path;
use std::sync::Arc;

use connectorrt_executor::{DefinitionRegistry, ExecuteRequest, GenericExecutor, ResidencyRouter};
use connectorrt_http::HttpTransport;
use connectorrt_ratelimit::RateLimiter;
use connectorrt_schema::SchemaValidator;
use connectorrt_security::AuditLog;
use tokio_util::sync::CancellationToken;

use super::{load_config, parse_credentials, parse_json_arg};

pub async fn run(
    config_path: &Path,
    definitions_dir: &Path,
    app_id: &str,
    function_id: &str,
    parameters: Option<&str>,
    credentials: Option<&str>,
    organization_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path);

    let registry = Arc::new(DefinitionRegistry::new());
    let loaded = connectorrt_gateway::definitions::load_dir(&registry, definitions_dir).await?;
    tracing::info!(count = loaded, dir = %definitions_dir.display(), "loaded connector definitions");

    let transport = Arc::new(HttpTransport::new(RateLimiter::local_only()));
    let audit = Arc::new(AuditLog::new(config.audit.file_path.clone()));
    let executor = Arc::new(GenericExecutor::new(
        registry,
        Arc::new(SchemaValidator::new()),
        transport,
        audit,
        Arc::new(ResidencyRouter::new()),
        config.rate_limiter.max_attempts,
    ));

    let request = ExecuteRequest {
        app_id: app_id.to_string(),
        function_id: function_id.to_string(),
        parameters: parse_json_arg(parameters, serde_json::json!({})),
        credentials: parse_credentials(credentials),
    };

    let cancel = CancellationToken::new();
    let result = executor.execute(request, organization_id, &cancel).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
