//! `connectorrt test-connection` — probe a connector's credentials without
//! running a full operation.

use std::path::Path;
use std::sync::Arc;

use connectorrt_executor::{test_connection, DefinitionRegistry, GenericExecutor, ResidencyRouter};
use connectorrt_http::HttpTransport;
use connectorrt_ratelimit::RateLimiter;
use connectorrt_schema::SchemaValidator;
use connectorrt_security::AuditLog;
use tokio_util::sync::CancellationToken;

use super::{load_config, parse_credentials};

pub async fn run(
    config_path: &Path,
    definitions_dir: &Path,
    app_id: &str,
    credentials: Option<&str>,
    organization_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path);

    let registry = Arc::new(DefinitionRegistry::new());
    connectorrt_gateway::definitions::load_dir(&registry, definitions_dir).await?;

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

    let cancel = CancellationToken::new();
    let result = test_connection(
        &executor,
        app_id,
        parse_credentials(credentials),
        organization_id,
        &cancel,
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
