//! End-to-end tests for the CLI's config lifecycle and connector-definition
//! loading, exercised the way the binary itself exercises them.

use std::sync::Arc;

use connectorrt_config::RuntimeConfig;
use connectorrt_executor::DefinitionRegistry;

#[test]
fn default_config_round_trips_through_toml() {
    let config = RuntimeConfig::default();
    let toml_str = toml::to_string_pretty(&config).expect("config should serialize");
    let reparsed: RuntimeConfig = toml::from_str(&toml_str).expect("config should parse back");

    assert_eq!(reparsed.gateway.bind_addr, config.gateway.bind_addr);
    assert_eq!(reparsed.budgets.daily_usd, config.budgets.daily_usd);
}

#[test]
fn config_init_then_load_produces_the_same_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("connectorrt.toml");

    std::fs::write(&path, RuntimeConfig::default_toml()).unwrap();
    let loaded = RuntimeConfig::load(&path).expect("freshly written default config should load");

    assert_eq!(loaded.gateway.bind_addr, RuntimeConfig::default().gateway.bind_addr);
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let loaded = RuntimeConfig::load(&path).expect("a missing config file is not an error");
    assert_eq!(loaded.budgets.daily_usd, RuntimeConfig::default().budgets.daily_usd);
}

#[tokio::test]
async fn definitions_directory_loads_into_a_fresh_registry() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("example.json"),
        serde_json::json!({
            "id": "example",
            "name": "Example",
            "version": "1",
            "lifecycle": { "status": "stable" },
            "base_url": "https://api.example.com",
            "auth_type_config": { "type": "bearer" },
        })
        .to_string(),
    )
    .unwrap();

    let registry = Arc::new(DefinitionRegistry::new());
    let count = connectorrt_gateway::definitions::load_dir(&registry, dir.path())
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert!(registry.get("example").is_some());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn executing_against_an_unregistered_connector_fails_without_reaching_the_network() {
    use connectorrt_executor::{ExecuteRequest, GenericExecutor, ResidencyRouter};
    use connectorrt_http::HttpTransport;
    use connectorrt_ratelimit::RateLimiter;
    use connectorrt_schema::SchemaValidator;
    use connectorrt_security::AuditLog;
    use tokio_util::sync::CancellationToken;

    let registry = Arc::new(DefinitionRegistry::new());
    let audit_path = std::env::temp_dir().join("connectorrt-cli-e2e-audit.jsonl");
    let executor = GenericExecutor::new(
        registry,
        Arc::new(SchemaValidator::new()),
        Arc::new(HttpTransport::new(RateLimiter::local_only())),
        Arc::new(AuditLog::new(audit_path)),
        Arc::new(ResidencyRouter::new()),
        3,
    );

    let request = ExecuteRequest {
        app_id: "ghost".into(),
        function_id: "noop".into(),
        parameters: serde_json::json!({}),
        credentials: Default::default(),
    };
    let cancel = CancellationToken::new();
    let result = executor.execute(request, Some("org-1"), &cancel).await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, "unknown_connector");
}
