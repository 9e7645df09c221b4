//! `connectorrt gateway` — start the HTTP gateway server.

use std::path::{Path, PathBuf};

use super::{load_config, DEFAULT_DEFINITIONS_DIR};

pub async fn run(
    config_path: &Path,
    port_override: Option<u16>,
    host_override: Option<String>,
    definitions: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path);

    if let Some(port) = port_override {
        let host = config
            .gateway
            .bind_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.gateway.bind_addr = format!("{host}:{port}");
    }
    if let Some(host) = host_override {
        let port = config
            .gateway
            .bind_addr
            .rsplit_once(':')
            .map(|(_, port)| port.to_string())
            .unwrap_or_else(|| "8080".to_string());
        config.gateway.bind_addr = format!("{host}:{port}");
    }

    let definitions_dir = definitions.unwrap_or_else(|| PathBuf::from(DEFAULT_DEFINITIONS_DIR));
    let definitions_dir = definitions_dir.exists().then_some(definitions_dir.as_path());

    println!("connector execution runtime — gateway");
    println!("  listening:   {}", config.gateway.bind_addr);
    println!("  audit log:   {}", config.audit.file_path.display());
    println!(
        "  daily budget: ${:.2}  monthly budget: ${:.2}",
        config.budgets.daily_usd, config.budgets.monthly_usd
    );
    println!(
        "  bearer auth: {}",
        if config.gateway.bearer_tokens.is_empty() { "disabled (open)" } else { "enabled" }
    );

    connectorrt_gateway::start(config, definitions_dir).await?;

    Ok(())
}
