//! `connectorrt status` — show the resolved configuration and runtime state.

use std::path::Path;

use super::load_config;

pub async fn run(config_path: &Path, definitions_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path);

    println!("connector execution runtime — status");
    println!("  config file:     {}", config_path.display());
    println!("  definitions dir: {}", definitions_dir.display());
    println!("  gateway bind:    {}", config.gateway.bind_addr);
    println!(
        "  bearer auth:     {}",
        if config.gateway.bearer_tokens.is_empty() { "disabled (open)" } else { "enabled" }
    );
    println!("  audit log:       {}", config.audit.file_path.display());
    println!(
        "  budgets:         daily ${:.2}, monthly ${:.2}, per-user ${:.2}, per-workflow ${:.2}",
        config.budgets.daily_usd,
        config.budgets.monthly_usd,
        config.budgets.per_user_daily_usd,
        config.budgets.per_workflow_usd
    );
    println!("  cache:           {} entries max, ttl {}s", config.cache.max_entries, config.cache.ttl_secs);
    println!(
        "  rate limiter:    {} attempts max, shared store {}",
        config.rate_limiter.max_attempts,
        config.rate_limiter.store_url.as_deref().unwrap_or("none configured")
    );

    let definition_count = if definitions_dir.exists() {
        std::fs::read_dir(definitions_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                    .count()
            })
            .unwrap_or(0)
    } else {
        0
    };
    println!("  connectors:      {definition_count} definition file(s) found");

    Ok(())
}
