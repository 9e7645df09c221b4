//! `connectorrt config` — configuration management commands.

use std::path::Path;

use connectorrt_config::RuntimeConfig;

pub async fn validate(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("validating {}", config_path.display());
    match RuntimeConfig::load(config_path) {
        Ok(config) => {
            println!("  ok — config is valid");
            println!("  gateway:   {}", config.gateway.bind_addr);
            println!("  audit:     {}", config.audit.file_path.display());
            println!(
                "  budgets:   daily ${:.2} / monthly ${:.2}",
                config.budgets.daily_usd, config.budgets.monthly_usd
            );
            println!("  cache:     {} entries, ttl {}s", config.cache.max_entries, config.cache.ttl_secs);
            Ok(())
        }
        Err(e) => {
            println!("  error: {e}");
            Err(e.into())
        }
    }
}

pub async fn show(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path);
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        println!("config already exists at {}", config_path.display());
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(config_path, RuntimeConfig::default_toml())?;
    println!("wrote default config to {}", config_path.display());
    Ok(())
}
