//! `connectorrt doctor` — diagnose configuration and environment health.

use std::path::Path;

use connectorrt_config::RuntimeConfig;

pub async fn run(config_path: &Path, definitions_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("connector execution runtime — doctor");
    let mut issues = 0;

    match RuntimeConfig::load(config_path) {
        Ok(config) => {
            println!("  ok   config loaded from {}", config_path.display());

            match config.gateway.bind_addr.parse::<std::net::SocketAddr>() {
                Ok(_) => println!("  ok   gateway.bind_addr parses"),
                Err(e) => {
                    println!("  fail gateway.bind_addr invalid: {e}");
                    issues += 1;
                }
            }

            if let Some(parent) = config.audit.file_path.parent() {
                if parent.as_os_str().is_empty() || parent.exists() {
                    println!("  ok   audit log directory reachable");
                } else {
                    println!("  warn audit log directory does not exist yet: {}", parent.display());
                }
            }

            if config.gateway.bearer_tokens.is_empty() {
                println!("  warn no bearer tokens configured — gateway /v1 routes are open");
            } else {
                println!("  ok   {} bearer token(s) configured", config.gateway.bearer_tokens.len());
            }
        }
        Err(e) => {
            println!("  fail config invalid: {e}");
            issues += 1;
        }
    }

    if definitions_dir.exists() {
        println!("  ok   definitions directory exists: {}", definitions_dir.display());
    } else {
        println!("  warn no definitions directory at {} — no connectors will load", definitions_dir.display());
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  all checks passed");
    } else {
        println!("  {issues} issue(s) found");
    }

    Ok(())
}
