//! `connectorrt audit` — tail the append-only audit trail.

use std::path::Path;

use connectorrt_security::AuditLog;

use super::load_config;

pub async fn run(config_path: &Path, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path);
    let audit = AuditLog::new(config.audit.file_path.clone());
    let entries = audit.read_last(limit).await?;

    if entries.is_empty() {
        println!("no audit entries at {}", config.audit.file_path.display());
        return Ok(());
    }

    for entry in &entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    println!("\n{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });

    Ok(())
}
