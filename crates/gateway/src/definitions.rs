//! Loads curated `ConnectorDefinition` JSON files from a directory at
//! startup into a [`DefinitionRegistry`]. One file per connector, named
//! after its id (e.g. `slack.json`) by convention but keyed by the `id`
//! field inside the file, not the filename.

use std::path::Path;
use std::sync::Arc;

use connectorrt_core::ConnectorDefinition;
use connectorrt_executor::DefinitionRegistry;

pub async fn load_dir(registry: &Arc<DefinitionRegistry>, dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = tokio::fs::read_to_string(&path).await?;
        match serde_json::from_str::<ConnectorDefinition>(&content) {
            Ok(definition) => {
                registry.register(definition);
                count += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed connector definition");
            }
        }
    }

    Ok(count)
}
