//! Holds every loaded `ConnectorDefinition`, keyed by connector id.
//!
//! Definitions are curated content loaded at startup (or pushed by an
//! admin endpoint), read far more often than written — an `RwLock` over a
//! plain map, the same single-writer-many-readers discipline the other
//! in-process caches in this runtime use.

use std::collections::HashMap;
use std::sync::RwLock;

use connectorrt_core::ConnectorDefinition;

#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<String, ConnectorDefinition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition: ConnectorDefinition) {
        self.definitions.write().unwrap().insert(definition.id.clone(), definition);
    }

    pub fn get(&self, connector_id: &str) -> Option<ConnectorDefinition> {
        self.definitions.read().unwrap().get(connector_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.definitions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectorrt_core::{AuthConfig, ConcurrencyPolicy, Lifecycle, LifecycleStatus, NetworkPolicy, RateLimitRules};

    fn definition(id: &str) -> ConnectorDefinition {
        ConnectorDefinition {
            id: id.to_string(),
            name: id.to_string(),
            version: "1".into(),
            lifecycle: Lifecycle { status: LifecycleStatus::Stable, beta_started_at: None, deprecation: None },
            base_url: "https://api.example.com".into(),
            auth_type_config: AuthConfig::Custom,
            actions: Vec::new(),
            triggers: Vec::new(),
            rate_limits: RateLimitRules::default(),
            concurrency: ConcurrencyPolicy::default(),
            network: NetworkPolicy::default(),
            test_connection: None,
        }
    }

    #[test]
    fn register_and_look_up_by_id() {
        let registry = DefinitionRegistry::new();
        registry.register(definition("slack"));
        assert!(registry.get("slack").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn registering_the_same_id_twice_replaces_it() {
        let registry = DefinitionRegistry::new();
        registry.register(definition("slack"));
        registry.register(definition("slack"));
        assert_eq!(registry.len(), 1);
    }
}
