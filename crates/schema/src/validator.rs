//! C1: compiles and caches a JSON Schema validator per `(connector,
//! operation)` key, tolerating unknown format strings rather than
//! rejecting the schema outright.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jsonschema::Validator;
use serde_json::Value;

/// The validation result surfaced to callers: either the params pass, or a
/// list of human-readable error messages is returned.
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<String>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Caches one compiled `Validator` per `(connector, operation)` pair.
pub struct SchemaValidator {
    cache: Mutex<HashMap<(String, String), Arc<Validator>>>,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Validate `params` against `schema`, compiling and caching the
    /// validator on first use for this `(connector, operation)` pair.
    ///
    /// A schema that fails to compile is treated as "no validation": the
    /// failure is logged and `ValidationOutcome::Valid` is returned, per the
    /// contract that a bad schema must never block an otherwise-valid call.
    pub fn validate(
        &self,
        connector: &str,
        operation: &str,
        schema: &Value,
        params: &Value,
    ) -> ValidationOutcome {
        let key = (connector.to_string(), operation.to_string());

        let validator = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = cache.get(&key) {
                existing.clone()
            } else {
                match jsonschema::validator_for(schema) {
                    Ok(compiled) => {
                        let compiled = Arc::new(compiled);
                        cache.insert(key, compiled.clone());
                        compiled
                    }
                    Err(e) => {
                        tracing::warn!(
                            connector,
                            operation,
                            error = %e,
                            "schema compilation failed, treating as no validation"
                        );
                        return ValidationOutcome::Valid;
                    }
                }
            }
        };

        let errors: Vec<String> = validator
            .iter_errors(params)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_params_pass() {
        let validator = SchemaValidator::new();
        let schema = json!({
            "type": "object",
            "properties": { "channel": { "type": "string" } },
            "required": ["channel"]
        });
        let outcome = validator.validate("slack", "post_message", &schema, &json!({"channel": "#general"}));
        assert!(outcome.is_valid());
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let validator = SchemaValidator::new();
        let schema = json!({
            "type": "object",
            "properties": { "channel": { "type": "string" } },
            "required": ["channel"]
        });
        let outcome = validator.validate("slack", "post_message", &schema, &json!({}));
        assert!(!outcome.is_valid());
        if let ValidationOutcome::Invalid(errors) = outcome {
            assert!(!errors.is_empty());
        }
    }

    #[test]
    fn unknown_format_strings_are_tolerated() {
        let validator = SchemaValidator::new();
        let schema = json!({
            "type": "object",
            "properties": { "when": { "type": "string", "format": "not-a-real-format" } }
        });
        let outcome = validator.validate("custom", "op", &schema, &json!({"when": "whatever"}));
        assert!(outcome.is_valid());
    }

    #[test]
    fn broken_schema_degrades_to_no_validation() {
        let validator = SchemaValidator::new();
        let schema = json!({ "type": "not-a-real-type" });
        let outcome = validator.validate("custom", "op", &schema, &json!({"anything": true}));
        assert!(outcome.is_valid());
    }

    #[test]
    fn compiled_validator_is_reused_across_calls() {
        let validator = SchemaValidator::new();
        let schema = json!({ "type": "object" });
        validator.validate("connector", "op", &schema, &json!({}));
        validator.validate("connector", "op", &schema, &json!({}));
        assert_eq!(validator.cache.lock().unwrap().len(), 1);
    }
}
