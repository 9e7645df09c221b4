//! `ConnectorDefinition` and `ConnectorOperation` — the declarative description
//! of one external API that the executor is handed per call.
//!
//! `authConfig` and operation `type` are modeled as tagged unions rather than
//! duck-typed JSON, per the redesign note: exhaustive matching lands in the
//! auth injector and request builder instead of string-keyed lookups.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A connector's lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Alpha,
    Beta,
    Stable,
    Deprecated,
    Sunset,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeprecationWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifecycle {
    pub status: LifecycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<DeprecationWindow>,
}

/// Where an authentication value is placed on the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Header,
    Query,
}

/// A sum type over the connector's authentication scheme, tagged by `type`.
///
/// Every variant carries exactly the fields that scheme needs — no single
/// loosely-typed `authConfig` bag that C7/C8 have to duck-type at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// `Authorization: Bearer <token>`, token read from the first credential
    /// field present among `token_fields` (default search order:
    /// `accessToken`, `token`, `integrationToken`).
    OAuth2 {
        #[serde(default = "default_oauth2_fields")]
        token_fields: Vec<String>,
    },
    /// API key placed in a header or query parameter.
    ApiKey {
        #[serde(default = "default_api_key_location")]
        location: ParamLocation,
        /// Header name when `location == Header` (default `X-Api-Key`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header_name: Option<String>,
        /// Query parameter name when `location == Query` (default `api_key`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query_name: Option<String>,
        /// Prepended to the credential value (e.g. `"Bearer "`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        /// Which credential field holds the key (default `apiKey`).
        #[serde(default = "default_api_key_field")]
        value_field: String,
        /// Extra header/query params templated against credentials, e.g.
        /// `{"X-Account-Id": "{accountId}"}`.
        #[serde(default)]
        additional_params: HashMap<String, String>,
    },
    /// `Authorization: Basic base64(username:password)`.
    Basic,
    /// `Authorization: Bearer <tokenField>` from a named credential.
    Bearer {
        #[serde(default = "default_bearer_field")]
        token_field: String,
    },
    /// The operation template supplies its own auth; the transport passes
    /// through untouched.
    Custom,
}

fn default_oauth2_fields() -> Vec<String> {
    vec![
        "accessToken".to_string(),
        "token".to_string(),
        "integrationToken".to_string(),
    ]
}
fn default_api_key_location() -> ParamLocation {
    ParamLocation::Header
}
fn default_api_key_field() -> String {
    "apiKey".to_string()
}
fn default_bearer_field() -> String {
    "accessToken".to_string()
}

/// HTTP header names a vendor uses to communicate its own rate-limit state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitHeaderNames {
    #[serde(default)]
    pub limit: Vec<String>,
    #[serde(default)]
    pub remaining: Vec<String>,
    #[serde(default)]
    pub reset: Vec<String>,
    #[serde(default)]
    pub retry_after: Vec<String>,
}

/// Rate-limit policy; may appear at connector level and again, more strictly,
/// per operation (merged per §4.4/§4.9 monotonicity rule).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
    #[serde(default)]
    pub headers: RateLimitHeaderNames,
}

impl RateLimitRules {
    /// Combine connector- and operation-level rules, keeping whichever side
    /// is stricter for each dimension (min of permitted rates, min of burst).
    pub fn merge_stricter(&self, other: &RateLimitRules) -> RateLimitRules {
        fn stricter(a: Option<f64>, b: Option<f64>) -> Option<f64> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            }
        }
        RateLimitRules {
            requests_per_second: stricter(self.requests_per_second, other.requests_per_second),
            requests_per_minute: stricter(self.requests_per_minute, other.requests_per_minute),
            requests_per_hour: stricter(self.requests_per_hour, other.requests_per_hour),
            requests_per_day: stricter(self.requests_per_day, other.requests_per_day),
            burst: match (self.burst, other.burst) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            },
            headers: if self.headers.limit.is_empty() {
                other.headers.clone()
            } else {
                self.headers.clone()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyScope {
    Connection,
    Connector,
    Organization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,
    #[serde(default = "default_concurrency_scope")]
    pub scope: ConcurrencyScope,
}

fn default_concurrency_scope() -> ConcurrencyScope {
    ConcurrencyScope::Connection
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            max_concurrent: None,
            scope: default_concurrency_scope(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequiredOutbound {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub ip_ranges: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkPolicy {
    #[serde(default)]
    pub required_outbound: RequiredOutbound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConnectionSpec {
    pub endpoint: String,
    pub method: HttpMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// `GET|DELETE|HEAD` carry remaining params as query; the rest as body.
    pub fn carries_query_params(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete | HttpMethod::Head)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Action,
    Trigger,
}

/// One callable action or trigger of a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Templated with `:name` or `{name}` placeholders.
    pub endpoint: String,
    pub method: HttpMethod,
    /// JSON Schema for the operation's parameters.
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimitRules>,
}

/// The declarative description of one external API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    pub lifecycle: Lifecycle,
    pub base_url: String,
    pub auth_type_config: AuthConfig,
    #[serde(default)]
    pub actions: Vec<ConnectorOperation>,
    #[serde(default)]
    pub triggers: Vec<ConnectorOperation>,
    #[serde(default)]
    pub rate_limits: RateLimitRules,
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,
    #[serde(default)]
    pub network: NetworkPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_connection: Option<TestConnectionSpec>,
}

impl ConnectorDefinition {
    /// Find an operation by id across both `actions` and `triggers`.
    pub fn find_operation(&self, operation_id: &str) -> Option<&ConnectorOperation> {
        self.actions
            .iter()
            .chain(self.triggers.iter())
            .find(|op| op.id == operation_id)
    }
}

/// An opaque credential bundle supplied by the caller per call.
///
/// Never cached by the core — owned by the caller's stack frame for the
/// duration of one `execute` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(flatten)]
    fields: HashMap<String, String>,
    #[serde(rename = "__connectionId", default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(rename = "__organizationId", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Find the first credential field present among `names`, in order.
    pub fn get_first(&self, names: &[String]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_stricter_takes_min_rate() {
        let connector_wide = RateLimitRules {
            requests_per_second: Some(10.0),
            burst: Some(30),
            ..Default::default()
        };
        let per_operation = RateLimitRules {
            requests_per_second: Some(2.0),
            burst: Some(5),
            ..Default::default()
        };
        let merged = connector_wide.merge_stricter(&per_operation);
        assert_eq!(merged.requests_per_second, Some(2.0));
        assert_eq!(merged.burst, Some(5));
    }

    #[test]
    fn find_operation_searches_actions_and_triggers() {
        let def = ConnectorDefinition {
            id: "demo".into(),
            name: "Demo".into(),
            version: "1".into(),
            lifecycle: Lifecycle {
                status: LifecycleStatus::Stable,
                beta_started_at: None,
                deprecation: None,
            },
            base_url: "https://api.example.com".into(),
            auth_type_config: AuthConfig::Custom,
            actions: vec![ConnectorOperation {
                id: "ping".into(),
                kind: OperationKind::Action,
                endpoint: "/ping".into(),
                method: HttpMethod::Get,
                parameters: serde_json::json!({"type": "object"}),
                response_schema: None,
                output_schema: None,
                sample: None,
                rate_limits: None,
            }],
            triggers: vec![ConnectorOperation {
                id: "on_update".into(),
                kind: OperationKind::Trigger,
                endpoint: "/updates".into(),
                method: HttpMethod::Get,
                parameters: serde_json::json!({"type": "object"}),
                response_schema: None,
                output_schema: None,
                sample: None,
                rate_limits: None,
            }],
            rate_limits: RateLimitRules::default(),
            concurrency: ConcurrencyPolicy::default(),
            network: NetworkPolicy::default(),
            test_connection: None,
        };

        assert!(def.find_operation("ping").is_some());
        assert!(def.find_operation("on_update").is_some());
        assert!(def.find_operation("missing").is_none());
    }

    #[test]
    fn credentials_reserved_fields_round_trip() {
        let creds = Credentials::new()
            .with_field("apiKey", "secret-value")
            .with_field("accessToken", "token-value");
        let mut creds = creds;
        creds.connection_id = Some("conn-1".into());
        creds.organization_id = Some("org-1".into());

        let json = serde_json::to_string(&creds).unwrap();
        let round_tripped: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.get("apiKey"), Some("secret-value"));
        assert_eq!(round_tripped.connection_id.as_deref(), Some("conn-1"));
    }

    #[test]
    fn get_first_searches_in_order() {
        let creds = Credentials::new().with_field("token", "tok-value");
        let order = default_oauth2_fields();
        assert_eq!(creds.get_first(&order), Some("tok-value"));
    }
}
