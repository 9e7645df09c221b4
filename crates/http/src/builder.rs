//! C8: merges an operation's endpoint template with its parameters into a
//! concrete URL, query, and body.

use connectorrt_core::{Credentials, HttpMethod};
use serde_json::{Map, Value};

use crate::auth::substitute_placeholders;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Form,
    Multipart,
}

#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub format: BodyFormat,
}

const RESERVED_PARAMS: &[&str] = &["credentials", "connectionId"];

/// Build a concrete request from `base_url` + `endpoint` template and
/// `params`. `connector_id` and `endpoint` drive the multipart/form
/// heuristics (Slack file uploads, Stripe writes).
pub fn build(
    connector_id: &str,
    base_url: &str,
    endpoint: &str,
    method: HttpMethod,
    params: &Value,
    credentials: &Credentials,
) -> BuiltRequest {
    let params_obj = params.as_object().cloned().unwrap_or_default();
    let path = substitute_placeholders(endpoint, &params_obj, credentials);

    let consumed = placeholder_names(endpoint);
    let remaining: Map<String, Value> = params_obj
        .into_iter()
        .filter(|(k, _)| !consumed.contains(k) && !RESERVED_PARAMS.contains(&k.as_str()))
        .collect();

    let url = join_url(base_url, &path);

    if method.carries_query_params() {
        let query = remaining
            .into_iter()
            .map(|(k, v)| (k, stringify_query_value(&v)))
            .collect();
        BuiltRequest {
            url,
            query,
            body: None,
            format: BodyFormat::Json,
        }
    } else {
        let format = resolve_format(connector_id, endpoint);
        BuiltRequest {
            url,
            query: Vec::new(),
            body: Some(Value::Object(remaining)),
            format,
        }
    }
}

fn resolve_format(connector_id: &str, endpoint: &str) -> BodyFormat {
    if connector_id == "slack" && endpoint.contains("upload") {
        BodyFormat::Multipart
    } else if connector_id == "stripe" {
        BodyFormat::Form
    } else {
        BodyFormat::Json
    }
}

fn stringify_query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify_query_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

fn placeholder_names(endpoint: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = endpoint.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == ':' {
            let rest = &endpoint[i + 1..];
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            if end > 0 {
                names.push(rest[..end].to_string());
            }
        } else if c == '{' {
            if let Some(close) = endpoint[i..].find('}') {
                names.push(endpoint[i + 1..i + close].to_string());
            }
        }
    }
    names
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
