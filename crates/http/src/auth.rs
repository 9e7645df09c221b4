//! C7: mutates outgoing headers/query from a connector's `AuthConfig` and
//! the caller's credentials, and substitutes `{name}` placeholders in the
//! base URL.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use connectorrt_core::{AuthConfig, Credentials, ParamLocation};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential field: {0}")]
    MissingField(String),
}

/// Headers and query parameters mutated in place by `inject`.
#[derive(Debug, Default, Clone)]
pub struct AuthMutation {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

/// Apply `auth_config` to produce header/query additions from `credentials`.
/// Does not touch the URL template — callers substitute `{name}`
/// placeholders in `base_url` separately via `substitute_placeholders`.
pub fn inject(auth_config: &AuthConfig, credentials: &Credentials) -> Result<AuthMutation, AuthError> {
    let mut mutation = AuthMutation::default();

    match auth_config {
        AuthConfig::OAuth2 { token_fields } => {
            let token = credentials
                .get_first(token_fields)
                .ok_or_else(|| AuthError::MissingField(token_fields.join("|")))?;
            mutation
                .headers
                .insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        AuthConfig::ApiKey {
            location,
            header_name,
            query_name,
            prefix,
            value_field,
            additional_params,
        } => {
            let raw = credentials
                .get(value_field)
                .ok_or_else(|| AuthError::MissingField(value_field.clone()))?;
            let value = match prefix {
                Some(p) => format!("{p}{raw}"),
                None => raw.to_string(),
            };
            match location {
                ParamLocation::Header => {
                    let name = header_name.clone().unwrap_or_else(|| "X-Api-Key".to_string());
                    mutation.headers.insert(name, value);
                }
                ParamLocation::Query => {
                    let name = query_name.clone().unwrap_or_else(|| "api_key".to_string());
                    mutation.query.insert(name, value);
                }
            }
            for (k, template) in additional_params {
                mutation.query.insert(k.clone(), template_credentials(template, credentials));
            }
        }
        AuthConfig::Basic => {
            let username = credentials.get("username").ok_or_else(|| AuthError::MissingField("username".into()))?;
            let password = credentials.get("password").ok_or_else(|| AuthError::MissingField("password".into()))?;
            let encoded = BASE64.encode(format!("{username}:{password}"));
            mutation
                .headers
                .insert("Authorization".to_string(), format!("Basic {encoded}"));
        }
        AuthConfig::Bearer { token_field } => {
            let token = credentials
                .get(token_field)
                .ok_or_else(|| AuthError::MissingField(token_field.clone()))?;
            mutation
                .headers
                .insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        AuthConfig::Custom => {}
    }

    Ok(mutation)
}

/// Replace every `{field}` in `template` with the matching, URL-encoded
/// credential value; leaves unmatched placeholders untouched.
fn template_credentials(template: &str, credentials: &Credentials) -> String {
    let mut out = template.to_string();
    let mut start = 0;
    while let Some(open) = out[start..].find('{') {
        let open = start + open;
        let Some(close_rel) = out[open..].find('}') else { break };
        let close = open + close_rel;
        let name = &out[open + 1..close];
        if let Some(value) = credentials.get(name) {
            let encoded = utf8_percent_encode(value, NON_ALPHANUMERIC).to_string();
            out.replace_range(open..=close, &encoded);
            start = open + encoded.len();
        } else {
            start = close + 1;
        }
    }
    out
}

/// Substitute `:name` and `{name}` placeholders in `url_or_endpoint` from
/// `params` first, falling back to `credentials`. Values are URL-encoded.
pub fn substitute_placeholders(
    template: &str,
    params: &serde_json::Map<String, serde_json::Value>,
    credentials: &Credentials,
) -> String {
    let mut out = template.to_string();
    let mut start = 0;
    while start < out.len() {
        let remainder = &out[start..];
        let (open, close, name) = if let Some(rel) = remainder.find(':') {
            let after = &remainder[rel + 1..];
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if end == 0 {
                start += rel + 1;
                continue;
            }
            (start + rel, start + rel + 1 + end, after[..end].to_string())
        } else if let Some(rel) = remainder.find('{') {
            let open = start + rel;
            match remainder[rel..].find('}') {
                Some(close_rel) => (open, open + close_rel + 1, remainder[rel + 1..rel + close_rel].to_string()),
                None => break,
            }
        } else {
            break;
        };

        let value = params
            .get(&name)
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| Some(v.to_string())))
            .or_else(|| credentials.get(&name).map(str::to_string));

        match value {
            Some(v) => {
                let encoded = utf8_percent_encode(&v, NON_ALPHANUMERIC).to_string();
                out.replace_range(open..close, &encoded);
                start = open + encoded.len();
            }
            None => start = close,
        }
    }
    out
}
