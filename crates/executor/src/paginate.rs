//! C9 Contract B: `executePaginated`, which drives repeated `execute` calls
//! forward by feeding each page's cursor back into the next call's
//! parameters, until the vendor stops handing one back.

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::executor::GenericExecutor;
use crate::result::ExecuteRequest;

const DEFAULT_MAX_PAGES: u32 = 5;

/// The accumulated result of `execute_paginated`: every page's items
/// concatenated, the last page's `meta`, and how many pages were fetched.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedResult {
    pub items: Vec<Value>,
    pub meta: Value,
    pub pages: u32,
}

/// The cursor query/body parameter a connector expects the next page's
/// cursor under. Stripe and Microsoft Dataverse name theirs explicitly;
/// everything else uses the generic `cursor` key that most vendors accept
/// (and that the generic fallback normalizer produces).
fn cursor_param_name(connector_id: &str) -> &'static str {
    match connector_id {
        "stripe" => "starting_after",
        "google_drive" | "google_calendar" => "pageToken",
        "microsoft_dataverse" => "$skiptoken",
        _ => "cursor",
    }
}

/// A cursor value may already be a `key=value` pair (Stripe's pagination
/// token shape) — split on `=` so the key names the param directly instead
/// of going through the per-connector lookup.
fn merge_cursor(connector_id: &str, params: &Value, cursor: &str) -> Value {
    let mut obj: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
    match cursor.split_once('=') {
        Some((key, value)) => {
            obj.insert(key.to_string(), Value::String(value.to_string()));
        }
        None => {
            obj.insert(cursor_param_name(connector_id).to_string(), Value::String(cursor.to_string()));
        }
    }
    Value::Object(obj)
}

pub async fn execute_paginated(
    executor: &GenericExecutor,
    mut request: ExecuteRequest,
    organization_id: Option<&str>,
    max_pages: Option<u32>,
    cancel: &CancellationToken,
) -> PaginatedResult {
    let max_pages = max_pages.unwrap_or(DEFAULT_MAX_PAGES).max(1);
    let mut items = Vec::new();
    let mut meta = Value::Null;
    let mut pages = 0u32;

    loop {
        pages += 1;
        let result = executor.execute(request.clone(), organization_id, cancel).await;

        if !result.success {
            meta = result.error.map(|e| serde_json::json!({ "error": e })).unwrap_or(Value::Null);
            break;
        }

        let Some(data) = result.data else { break };
        let page_items = data.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        items.extend(page_items);
        meta = data.get("meta").cloned().unwrap_or(Value::Null);

        let next_cursor = data.get("nextCursor").and_then(Value::as_str).map(str::to_string);
        let Some(cursor) = next_cursor else { break };
        if pages >= max_pages {
            break;
        }

        request.parameters = merge_cursor(&request.app_id, &request.parameters, &cursor);
    }

    PaginatedResult { items, meta, pages }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_cursor_is_split_into_its_named_param() {
        let params = serde_json::json!({ "limit": 10 });
        let merged = merge_cursor("stripe", &params, "starting_after=ch_2");
        assert_eq!(merged["starting_after"], "ch_2");
        assert_eq!(merged["limit"], 10);
    }

    #[test]
    fn bare_cursor_uses_the_connector_specific_param_name() {
        let params = serde_json::json!({});
        let merged = merge_cursor("google_drive", &params, "abc123");
        assert_eq!(merged["pageToken"], "abc123");
    }

    #[test]
    fn unknown_connector_falls_back_to_generic_cursor_param() {
        let params = serde_json::json!({});
        let merged = merge_cursor("generic", &params, "xyz");
        assert_eq!(merged["cursor"], "xyz");
    }
}
