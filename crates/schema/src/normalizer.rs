//! C2: normalizes heterogeneous vendor response shapes into `{items,
//! meta}`, and extracts a pagination cursor from the same payload for
//! `executePaginated`.

use serde_json::Value;

/// One normalized page of results plus whatever pagination metadata was
/// found verbatim (vendor-specific keys preserved for callers that need
/// them).
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    pub items: Vec<Value>,
    pub meta: Value,
    pub next_cursor: Option<String>,
}

/// Normalize `raw_body` for `connector_id`. Returns `None` when the body
/// shape isn't recognized by any known vendor or generic rule.
pub fn normalize(connector_id: &str, raw_body: &Value) -> Option<NormalizedPage> {
    let obj = raw_body.as_object();

    let items_meta = match connector_id {
        "slack" => obj.and_then(|o| {
            ["members", "channels", "files"]
                .iter()
                .find_map(|key| o.get(*key))
                .map(|items| (items.clone(), o.get("response_metadata").or_else(|| o.get("paging")).cloned()))
        }),
        "stripe" => obj.and_then(|o| {
            o.get("data").map(|items| (items.clone(), json_meta_from(o, &["has_more"])))
        }),
        "hubspot" => obj.and_then(|o| {
            o.get("results").map(|items| (items.clone(), o.get("paging").cloned()))
        }),
        "github" => raw_body.as_array().map(|arr| (Value::Array(arr.clone()), None)),
        "zendesk" => obj.and_then(|o| {
            ["results", "tickets", "users"]
                .iter()
                .find_map(|key| o.get(*key))
                .map(|items| (items.clone(), json_meta_from(o, &["next_page"])))
        }),
        "typeform" => obj.and_then(|o| {
            o.get("items").map(|items| (items.clone(), json_meta_from(o, &["total_items"])))
        }),
        "google_drive" | "google_calendar" => obj.and_then(|o| {
            ["files", "items"]
                .iter()
                .find_map(|key| o.get(*key))
                .map(|items| (items.clone(), json_meta_from(o, &["nextPageToken"])))
        }),
        "dropbox" => obj.and_then(|o| {
            ["entries", "matches"]
                .iter()
                .find_map(|key| o.get(*key))
                .map(|items| (items.clone(), json_meta_from(o, &["has_more", "cursor"])))
        }),
        "microsoft_dataverse" => obj.and_then(|o| {
            o.get("value").map(|items| (items.clone(), json_meta_from(o, &["@odata.nextLink"])))
        }),
        _ => None,
    }
    .or_else(|| generic_fallback(raw_body));

    let (items_value, meta) = items_meta?;
    let items = match items_value {
        Value::Array(arr) => arr,
        other => vec![other],
    };
    let meta = meta.unwrap_or(Value::Null);
    let next_cursor = extract_cursor(connector_id, raw_body, &items, &meta);

    Some(NormalizedPage {
        items,
        meta,
        next_cursor,
    })
}

fn json_meta_from(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<Value> {
    let mut meta = serde_json::Map::new();
    for key in keys {
        if let Some(v) = obj.get(*key) {
            meta.insert((*key).to_string(), v.clone());
        }
    }
    if meta.is_empty() {
        None
    } else {
        Some(Value::Object(meta))
    }
}

fn generic_fallback(raw_body: &Value) -> Option<(Value, Option<Value>)> {
    if let Some(arr) = raw_body.as_array() {
        return Some((Value::Array(arr.clone()), None));
    }
    let obj = raw_body.as_object()?;
    for key in ["items", "results", "data"] {
        if let Some(items) = obj.get(key) {
            return Some((items.clone(), None));
        }
    }
    None
}

/// Prefer `next_cursor` -> `response_metadata.next_cursor` -> the query
/// string of `next` -> Stripe's `has_more` (derive `starting_after` from
/// the last item's `id`). Returns `None` when no cursor can be produced.
fn extract_cursor(connector_id: &str, raw_body: &Value, items: &[Value], meta: &Value) -> Option<String> {
    if let Some(cursor) = raw_body.get("next_cursor").and_then(Value::as_str) {
        return Some(cursor.to_string());
    }
    if let Some(cursor) = meta
        .get("response_metadata")
        .and_then(|m| m.get("next_cursor"))
        .and_then(Value::as_str)
    {
        return Some(cursor.to_string());
    }
    if let Some(next) = raw_body.get("next").and_then(Value::as_str) {
        if let Ok(url) = url::Url::parse(next).or_else(|_| url::Url::parse(&format!("https://placeholder{next}"))) {
            if let Some(cursor) = url.query_pairs().find(|(k, _)| k == "cursor" || k == "page_token") {
                return Some(cursor.1.to_string());
            }
        }
    }
    if connector_id == "stripe" {
        let has_more = raw_body.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        if has_more {
            if let Some(last_id) = items.last().and_then(|i| i.get("id")).and_then(Value::as_str) {
                return Some(format!("starting_after={last_id}"));
            }
        }
    }
    if connector_id == "microsoft_dataverse" {
        if let Some(next_link) = raw_body.get("@odata.nextLink").and_then(Value::as_str) {
            if let Ok(url) = url::Url::parse(next_link) {
                if let Some((_, token)) = url.query_pairs().find(|(k, _)| k == "$skiptoken") {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_slack_members() {
        let body = json!({
            "members": [{"id": "U1"}, {"id": "U2"}],
            "response_metadata": {"next_cursor": "abc123"}
        });
        let page = normalize("slack", &body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("abc123"));
    }

    #[test]
    fn normalizes_stripe_list_and_derives_starting_after() {
        let body = json!({
            "data": [{"id": "ch_1"}, {"id": "ch_2"}],
            "has_more": true
        });
        let page = normalize("stripe", &body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("starting_after=ch_2"));
    }

    #[test]
    fn stripe_without_has_more_has_no_cursor() {
        let body = json!({ "data": [{"id": "ch_1"}], "has_more": false });
        let page = normalize("stripe", &body).unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn normalizes_github_bare_array() {
        let body = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
        let page = normalize("github", &body).unwrap();
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn normalizes_dataverse_and_extracts_skiptoken() {
        let body = json!({
            "value": [{"id": "a"}],
            "@odata.nextLink": "https://org.crm.dynamics.com/api/data?$skiptoken=XYZ"
        });
        let page = normalize("microsoft_dataverse", &body).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("XYZ"));
    }

    #[test]
    fn falls_back_to_generic_items_key() {
        let body = json!({ "items": [{"a": 1}] });
        let page = normalize("unknown_vendor", &body).unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn falls_back_to_bare_array() {
        let body = json!([{"a": 1}, {"b": 2}]);
        let page = normalize("unknown_vendor", &body).unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn returns_none_for_unrecognized_shape() {
        let body = json!({ "unexpected": "shape" });
        assert!(normalize("unknown_vendor", &body).is_none());
    }
}
