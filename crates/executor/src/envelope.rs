//! Step 8/9 of the execute contract: pulling a human message out of an
//! error body, and recognizing a vendor that returns HTTP 200 with a
//! failure envelope instead of a real error status (Slack's `ok: false`
//! being the canonical example).

use serde_json::Value;

/// `error.message`, falling back to a top-level `message`, falling back to
/// a bare string `error` field.
pub fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| body.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| body.get("error").and_then(Value::as_str).map(str::to_string))
}

/// A 2xx body that carries its own `ok: false` / truthy `error` is a vendor
/// failure envelope, not a success. Slack's shape (`{ok: false, error:
/// "channel_not_found"}`) is the generic case: an explicit `ok` flag that
/// isn't `true`, paired with an `error` field.
pub fn vendor_failure_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    let ok = obj.get("ok")?.as_bool().unwrap_or(false);
    if ok {
        return None;
    }
    let error = obj.get("error")?;
    Some(
        error
            .as_str()
            .map(str::to_string)
            .or_else(|| error.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "vendor error".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_error_message() {
        let body = json!({ "error": { "message": "bad token" } });
        assert_eq!(extract_error_message(&body).as_deref(), Some("bad token"));
    }

    #[test]
    fn falls_back_to_top_level_message() {
        let body = json!({ "message": "not found" });
        assert_eq!(extract_error_message(&body).as_deref(), Some("not found"));
    }

    #[test]
    fn falls_back_to_bare_string_error() {
        let body = json!({ "error": "boom" });
        assert_eq!(extract_error_message(&body).as_deref(), Some("boom"));
    }

    #[test]
    fn slack_style_envelope_is_detected() {
        let body = json!({ "ok": false, "error": "channel_not_found" });
        assert_eq!(vendor_failure_message(&body).as_deref(), Some("channel_not_found"));
    }

    #[test]
    fn ok_true_is_not_a_failure() {
        let body = json!({ "ok": true, "data": [] });
        assert!(vendor_failure_message(&body).is_none());
    }

    #[test]
    fn missing_ok_field_is_not_treated_as_an_envelope() {
        let body = json!({ "error": "some data field named error" });
        assert!(vendor_failure_message(&body).is_none());
    }
}
