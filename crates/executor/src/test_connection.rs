//! C9 Contract C: `testConnection`, a cheap reachability probe for one set
//! of credentials. Prefers a connector's own `test_connection` operation
//! (run through the full `execute` pipeline), falls back to its declared
//! `TestConnectionSpec` or a hardcoded vendor heuristic, and otherwise
//! reports ready without making any network call.

use serde_json::json;
use tokio_util::sync::CancellationToken;

use connectorrt_core::{Credentials, HttpMethod};

use crate::executor::GenericExecutor;
use crate::result::{to_execute_error, ExecuteRequest, ExecuteResult};

const PROBE_OPERATION_ID: &str = "test_connection";

/// A vendor-specific cheap-probe endpoint for connectors that declare
/// neither a named `test_connection` operation nor a `testConnection` spec
/// in their definition.
fn vendor_probe(connector_id: &str) -> Option<(&'static str, HttpMethod)> {
    match connector_id {
        "hubspot" => Some(("/crm/v3/owners?limit=1", HttpMethod::Get)),
        "stripe" => Some(("/v1/charges?limit=1", HttpMethod::Get)),
        _ => None,
    }
}

pub async fn test_connection(
    executor: &GenericExecutor,
    app_id: &str,
    credentials: Credentials,
    organization_id: Option<&str>,
    cancel: &CancellationToken,
) -> ExecuteResult {
    let Some(definition) = executor.registry().get(app_id) else {
        return ExecuteResult::failure(to_execute_error(
            &connectorrt_core::RuntimeError::UnknownConnector(app_id.to_string()),
            1,
            Some("unknown_connector"),
        ));
    };

    if definition.find_operation(PROBE_OPERATION_ID).is_some() {
        let request = ExecuteRequest {
            app_id: app_id.to_string(),
            function_id: PROBE_OPERATION_ID.to_string(),
            parameters: json!({}),
            credentials,
        };
        return executor.execute(request, organization_id, cancel).await;
    }

    if let Some(spec) = &definition.test_connection {
        return executor.probe(&definition, &spec.endpoint, spec.method, &credentials, organization_id, cancel).await;
    }

    if let Some((endpoint, method)) = vendor_probe(app_id) {
        return executor.probe(&definition, endpoint, method, &credentials, organization_id, cancel).await;
    }

    ExecuteResult::ok(json!({ "status": "ready" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vendors_have_a_cheap_probe_endpoint() {
        assert!(vendor_probe("hubspot").is_some());
        assert!(vendor_probe("stripe").is_some());
        assert!(vendor_probe("unknown_connector").is_none());
    }
}
