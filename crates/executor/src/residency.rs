//! C12: per-organization data-residency metadata. The executor consults
//! this purely to tag audit entries with a region; it never changes which
//! host a request is sent to.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

const DEFAULT_REGION: &str = "us";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageResidency {
    pub secrets_namespace: String,
    pub file_prefix: String,
    pub log_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidencyReport {
    pub region: String,
    pub data_residency: String,
    pub storage: StorageResidency,
    #[serde(default)]
    pub workloads: serde_json::Value,
}

#[derive(Default)]
pub struct ResidencyRouter {
    reports: RwLock<HashMap<String, ResidencyReport>>,
}

impl ResidencyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, organization_id: impl Into<String>, report: ResidencyReport) {
        self.reports.write().unwrap().insert(organization_id.into(), report);
    }

    /// `None` when the organization has no registered residency record.
    pub fn get_residency_report(&self, organization_id: &str) -> Option<ResidencyReport> {
        self.reports.read().unwrap().get(organization_id).cloned()
    }

    /// The region to tag an audit entry with: the organization's recorded
    /// region, or `"us"` when it has none.
    pub fn region_for(&self, organization_id: Option<&str>) -> String {
        organization_id
            .and_then(|id| self.reports.read().unwrap().get(id).map(|r| r.region.clone()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(region: &str) -> ResidencyReport {
        ResidencyReport {
            region: region.to_string(),
            data_residency: "strict".into(),
            storage: StorageResidency {
                secrets_namespace: "org-1".into(),
                file_prefix: "org-1/".into(),
                log_prefix: "org-1/logs/".into(),
            },
            workloads: serde_json::json!({}),
        }
    }

    #[test]
    fn unknown_org_has_no_report_but_defaults_region_to_us() {
        let router = ResidencyRouter::new();
        assert!(router.get_residency_report("org-1").is_none());
        assert_eq!(router.region_for(Some("org-1")), "us");
        assert_eq!(router.region_for(None), "us");
    }

    #[test]
    fn registered_org_reports_its_own_region() {
        let router = ResidencyRouter::new();
        router.register("org-eu", report("eu"));
        assert_eq!(router.region_for(Some("org-eu")), "eu");
        assert_eq!(router.get_residency_report("org-eu").unwrap().region, "eu");
    }
}
