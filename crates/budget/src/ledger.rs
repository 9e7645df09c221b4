//! C10 budget half: per-organization running totals, the ordered
//! `check_budget` enforcement, and usage recording with alerting.
//!
//! Grounded on the running-totals-behind-an-`RwLock` idiom (daily/monthly
//! counters rolled over by comparing `Utc::now()`'s ordinal/month against a
//! stored value), generalized here to be per-organization and to add the
//! per-user and per-workflow windows the spec adds on top.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Datelike, Utc};
use connectorrt_config::BudgetsConfig;
use connectorrt_core::UsageRecord;

/// Why a `check_budget` call was denied, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Allowed,
    EmergencyStop,
    DailyCapExceeded,
    MonthlyCapExceeded,
    PerUserDailyExceeded,
    PerWorkflowExceeded,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BudgetDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub status: BudgetStatus,
}

impl BudgetDecision {
    fn allowed() -> Self {
        Self { allowed: true, reason: None, status: BudgetStatus::Allowed }
    }

    fn denied(status: BudgetStatus, reason: String) -> Self {
        Self { allowed: false, reason: Some(reason), status }
    }
}

/// Forwards usage records to an external organization/billing service.
/// The runtime never implements that service itself; this trait is the
/// seam where a caller plugs one in.
pub trait OrganizationSink: Send + Sync {
    fn forward(&self, record: &UsageRecord);
}

/// No-op sink used when no organization service is configured.
pub struct NullOrganizationSink;

impl OrganizationSink for NullOrganizationSink {
    fn forward(&self, record: &UsageRecord) {
        tracing::debug!(
            org = record.organization_id.as_deref().unwrap_or("-"),
            cost_usd = record.cost_usd,
            "no organization sink configured, dropping forwarded usage record"
        );
    }
}

#[derive(Debug, Default, Clone)]
struct OrgTotals {
    current_day: u32,
    daily_cost: f64,
    current_month: u32,
    monthly_cost: f64,
    total_cost: f64,
    per_user_day: HashMap<String, u32>,
    per_user_daily_cost: HashMap<String, f64>,
    per_workflow_cost: HashMap<String, f64>,
}

impl OrgTotals {
    fn roll_over(&mut self, now: DateTime<Utc>) {
        if now.ordinal() != self.current_day {
            self.current_day = now.ordinal();
            self.daily_cost = 0.0;
            self.per_user_day.clear();
            self.per_user_daily_cost.clear();
        }
        if now.month() != self.current_month {
            self.current_month = now.month();
            self.monthly_cost = 0.0;
        }
    }

    fn user_daily_cost(&mut self, user_id: &str, now: DateTime<Utc>) -> f64 {
        let day = *self.per_user_day.get(user_id).unwrap_or(&0);
        if day != now.ordinal() {
            self.per_user_day.insert(user_id.to_string(), now.ordinal());
            self.per_user_daily_cost.insert(user_id.to_string(), 0.0);
        }
        *self.per_user_daily_cost.get(user_id).unwrap_or(&0.0)
    }
}

pub struct BudgetLedger {
    config: BudgetsConfig,
    totals: RwLock<HashMap<String, OrgTotals>>,
    records: RwLock<Vec<UsageRecord>>,
    sink: Box<dyn OrganizationSink>,
}

const ORG_KEY_DEFAULT: &str = "-";

impl BudgetLedger {
    pub fn new(config: BudgetsConfig) -> Self {
        Self::with_sink(config, Box::new(NullOrganizationSink))
    }

    pub fn with_sink(config: BudgetsConfig, sink: Box<dyn OrganizationSink>) -> Self {
        Self {
            config,
            totals: RwLock::new(HashMap::new()),
            records: RwLock::new(Vec::new()),
            sink,
        }
    }

    fn org_key(organization_id: Option<&str>) -> String {
        organization_id.unwrap_or(ORG_KEY_DEFAULT).to_string()
    }

    /// Evaluate `estimate_usd` against every configured window, in the order
    /// documented on the component: emergency stop, daily cap, monthly cap,
    /// per-user daily, per-workflow.
    pub fn check_budget(
        &self,
        estimate_usd: f64,
        organization_id: Option<&str>,
        user_id: Option<&str>,
        workflow_id: Option<&str>,
    ) -> BudgetDecision {
        let now = Utc::now();
        let key = Self::org_key(organization_id);
        let mut totals = self.totals.write().unwrap();
        let org = totals.entry(key).or_default();
        org.roll_over(now);

        let projected_daily = org.daily_cost + estimate_usd;
        let projected_monthly = org.monthly_cost + estimate_usd;

        if self.config.daily_usd > 0.0 {
            let pct = projected_daily / self.config.daily_usd * 100.0;
            if pct >= self.config.emergency_stop_threshold_pct {
                return BudgetDecision::denied(
                    BudgetStatus::EmergencyStop,
                    format!(
                        "projected daily spend ${projected_daily:.4} reaches {pct:.1}% of the ${:.2} daily limit",
                        self.config.daily_usd
                    ),
                );
            }
        }
        if self.config.monthly_usd > 0.0 {
            let pct = projected_monthly / self.config.monthly_usd * 100.0;
            if pct >= self.config.emergency_stop_threshold_pct {
                return BudgetDecision::denied(
                    BudgetStatus::EmergencyStop,
                    format!(
                        "projected monthly spend ${projected_monthly:.4} reaches {pct:.1}% of the ${:.2} monthly limit",
                        self.config.monthly_usd
                    ),
                );
            }
        }

        if self.config.daily_usd > 0.0 && projected_daily > self.config.daily_usd {
            return BudgetDecision::denied(
                BudgetStatus::DailyCapExceeded,
                format!("projected daily spend ${projected_daily:.4} exceeds ${:.2} cap", self.config.daily_usd),
            );
        }
        if self.config.monthly_usd > 0.0 && projected_monthly > self.config.monthly_usd {
            return BudgetDecision::denied(
                BudgetStatus::MonthlyCapExceeded,
                format!("projected monthly spend ${projected_monthly:.4} exceeds ${:.2} cap", self.config.monthly_usd),
            );
        }

        if let Some(user_id) = user_id {
            if self.config.per_user_daily_usd > 0.0 {
                let current = org.user_daily_cost(user_id, now);
                let projected = current + estimate_usd;
                if projected > self.config.per_user_daily_usd {
                    return BudgetDecision::denied(
                        BudgetStatus::PerUserDailyExceeded,
                        format!(
                            "user {user_id} projected daily spend ${projected:.4} exceeds ${:.2} cap",
                            self.config.per_user_daily_usd
                        ),
                    );
                }
            }
        }

        if let Some(workflow_id) = workflow_id {
            if self.config.per_workflow_usd > 0.0 {
                let current = *org.per_workflow_cost.get(workflow_id).unwrap_or(&0.0);
                let projected = current + estimate_usd;
                if projected > self.config.per_workflow_usd {
                    return BudgetDecision::denied(
                        BudgetStatus::PerWorkflowExceeded,
                        format!(
                            "workflow {workflow_id} spend ${projected:.4} exceeds ${:.2} cap",
                            self.config.per_workflow_usd
                        ),
                    );
                }
            }
        }

        BudgetDecision::allowed()
    }

    /// Append `record`, update the per-organization running totals, forward
    /// to the configured organization sink, and warn when an alert
    /// threshold is crossed.
    pub fn record_usage(&self, record: UsageRecord) {
        let now = record.ts;
        let key = Self::org_key(record.organization_id.as_deref());

        {
            let mut totals = self.totals.write().unwrap();
            let org = totals.entry(key).or_default();
            org.roll_over(now);
            org.daily_cost += record.cost_usd;
            org.monthly_cost += record.cost_usd;
            org.total_cost += record.cost_usd;

            if let Some(user_id) = &record.user_id {
                let current = org.user_daily_cost(user_id, now);
                org.per_user_daily_cost.insert(user_id.clone(), current + record.cost_usd);
            }
            if let Some(workflow_id) = &record.workflow_id {
                *org.per_workflow_cost.entry(workflow_id.clone()).or_insert(0.0) += record.cost_usd;
            }

            self.maybe_alert(org);
        }

        self.sink.forward(&record);
        self.records.write().unwrap().push(record);
    }

    fn maybe_alert(&self, org: &OrgTotals) {
        if self.config.daily_usd > 0.0 {
            let pct = org.daily_cost / self.config.daily_usd * 100.0;
            if pct >= self.config.alert_threshold_pct {
                tracing::warn!(daily_cost = org.daily_cost, pct = pct, "daily budget alert threshold crossed");
            }
        }
        if self.config.monthly_usd > 0.0 {
            let pct = org.monthly_cost / self.config.monthly_usd * 100.0;
            if pct >= self.config.alert_threshold_pct {
                tracing::warn!(monthly_cost = org.monthly_cost, pct = pct, "monthly budget alert threshold crossed");
            }
        }
    }

    /// A snapshot of every recorded usage record, for analytics queries.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.read().unwrap().clone()
    }

    /// Drop records older than `cutoff`; returns how many were removed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.ts >= cutoff);
        before - records.len()
    }
}
