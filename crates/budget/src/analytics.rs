//! C10 analytics: on-demand aggregation of recorded usage, computed fresh
//! over a window rather than maintained incrementally.
//!
//! Grounded on the cost-summary aggregation idiom (group into a `HashMap`
//! keyed by the dimension of interest, accumulate cost/tokens/calls, then
//! sort by cost descending) generalized across the dimensions the spec
//! names: model, provider, user, workflow, and day.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use connectorrt_core::UsageRecord;

#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedCost {
    pub key: String,
    pub cost_usd: f64,
    pub tokens_used: u64,
    pub calls: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DailyCost {
    pub day: NaiveDate,
    pub cost_usd: f64,
}

fn rank_by<'a>(
    records: &'a [UsageRecord],
    start: DateTime<Utc>,
    key_of: impl Fn(&'a UsageRecord) -> Option<&'a str>,
    limit: usize,
) -> Vec<RankedCost> {
    let mut grouped: HashMap<String, (f64, u64, u64)> = HashMap::new();
    for record in records.iter().filter(|r| r.ts >= start) {
        let Some(key) = key_of(record) else { continue };
        let entry = grouped.entry(key.to_string()).or_insert((0.0, 0, 0));
        entry.0 += record.cost_usd;
        entry.1 += record.tokens_used as u64;
        entry.2 += 1;
    }

    let mut ranked: Vec<RankedCost> = grouped
        .into_iter()
        .map(|(key, (cost_usd, tokens_used, calls))| RankedCost { key, cost_usd, tokens_used, calls })
        .collect();
    ranked.sort_by(|a, b| b.cost_usd.partial_cmp(&a.cost_usd).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked
}

pub fn top_models(records: &[UsageRecord], start: DateTime<Utc>, limit: usize) -> Vec<RankedCost> {
    rank_by(records, start, |r| Some(r.model.as_str()), limit)
}

pub fn top_providers(records: &[UsageRecord], start: DateTime<Utc>, limit: usize) -> Vec<RankedCost> {
    rank_by(records, start, |r| Some(r.provider.as_str()), limit)
}

pub fn top_users(records: &[UsageRecord], start: DateTime<Utc>, limit: usize) -> Vec<RankedCost> {
    rank_by(records, start, |r| r.user_id.as_deref(), limit)
}

pub fn top_workflows(records: &[UsageRecord], start: DateTime<Utc>, limit: usize) -> Vec<RankedCost> {
    rank_by(records, start, |r| r.workflow_id.as_deref(), limit)
}

pub fn cost_by_day(records: &[UsageRecord], start: DateTime<Utc>) -> Vec<DailyCost> {
    let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for record in records.iter().filter(|r| r.ts >= start) {
        *by_day.entry(record.ts.date_naive()).or_insert(0.0) += record.cost_usd;
    }
    let mut days: Vec<DailyCost> = by_day.into_iter().map(|(day, cost_usd)| DailyCost { day, cost_usd }).collect();
    days.sort_by_key(|d| d.day);
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(provider: &str, model: &str, user: Option<&str>, workflow: Option<&str>, cost: f64, days_ago: i64) -> UsageRecord {
        UsageRecord {
            user_id: user.map(String::from),
            workflow_id: workflow.map(String::from),
            organization_id: Some("org-1".into()),
            provider: provider.into(),
            model: model.into(),
            tokens_used: 50,
            cost_usd: cost,
            execution_id: "exec".into(),
            node_id: Some("node".into()),
            ts: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn top_models_ranks_by_cost_descending() {
        let records = vec![
            record("openai", "gpt-4", None, None, 1.0, 0),
            record("openai", "gpt-3.5", None, None, 5.0, 0),
        ];
        let ranked = top_models(&records, Utc::now() - Duration::days(1), 5);
        assert_eq!(ranked[0].key, "gpt-3.5");
        assert_eq!(ranked[1].key, "gpt-4");
    }

    #[test]
    fn window_excludes_records_before_start() {
        let records = vec![record("openai", "gpt-4", None, None, 3.0, 40)];
        let ranked = top_models(&records, Utc::now() - Duration::days(1), 5);
        assert!(ranked.is_empty());
    }

    #[test]
    fn top_users_skips_records_without_a_user() {
        let records = vec![
            record("openai", "gpt-4", None, None, 2.0, 0),
            record("openai", "gpt-4", Some("u1"), None, 1.0, 0),
        ];
        let ranked = top_users(&records, Utc::now() - Duration::days(1), 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].key, "u1");
    }

    #[test]
    fn cost_by_day_buckets_and_sorts_chronologically() {
        let records = vec![
            record("openai", "gpt-4", None, None, 1.0, 2),
            record("openai", "gpt-4", None, None, 2.0, 0),
        ];
        let days = cost_by_day(&records, Utc::now() - Duration::days(5));
        assert_eq!(days.len(), 2);
        assert!(days[0].day < days[1].day);
    }
}
