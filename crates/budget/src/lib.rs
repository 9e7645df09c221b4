//! # connectorrt-budget
//!
//! C10: per-organization LLM spend enforcement, an LRU+TTL response cache,
//! on-demand usage analytics, and the cancellable background sweeps that
//! keep both bounded.

pub mod analytics;
pub mod cache;
pub mod ledger;
pub mod sweep;

pub use analytics::{cost_by_day, top_models, top_providers, top_users, top_workflows, DailyCost, RankedCost};
pub use cache::ResponseCache;
pub use ledger::{BudgetDecision, BudgetLedger, BudgetStatus, NullOrganizationSink, OrganizationSink};
pub use sweep::{spawn_cache_sweep, spawn_retention_sweep};
