//! `connectorrt budget` — inspect the budget ledger's current decision for a scope.

use std::path::Path;

use connectorrt_budget::BudgetLedger;

use super::load_config;

pub async fn status(
    config_path: &Path,
    organization_id: Option<&str>,
    user_id: Option<&str>,
    workflow_id: Option<&str>,
    estimate_usd: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path);
    let ledger = BudgetLedger::new(config.budgets.clone());
    let decision = ledger.check_budget(estimate_usd, organization_id, user_id, workflow_id);

    println!("{}", serde_json::to_string_pretty(&decision)?);

    if !decision.allowed {
        std::process::exit(1);
    }
    Ok(())
}
