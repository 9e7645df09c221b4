//! C13: the thin facade a planner calls to ask a clarifying question of a
//! user. It is not an LLM client — the actual provider call is outside this
//! runtime's scope — it only gates that call against the budget ledger (C10)
//! and records the spend once the caller reports a question was asked.

use connectorrt_core::UsageRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use connectorrt_budget::BudgetLedger;

const DEFAULT_PER_CALL_COST_USD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText,
    Choice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifyQuestion {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClarifyResult {
    pub questions: Vec<ClarifyQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_reason: Option<String>,
}

/// A caller-supplied clarifying question, already formed (this runtime does
/// not generate question text itself — that is the planner's job upstream).
#[derive(Debug, Clone)]
pub struct ClarifyRequest {
    pub prompt: String,
    pub questions: Vec<ClarifyQuestion>,
}

pub struct Clarifier {
    budget: Arc<BudgetLedger>,
    per_call_cost_usd: f64,
}

impl Clarifier {
    pub fn new(budget: Arc<BudgetLedger>) -> Self {
        Self { budget, per_call_cost_usd: DEFAULT_PER_CALL_COST_USD }
    }

    pub fn with_per_call_cost(budget: Arc<BudgetLedger>, per_call_cost_usd: f64) -> Self {
        Self { budget, per_call_cost_usd }
    }

    /// Gate `request` against the organization's budget before it is ever
    /// surfaced to a user. A denial short-circuits without recording any
    /// spend; an approval records exactly `per_call_cost_usd` against the
    /// organization/user/workflow windows.
    pub fn clarify(
        &self,
        request: ClarifyRequest,
        organization_id: Option<&str>,
        user_id: Option<&str>,
        workflow_id: Option<&str>,
        execution_id: &str,
    ) -> ClarifyResult {
        let decision = self.budget.check_budget(self.per_call_cost_usd, organization_id, user_id, workflow_id);
        if !decision.allowed {
            return ClarifyResult { questions: Vec::new(), denied_reason: decision.reason };
        }

        self.budget.record_usage(UsageRecord {
            user_id: user_id.map(str::to_string),
            workflow_id: workflow_id.map(str::to_string),
            organization_id: organization_id.map(str::to_string),
            provider: "clarifier".to_string(),
            model: "n/a".to_string(),
            tokens_used: 0,
            cost_usd: self.per_call_cost_usd,
            execution_id: execution_id.to_string(),
            node_id: None,
            ts: chrono::Utc::now(),
        });

        ClarifyResult { questions: request.questions, denied_reason: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectorrt_config::BudgetsConfig;

    fn question() -> ClarifyQuestion {
        ClarifyQuestion { id: "q1".into(), text: "Which channel?".into(), kind: QuestionKind::FreeText, choices: None }
    }

    #[test]
    fn denied_budget_short_circuits_without_recording_spend() {
        let config = BudgetsConfig { daily_usd: 0.0, ..Default::default() };
        let clarifier = Clarifier::new(Arc::new(BudgetLedger::new(config)));
        let result = clarifier.clarify(
            ClarifyRequest { prompt: "ambiguous".into(), questions: vec![question()] },
            Some("org-1"),
            None,
            None,
            "exec-1",
        );
        assert!(result.questions.is_empty());
        assert!(result.denied_reason.is_some());
    }

    #[test]
    fn approved_call_returns_the_questions_and_records_usage() {
        let config = BudgetsConfig::default();
        let clarifier = Clarifier::new(Arc::new(BudgetLedger::new(config)));
        let result = clarifier.clarify(
            ClarifyRequest { prompt: "ambiguous".into(), questions: vec![question()] },
            Some("org-1"),
            Some("user-1"),
            None,
            "exec-1",
        );
        assert_eq!(result.questions.len(), 1);
        assert!(result.denied_reason.is_none());
    }
}
