mod policy;
mod rules;
mod snapshot;

pub use rules::{tracking_window, ComplianceSignals, TRACKING_WINDOW_MONTHS};
pub use snapshot::{ChecklistSnapshot, RequiredCategory};

use chrono::NaiveDate;
use policy::decide_status;
use serde::{Deserialize, Serialize};

use super::domain::{ComplianceStatus, Product};

/// Stateless evaluator deriving a product's compliance status.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusEvaluator;

impl StatusEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, product: &Product) -> EvaluationOutcome {
        let snapshot = ChecklistSnapshot::from_lines(&product.compliance_lines);
        self.evaluate_snapshot(snapshot, product.test_date, product.tracking_date)
    }

    /// `None` stands for an empty checklist, which short-circuits to `no_compliance`.
    pub fn evaluate_snapshot(
        &self,
        snapshot: Option<ChecklistSnapshot>,
        test_date: Option<NaiveDate>,
        tracking_date: Option<NaiveDate>,
    ) -> EvaluationOutcome {
        let Some(snapshot) = snapshot else {
            return EvaluationOutcome {
                status: ComplianceStatus::NoCompliance,
                snapshot: None,
                signals: None,
            };
        };

        let signals = rules::collect_signals(&snapshot, test_date, tracking_date);
        EvaluationOutcome {
            status: decide_status(&signals),
            snapshot: Some(snapshot),
            signals: Some(signals),
        }
    }
}

/// Evaluation output with the decision trail kept for logs and API views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub status: ComplianceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ChecklistSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<ComplianceSignals>,
}
