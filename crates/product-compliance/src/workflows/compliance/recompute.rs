use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::ProductId;
use super::repository::{ComplianceTypeRepository, ProductRepository};
use super::service::{ComplianceServiceError, ProductComplianceService};

/// Totals for one sweep of the periodic re-evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub evaluated: usize,
    pub changed: usize,
    pub notified: Vec<ProductId>,
    pub failed: Vec<ProductId>,
}

/// Parameterless sweep re-deriving the status of every product with a checklist and both dates.
///
/// Each product is read again right before it is evaluated, checked against its own previous
/// status, and only its status pair is written back, so edits landing mid-sweep are kept and
/// one failed write does not stop the sweep.
pub struct PeriodicReevaluator<P, T> {
    service: Arc<ProductComplianceService<P, T>>,
}

impl<P, T> Clone for PeriodicReevaluator<P, T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<P, T> PeriodicReevaluator<P, T>
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    pub fn new(service: Arc<ProductComplianceService<P, T>>) -> Self {
        Self { service }
    }

    pub fn run(&self) -> Result<RecomputeSummary, ComplianceServiceError> {
        let candidates = self.service.products().recompute_candidates()?;
        let mut summary = RecomputeSummary::default();

        for candidate in candidates {
            let product_id = candidate.id;
            let mut product = match self.service.products().fetch(&product_id) {
                Ok(Some(product)) if product.is_recompute_candidate() => product,
                Ok(_) => continue,
                Err(err) => {
                    warn!(product_id = %product_id.0, error = %err, "failed to reload product for compliance re-evaluation");
                    summary.failed.push(product_id);
                    continue;
                }
            };

            let mut report = self.service.apply_evaluation(&mut product);
            summary.evaluated += 1;
            if report.transition.is_change() {
                summary.changed += 1;
            }

            if let Err(err) = self.service.products().record_status(
                &product_id,
                product.compliance_status,
                product.previous_compliance_status,
            ) {
                warn!(product_id = %product_id.0, error = %err, "failed to persist recomputed compliance status");
                summary.failed.push(product_id);
                continue;
            }

            self.service.dispatch_alert(&product, &mut report);
            if report.notification.is_some() {
                summary.notified.push(product_id);
            }
        }

        info!(
            evaluated = summary.evaluated,
            changed = summary.changed,
            notified = summary.notified.len(),
            failed = summary.failed.len(),
            "compliance re-evaluation finished"
        );

        Ok(summary)
    }
}
