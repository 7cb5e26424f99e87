use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{
    ChecklistLine, ChecklistLineId, ChecklistStatus, ComplianceType, ComplianceTypeId,
    ComplianceTypeRef, Product, ProductId, StatusTransition,
};
use super::evaluation::{EvaluationOutcome, StatusEvaluator};
use super::notifier::{NotificationReport, TransitionNotifier};
use super::repository::{
    ComplianceTypeRepository, ProductRepository, RepositoryError, SettingsError,
};

static PRODUCT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LINE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TYPE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_product_id() -> ProductId {
    let id = PRODUCT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ProductId(format!("prod-{id:06}"))
}

fn next_line_id() -> ChecklistLineId {
    let id = LINE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ChecklistLineId(format!("line-{id:06}"))
}

fn next_type_id() -> ComplianceTypeId {
    let id = TYPE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ComplianceTypeId(format!("type-{id:06}"))
}

/// Inbound product payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub default_code: Option<String>,
    #[serde(default)]
    pub test_date: Option<NaiveDate>,
    #[serde(default)]
    pub tracking_date: Option<NaiveDate>,
    #[serde(default)]
    pub compliance_note: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineDraft>,
}

/// Inbound checklist line payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub compliance_type_id: ComplianceTypeId,
    #[serde(default)]
    pub status: ChecklistStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Replacement values for an existing checklist line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdate {
    pub status: ChecklistStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Both dates are written together; `None` clears a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateUpdate {
    #[serde(default)]
    pub test_date: Option<NaiveDate>,
    #[serde(default)]
    pub tracking_date: Option<NaiveDate>,
}

/// Partial update for a compliance category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceTypeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Trail of one evaluation: the decision plus the transition and any notification it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub product_id: ProductId,
    pub transition: StatusTransition,
    pub outcome: EvaluationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationReport>,
}

/// Product state after an edit, returned to callers of mutating operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceUpdate {
    pub product: Product,
    pub evaluation: EvaluationReport,
}

/// Service composing product storage, the status evaluator and the transition notifier.
pub struct ProductComplianceService<P, T> {
    products: Arc<P>,
    types: Arc<T>,
    evaluator: StatusEvaluator,
    notifier: Arc<TransitionNotifier>,
}

impl<P, T> ProductComplianceService<P, T>
where
    P: ProductRepository + 'static,
    T: ComplianceTypeRepository + 'static,
{
    pub fn new(products: Arc<P>, types: Arc<T>, notifier: Arc<TransitionNotifier>) -> Self {
        Self {
            products,
            types,
            evaluator: StatusEvaluator::new(),
            notifier,
        }
    }

    pub(crate) fn products(&self) -> &P {
        self.products.as_ref()
    }

    /// Derive the status and write both status fields on `product` without persisting it.
    ///
    /// Category names are read from the type repository so renamed types take effect. The
    /// degrade alert is left to `dispatch_alert`, once the caller has stored the result.
    pub fn apply_evaluation(&self, product: &mut Product) -> EvaluationReport {
        self.refresh_category_names(product);
        let outcome = self.evaluator.evaluate(product);
        let transition = product.status_transition(outcome.status);
        product.commit_status(outcome.status);

        if transition.is_change() {
            debug!(
                product_id = %product.id.0,
                from = transition.from.label(),
                to = transition.to.label(),
                "compliance status changed"
            );
        }

        EvaluationReport {
            product_id: product.id.clone(),
            transition,
            outcome,
            notification: None,
        }
    }

    /// Notify on approved to not approved. Call only after the evaluated status is stored.
    pub(crate) fn dispatch_alert(&self, product: &Product, report: &mut EvaluationReport) {
        if report.transition.is_degradation() {
            report.notification = Some(self.notifier.notify(product));
        }
    }

    pub fn create_product(
        &self,
        draft: ProductDraft,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        let mut product = Product::new(next_product_id(), draft.name);
        product.default_code = draft.default_code;
        product.test_date = draft.test_date;
        product.tracking_date = draft.tracking_date;
        product.compliance_note = draft.compliance_note;

        for line in draft.lines {
            let line = self.build_line(line)?;
            product.compliance_lines.push(line);
        }

        let mut evaluation = self.apply_evaluation(&mut product);
        let product = self.products.insert(product)?;
        self.dispatch_alert(&product, &mut evaluation);
        Ok(ComplianceUpdate {
            product,
            evaluation,
        })
    }

    pub fn get(&self, product_id: &ProductId) -> Result<Product, ComplianceServiceError> {
        let product = self
            .products
            .fetch(product_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(product)
    }

    pub fn delete_product(&self, product_id: &ProductId) -> Result<(), ComplianceServiceError> {
        self.products.delete(product_id)?;
        Ok(())
    }

    /// Copy a product without its checklist or previous status; the copy is evaluated afresh.
    pub fn duplicate_product(
        &self,
        product_id: &ProductId,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        let source = self.get(product_id)?;
        let mut copy = source.duplicate(next_product_id());
        let mut evaluation = self.apply_evaluation(&mut copy);
        let product = self.products.insert(copy)?;
        self.dispatch_alert(&product, &mut evaluation);
        Ok(ComplianceUpdate {
            product,
            evaluation,
        })
    }

    pub fn set_dates(
        &self,
        product_id: &ProductId,
        dates: DateUpdate,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        self.edit(product_id, |product| {
            product.test_date = dates.test_date;
            product.tracking_date = dates.tracking_date;
            Ok(())
        })
    }

    pub fn add_line(
        &self,
        product_id: &ProductId,
        draft: LineDraft,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        let line = self.build_line(draft)?;
        self.edit(product_id, move |product| {
            product.compliance_lines.push(line);
            Ok(())
        })
    }

    pub fn update_line(
        &self,
        product_id: &ProductId,
        line_id: &ChecklistLineId,
        update: LineUpdate,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        self.edit(product_id, |product| {
            let line = product
                .line_mut(line_id)
                .ok_or_else(|| ComplianceServiceError::UnknownLine(line_id.0.clone()))?;
            line.status = update.status;
            line.notes = update.notes;
            Ok(())
        })
    }

    pub fn remove_line(
        &self,
        product_id: &ProductId,
        line_id: &ChecklistLineId,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        self.edit(product_id, |product| {
            let before = product.compliance_lines.len();
            product.compliance_lines.retain(|line| &line.id != line_id);
            if product.compliance_lines.len() == before {
                return Err(ComplianceServiceError::UnknownLine(line_id.0.clone()));
            }
            Ok(())
        })
    }

    /// Re-run the evaluator for one product without changing any input.
    pub fn recompute(
        &self,
        product_id: &ProductId,
    ) -> Result<ComplianceUpdate, ComplianceServiceError> {
        self.edit(product_id, |_| Ok(()))
    }

    pub fn create_compliance_type(
        &self,
        name: &str,
    ) -> Result<ComplianceType, ComplianceServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ComplianceServiceError::InvalidComplianceTypeName);
        }

        let compliance_type = ComplianceType {
            id: next_type_id(),
            name: name.to_string(),
            active: true,
        };
        Ok(self.types.insert(compliance_type)?)
    }

    pub fn update_compliance_type(
        &self,
        type_id: &ComplianceTypeId,
        update: ComplianceTypeUpdate,
    ) -> Result<ComplianceType, ComplianceServiceError> {
        let mut compliance_type = self
            .types
            .fetch(type_id)?
            .ok_or_else(|| ComplianceServiceError::UnknownComplianceType(type_id.0.clone()))?;

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ComplianceServiceError::InvalidComplianceTypeName);
            }
            compliance_type.name = name.to_string();
        }
        if let Some(active) = update.active {
            compliance_type.active = active;
        }

        self.types.update(compliance_type.clone())?;
        Ok(compliance_type)
    }

    pub fn compliance_types(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<ComplianceType>, ComplianceServiceError> {
        Ok(self.types.list(include_inactive)?)
    }

    pub fn notification_emails(&self) -> Option<String> {
        self.notifier.settings().notification_emails()
    }

    pub fn set_notification_emails(
        &self,
        value: Option<String>,
    ) -> Result<(), ComplianceServiceError> {
        let value = value
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        self.notifier.settings().set_notification_emails(value)?;
        Ok(())
    }

    fn refresh_category_names(&self, product: &mut Product) {
        for line in product.compliance_lines.iter_mut() {
            match self.types.fetch(&line.compliance_type.id) {
                Ok(Some(current)) => line.compliance_type.name = current.name,
                Ok(None) => {}
                Err(err) => warn!(
                    product_id = %product.id.0,
                    type_id = %line.compliance_type.id.0,
                    error = %err,
                    "compliance type lookup failed, evaluating with the stored name"
                ),
            }
        }
    }

    fn build_line(&self, draft: LineDraft) -> Result<ChecklistLine, ComplianceServiceError> {
        let compliance_type = self
            .types
            .fetch(&draft.compliance_type_id)?
            .ok_or_else(|| {
                ComplianceServiceError::UnknownComplianceType(draft.compliance_type_id.0.clone())
            })?;

        if !compliance_type.active {
            return Err(ComplianceServiceError::InactiveComplianceType(
                compliance_type.name,
            ));
        }

        Ok(ChecklistLine {
            id: next_line_id(),
            compliance_type: ComplianceTypeRef::from(&compliance_type),
            status: draft.status,
            notes: draft.notes,
        })
    }

    fn edit<F>(
        &self,
        product_id: &ProductId,
        apply: F,
    ) -> Result<ComplianceUpdate, ComplianceServiceError>
    where
        F: FnOnce(&mut Product) -> Result<(), ComplianceServiceError>,
    {
        let mut product = self.get(product_id)?;
        apply(&mut product)?;
        let mut evaluation = self.apply_evaluation(&mut product);
        self.products.update(product.clone())?;
        self.dispatch_alert(&product, &mut evaluation);
        Ok(ComplianceUpdate {
            product,
            evaluation,
        })
    }
}

/// Error raised by the compliance service.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("checklist line {0} not found")]
    UnknownLine(String),
    #[error("compliance type {0} not found")]
    UnknownComplianceType(String),
    #[error("compliance type '{0}' is archived and cannot be added to a checklist")]
    InactiveComplianceType(String),
    #[error("compliance type name must not be empty")]
    InvalidComplianceTypeName,
}
