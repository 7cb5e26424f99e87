//! Product compliance checklist evaluation.
//!
//! Checklist lines and the test/tracking dates of a product feed a single decision table that
//! yields one of four statuses. Every evaluation compares the new status with the one stored
//! before it and raises a best-effort alert when an approved product drops to not approved.
//! A parameterless sweep re-runs the evaluation for every product with a checklist and both
//! dates so schedulers can keep stored statuses current.

pub mod domain;
pub mod evaluation;
pub mod notifier;
pub mod recompute;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ChecklistLine, ChecklistLineId, ChecklistStatus, ComplianceStatus, ComplianceType,
    ComplianceTypeId, ComplianceTypeRef, Product, ProductId, StatusTransition,
};
pub use evaluation::{
    ChecklistSnapshot, ComplianceSignals, EvaluationOutcome, RequiredCategory, StatusEvaluator,
};
pub use notifier::{
    parse_address_list, DeliveryOutcome, NotificationReport, TransitionNotifier,
    COMPLIANCE_NOTIFICATION_GROUP, STATUS_CHANGE_TEMPLATE,
};
pub use recompute::{PeriodicReevaluator, RecomputeSummary};
pub use repository::{
    AuditEntry, AuditError, AuditLog, ComplianceTypeRepository, DirectoryError, DirectoryUser,
    MailError, MailGateway, MessageKind, OutboundMail, ProductRepository, RecipientDirectory,
    RepositoryError, SettingsError, SettingsStore,
};
pub use router::{compliance_router, ComplianceState};
pub use service::{
    ComplianceServiceError, ComplianceTypeUpdate, ComplianceUpdate, DateUpdate,
    EvaluationReport, LineDraft, LineUpdate, ProductComplianceService, ProductDraft,
};
