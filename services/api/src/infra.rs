use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use product_compliance::config::NotificationConfig;
use product_compliance::workflows::compliance::{
    AuditEntry, AuditError, AuditLog, ChecklistStatus, ComplianceStatus, ComplianceType,
    ComplianceTypeId, ComplianceTypeRepository, DirectoryError, DirectoryUser, MailError,
    MailGateway, OutboundMail, Product, ProductComplianceService, ProductId, ProductRepository,
    RecipientDirectory, RepositoryError, SettingsError, SettingsStore, TransitionNotifier,
    COMPLIANCE_NOTIFICATION_GROUP,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Categories every fresh installation starts with.
pub(crate) const DEFAULT_COMPLIANCE_TYPES: [(&str, &str); 3] = [
    ("type-test-reports", "Test Reports"),
    ("type-labeling", "Labeling"),
    ("type-tracking-on-item", "Tracking on Item"),
];

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ComplianceService =
    ProductComplianceService<InMemoryProductRepository, InMemoryComplianceTypeRepository>;

#[derive(Default, Clone)]
pub(crate) struct InMemoryProductRepository {
    records: Arc<Mutex<HashMap<ProductId, Product>>>,
}

impl ProductRepository for InMemoryProductRepository {
    fn insert(&self, product: Product) -> Result<Product, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&product.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(product.id.clone(), product.clone());
        Ok(product)
    }

    fn update(&self, product: Product) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&product.id) {
            guard.insert(product.id.clone(), product);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn record_status(
        &self,
        id: &ProductId,
        status: ComplianceStatus,
        previous: Option<ComplianceStatus>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let product = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        product.compliance_status = status;
        product.previous_compliance_status = previous;
        Ok(())
    }

    fn delete(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn recompute_candidates(&self) -> Result<Vec<Product>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut candidates: Vec<Product> = guard
            .values()
            .filter(|product| product.is_recompute_candidate())
            .cloned()
            .collect();
        candidates.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(candidates)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryComplianceTypeRepository {
    records: Arc<Mutex<BTreeMap<ComplianceTypeId, ComplianceType>>>,
}

impl InMemoryComplianceTypeRepository {
    pub(crate) fn seeded() -> Self {
        let repository = Self::default();
        {
            let mut guard = repository.records.lock().expect("type mutex poisoned");
            for (id, name) in DEFAULT_COMPLIANCE_TYPES {
                let id = ComplianceTypeId(id.to_string());
                guard.insert(
                    id.clone(),
                    ComplianceType {
                        id,
                        name: name.to_string(),
                        active: true,
                    },
                );
            }
        }
        repository
    }
}

impl ComplianceTypeRepository for InMemoryComplianceTypeRepository {
    fn insert(&self, compliance_type: ComplianceType) -> Result<ComplianceType, RepositoryError> {
        let mut guard = self.records.lock().expect("type mutex poisoned");
        if guard
            .values()
            .any(|existing| existing.name == compliance_type.name)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(compliance_type.id.clone(), compliance_type.clone());
        Ok(compliance_type)
    }

    fn update(&self, compliance_type: ComplianceType) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("type mutex poisoned");
        if guard.values().any(|existing| {
            existing.id != compliance_type.id && existing.name == compliance_type.name
        }) {
            return Err(RepositoryError::Conflict);
        }
        match guard.get_mut(&compliance_type.id) {
            Some(slot) => {
                *slot = compliance_type;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ComplianceTypeId) -> Result<Option<ComplianceType>, RepositoryError> {
        let guard = self.records.lock().expect("type mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self, include_inactive: bool) -> Result<Vec<ComplianceType>, RepositoryError> {
        let guard = self.records.lock().expect("type mutex poisoned");
        let mut types: Vec<ComplianceType> = guard
            .values()
            .filter(|compliance_type| include_inactive || compliance_type.active)
            .cloned()
            .collect();
        types.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(types)
    }
}

#[derive(Default)]
pub(crate) struct InMemorySettings {
    notification_emails: Mutex<Option<String>>,
}

impl InMemorySettings {
    pub(crate) fn new(notification_emails: Option<String>) -> Self {
        Self {
            notification_emails: Mutex::new(notification_emails),
        }
    }
}

impl SettingsStore for InMemorySettings {
    fn notification_emails(&self) -> Option<String> {
        self.notification_emails
            .lock()
            .expect("settings mutex poisoned")
            .clone()
    }

    fn set_notification_emails(&self, value: Option<String>) -> Result<(), SettingsError> {
        *self
            .notification_emails
            .lock()
            .expect("settings mutex poisoned") = value;
        Ok(())
    }
}

/// Group membership held in memory; groups that were never registered are unknown.
#[derive(Default)]
pub(crate) struct InMemoryDirectory {
    groups: Mutex<HashMap<String, Vec<DirectoryUser>>>,
}

impl InMemoryDirectory {
    pub(crate) fn with_notification_group() -> Self {
        let directory = Self::default();
        directory
            .groups
            .lock()
            .expect("directory mutex poisoned")
            .insert(COMPLIANCE_NOTIFICATION_GROUP.to_string(), Vec::new());
        directory
    }

    pub(crate) fn add_member(&self, group: &str, login: &str, email: Option<&str>) {
        self.groups
            .lock()
            .expect("directory mutex poisoned")
            .entry(group.to_string())
            .or_default()
            .push(DirectoryUser {
                login: login.to_string(),
                email: email.map(str::to_string),
            });
    }
}

impl RecipientDirectory for InMemoryDirectory {
    fn group_members(&self, group: &str) -> Result<Vec<DirectoryUser>, DirectoryError> {
        self.groups
            .lock()
            .expect("directory mutex poisoned")
            .get(group)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownGroup(group.to_string()))
    }
}

/// Mail gateway without templates that logs and keeps every message it is handed.
#[derive(Default)]
pub(crate) struct LoggingMailGateway {
    outbox: Mutex<Vec<OutboundMail>>,
}

impl LoggingMailGateway {
    pub(crate) fn outbox(&self) -> Vec<OutboundMail> {
        self.outbox.lock().expect("mail mutex poisoned").clone()
    }
}

impl MailGateway for LoggingMailGateway {
    fn has_template(&self, _template: &str) -> bool {
        false
    }

    fn send_template(
        &self,
        template: &str,
        _product_id: &ProductId,
        _email_to: &str,
    ) -> Result<(), MailError> {
        Err(MailError::TemplateMissing(template.to_string()))
    }

    fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        info!(email_to = %mail.email_to, subject = %mail.subject, "compliance mail queued");
        self.outbox.lock().expect("mail mutex poisoned").push(mail);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub(crate) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

/// Collaborators behind one service instance, kept so callers can inspect what was sent.
pub(crate) struct ComplianceStack {
    pub(crate) service: Arc<ComplianceService>,
    pub(crate) directory: Arc<InMemoryDirectory>,
    pub(crate) mail: Arc<LoggingMailGateway>,
    pub(crate) audit: Arc<InMemoryAuditLog>,
}

pub(crate) fn build_compliance_stack(config: &NotificationConfig) -> ComplianceStack {
    let directory = Arc::new(InMemoryDirectory::with_notification_group());
    let mail = Arc::new(LoggingMailGateway::default());
    let audit = Arc::new(InMemoryAuditLog::default());

    let notifier = TransitionNotifier::new(
        Arc::new(InMemorySettings::new(config.notification_emails.clone())),
        directory.clone(),
        mail.clone(),
        audit.clone(),
    )
    .with_mail_from(config.mail_from.clone());

    let service = Arc::new(ProductComplianceService::new(
        Arc::new(InMemoryProductRepository::default()),
        Arc::new(InMemoryComplianceTypeRepository::seeded()),
        Arc::new(notifier),
    ));

    ComplianceStack {
        service,
        directory,
        mail,
        audit,
    }
}

pub(crate) fn default_type_id(name: &str) -> Option<ComplianceTypeId> {
    DEFAULT_COMPLIANCE_TYPES
        .iter()
        .find(|(_, type_name)| type_name.eq_ignore_ascii_case(name))
        .map(|(id, _)| ComplianceTypeId(id.to_string()))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_checklist_status(raw: &str) -> Result<ChecklistStatus, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Ok(ChecklistStatus::Yes),
        "no" | "n" => Ok(ChecklistStatus::No),
        "na" | "n/a" => Ok(ChecklistStatus::Na),
        other => Err(format!("expected yes, no or na, found '{other}'")),
    }
}
