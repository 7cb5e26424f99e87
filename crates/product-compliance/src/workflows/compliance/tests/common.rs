use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::compliance::domain::{
    ChecklistLine, ChecklistLineId, ChecklistStatus, ComplianceStatus, ComplianceType,
    ComplianceTypeId, ComplianceTypeRef, Product, ProductId,
};
use crate::workflows::compliance::notifier::TransitionNotifier;
use crate::workflows::compliance::repository::{
    AuditEntry, AuditError, AuditLog, ComplianceTypeRepository, DirectoryError, DirectoryUser,
    MailError, MailGateway, OutboundMail, ProductRepository, RecipientDirectory,
    RepositoryError, SettingsError, SettingsStore,
};
use crate::workflows::compliance::service::{LineDraft, ProductComplianceService, ProductDraft};
use crate::workflows::compliance::COMPLIANCE_NOTIFICATION_GROUP;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn line(category: &str, status: ChecklistStatus) -> ChecklistLine {
    ChecklistLine {
        id: ChecklistLineId(format!("line-{}", category.to_lowercase().replace(' ', "-"))),
        compliance_type: ComplianceTypeRef {
            id: ComplianceTypeId(format!("type-{}", category.to_lowercase().replace(' ', "-"))),
            name: category.to_string(),
        },
        status,
        notes: None,
    }
}

pub(super) fn product_with(
    lines: Vec<ChecklistLine>,
    test_date: Option<NaiveDate>,
    tracking_date: Option<NaiveDate>,
) -> Product {
    let mut product = Product::new(ProductId("prod-fixture".to_string()), "Kettle KX-200");
    product.default_code = Some("KX-200".to_string());
    product.compliance_lines = lines;
    product.test_date = test_date;
    product.tracking_date = tracking_date;
    product
}

pub(super) fn checklist(
    test_reports: ChecklistStatus,
    labeling: ChecklistStatus,
    tracking_on_item: ChecklistStatus,
) -> Vec<ChecklistLine> {
    vec![
        line("Test Reports", test_reports),
        line("Labeling", labeling),
        line("Tracking on Item", tracking_on_item),
    ]
}

type PendingEdit = Box<dyn FnOnce(&mut Product) + Send>;

#[derive(Default, Clone)]
pub(super) struct MemoryProducts {
    pub(super) records: Arc<Mutex<HashMap<ProductId, Product>>>,
    writes_rejected: Arc<AtomicBool>,
    edit_after_fetch: Arc<Mutex<Option<(ProductId, PendingEdit)>>>,
}

impl ProductRepository for MemoryProducts {
    fn insert(&self, product: Product) -> Result<Product, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&product.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(product.id.clone(), product.clone());
        Ok(product)
    }

    fn update(&self, product: Product) -> Result<(), RepositoryError> {
        self.check_writable()?;
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(product.id.clone(), product);
        Ok(())
    }

    fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let found = guard.get(id).cloned();

        let mut pending = self.edit_after_fetch.lock().expect("edit mutex poisoned");
        if pending.as_ref().is_some_and(|(target, _)| target == id) {
            if let (Some((_, edit)), Some(stored)) = (pending.take(), guard.get_mut(id)) {
                edit(stored);
            }
        }

        Ok(found)
    }

    fn record_status(
        &self,
        id: &ProductId,
        status: ComplianceStatus,
        previous: Option<ComplianceStatus>,
    ) -> Result<(), RepositoryError> {
        self.check_writable()?;
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let product = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        product.compliance_status = status;
        product.previous_compliance_status = previous;
        Ok(())
    }

    fn delete(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
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

impl MemoryProducts {
    /// Make `update` and `record_status` fail until switched back.
    pub(super) fn reject_writes(&self, reject: bool) {
        self.writes_rejected.store(reject, Ordering::SeqCst);
    }

    /// Apply `edit` to the stored record right after the next read of `id`, as a concurrent
    /// writer would.
    pub(super) fn edit_after_next_fetch<F>(&self, id: &ProductId, edit: F)
    where
        F: FnOnce(&mut Product) + Send + 'static,
    {
        *self.edit_after_fetch.lock().expect("edit mutex poisoned") =
            Some((id.clone(), Box::new(edit)));
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.writes_rejected.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("write rejected".to_string()));
        }
        Ok(())
    }

    /// Overwrite stored fields directly, bypassing evaluation.
    pub(super) fn tamper<F>(&self, id: &ProductId, apply: F)
    where
        F: FnOnce(&mut Product),
    {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let product = guard.get_mut(id).expect("product stored");
        apply(product);
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryTypes {
    records: Arc<Mutex<BTreeMap<ComplianceTypeId, ComplianceType>>>,
}

impl ComplianceTypeRepository for MemoryTypes {
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
        if guard
            .values()
            .any(|existing| existing.id != compliance_type.id && existing.name == compliance_type.name)
        {
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

pub(super) struct UnavailableProducts;

impl ProductRepository for UnavailableProducts {
    fn insert(&self, _product: Product) -> Result<Product, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _product: Product) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_status(
        &self,
        _id: &ProductId,
        _status: ComplianceStatus,
        _previous: Option<ComplianceStatus>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ProductId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn recompute_candidates(&self) -> Result<Vec<Product>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemorySettings {
    value: Mutex<Option<String>>,
}

impl MemorySettings {
    pub(super) fn with(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn notification_emails(&self) -> Option<String> {
        self.value.lock().expect("settings mutex poisoned").clone()
    }

    fn set_notification_emails(&self, value: Option<String>) -> Result<(), SettingsError> {
        *self.value.lock().expect("settings mutex poisoned") = value;
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    groups: HashMap<String, Vec<DirectoryUser>>,
}

impl MemoryDirectory {
    pub(super) fn with_members(members: &[(&str, Option<&str>)]) -> Self {
        let users = members
            .iter()
            .map(|(login, email)| DirectoryUser {
                login: login.to_string(),
                email: email.map(str::to_string),
            })
            .collect();
        let mut groups = HashMap::new();
        groups.insert(COMPLIANCE_NOTIFICATION_GROUP.to_string(), users);
        Self { groups }
    }
}

impl RecipientDirectory for MemoryDirectory {
    fn group_members(&self, group: &str) -> Result<Vec<DirectoryUser>, DirectoryError> {
        self.groups
            .get(group)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownGroup(group.to_string()))
    }
}

pub(super) struct OfflineDirectory;

impl RecipientDirectory for OfflineDirectory {
    fn group_members(&self, _group: &str) -> Result<Vec<DirectoryUser>, DirectoryError> {
        Err(DirectoryError::Unavailable("ldap timeout".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SentMail {
    Template {
        template: String,
        product_id: ProductId,
        email_to: String,
    },
    Inline(OutboundMail),
}

#[derive(Default)]
pub(super) struct RecordingMail {
    templates: Vec<String>,
    fail_transport: bool,
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMail {
    pub(super) fn with_template(template: &str) -> Self {
        Self {
            templates: vec![template.to_string()],
            ..Self::default()
        }
    }

    pub(super) fn failing() -> Self {
        Self {
            fail_transport: true,
            ..Self::default()
        }
    }

    pub(super) fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mail mutex poisoned").clone()
    }
}

impl MailGateway for RecordingMail {
    fn has_template(&self, template: &str) -> bool {
        self.templates.iter().any(|known| known == template)
    }

    fn send_template(
        &self,
        template: &str,
        product_id: &ProductId,
        email_to: &str,
    ) -> Result<(), MailError> {
        if self.fail_transport {
            return Err(MailError::Transport("smtp refused".to_string()));
        }
        self.sent
            .lock()
            .expect("mail mutex poisoned")
            .push(SentMail::Template {
                template: template.to_string(),
                product_id: product_id.clone(),
                email_to: email_to.to_string(),
            });
        Ok(())
    }

    fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        if self.fail_transport {
            return Err(MailError::Transport("smtp refused".to_string()));
        }
        self.sent
            .lock()
            .expect("mail mutex poisoned")
            .push(SentMail::Inline(mail));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    fail: bool,
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for RecordingAudit {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Unavailable("history table locked".to_string()));
        }
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

/// Category ids created by `build_harness`.
pub(super) struct Categories {
    pub(super) test_reports: ComplianceTypeId,
    pub(super) labeling: ComplianceTypeId,
    pub(super) tracking_on_item: ComplianceTypeId,
    pub(super) packaging: ComplianceTypeId,
}

pub(super) struct Harness {
    pub(super) service: Arc<ProductComplianceService<MemoryProducts, MemoryTypes>>,
    pub(super) products: Arc<MemoryProducts>,
    pub(super) mail: Arc<RecordingMail>,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) categories: Categories,
}

pub(super) fn notifier(
    settings: MemorySettings,
    directory: impl RecipientDirectory + 'static,
    mail: Arc<RecordingMail>,
    audit: Arc<RecordingAudit>,
) -> TransitionNotifier {
    TransitionNotifier::new(Arc::new(settings), Arc::new(directory), mail, audit)
}

pub(super) fn build_harness() -> Harness {
    build_harness_with(RecordingMail::default())
}

pub(super) fn build_harness_with(mail: RecordingMail) -> Harness {
    let products = Arc::new(MemoryProducts::default());
    let types = Arc::new(MemoryTypes::default());
    let mail = Arc::new(mail);
    let audit = Arc::new(RecordingAudit::default());
    let notifier = notifier(
        MemorySettings::with("qa@example.com"),
        MemoryDirectory::with_members(&[("compliance.lead", Some("lead@example.com"))]),
        mail.clone(),
        audit.clone(),
    )
    .with_mail_from(Some("noreply@example.com".to_string()));

    let service = Arc::new(ProductComplianceService::new(
        products.clone(),
        types,
        Arc::new(notifier),
    ));

    let categories = Categories {
        test_reports: service
            .create_compliance_type("Test Reports")
            .expect("type created")
            .id,
        labeling: service
            .create_compliance_type("Labeling")
            .expect("type created")
            .id,
        tracking_on_item: service
            .create_compliance_type("Tracking on Item")
            .expect("type created")
            .id,
        packaging: service
            .create_compliance_type("Packaging")
            .expect("type created")
            .id,
    };

    Harness {
        service,
        products,
        mail,
        audit,
        categories,
    }
}

pub(super) fn line_draft(type_id: &ComplianceTypeId, status: ChecklistStatus) -> LineDraft {
    LineDraft {
        compliance_type_id: type_id.clone(),
        status,
        notes: None,
    }
}

/// Fully compliant draft: yes/yes/na with tracking one year after testing.
pub(super) fn approved_draft(categories: &Categories) -> ProductDraft {
    ProductDraft {
        name: "Kettle KX-200".to_string(),
        default_code: Some("KX-200".to_string()),
        test_date: Some(date(2024, 1, 15)),
        tracking_date: Some(date(2025, 1, 15)),
        compliance_note: Some("Lab report #8812".to_string()),
        lines: vec![
            line_draft(&categories.test_reports, ChecklistStatus::Yes),
            line_draft(&categories.labeling, ChecklistStatus::Yes),
            line_draft(&categories.tracking_on_item, ChecklistStatus::Na),
        ],
    }
}

pub(super) fn line_id_for(product: &Product, type_id: &ComplianceTypeId) -> ChecklistLineId {
    product
        .compliance_lines
        .iter()
        .find(|line| &line.compliance_type.id == type_id)
        .map(|line| line.id.clone())
        .expect("line for category")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
