use serde::{Deserialize, Serialize};

use super::domain::{ComplianceStatus, ComplianceType, ComplianceTypeId, Product, ProductId};

/// Storage abstraction for products and their owned checklist lines.
pub trait ProductRepository: Send + Sync {
    fn insert(&self, product: Product) -> Result<Product, RepositoryError>;
    fn update(&self, product: Product) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    /// Writes only the two derived status fields, leaving lines, dates and notes as stored.
    fn record_status(
        &self,
        id: &ProductId,
        status: ComplianceStatus,
        previous: Option<ComplianceStatus>,
    ) -> Result<(), RepositoryError>;
    /// Removes the product together with its checklist lines.
    fn delete(&self, id: &ProductId) -> Result<(), RepositoryError>;
    /// Products with at least one checklist line and both dates set.
    fn recompute_candidates(&self) -> Result<Vec<Product>, RepositoryError>;
}

/// Storage abstraction for compliance categories.
///
/// Implementations reject a second category with the same name via `RepositoryError::Conflict`.
pub trait ComplianceTypeRepository: Send + Sync {
    fn insert(&self, compliance_type: ComplianceType) -> Result<ComplianceType, RepositoryError>;
    fn update(&self, compliance_type: ComplianceType) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ComplianceTypeId) -> Result<Option<ComplianceType>, RepositoryError>;
    /// Ordered by name.
    fn list(&self, include_inactive: bool) -> Result<Vec<ComplianceType>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Source of the comma separated notification address setting.
pub trait SettingsStore: Send + Sync {
    fn notification_emails(&self) -> Option<String>;
    fn set_notification_emails(&self, value: Option<String>) -> Result<(), SettingsError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Member of an authorization group as resolved by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub login: String,
    pub email: Option<String>,
}

/// Resolves authorization groups to their members.
pub trait RecipientDirectory: Send + Sync {
    fn group_members(&self, group: &str) -> Result<Vec<DirectoryUser>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Message synthesized inline when no template is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMail {
    pub subject: String,
    pub body_html: String,
    pub email_to: String,
    pub email_from: Option<String>,
}

/// Outbound mail hooks; either a named template rendered against a product or a raw message.
pub trait MailGateway: Send + Sync {
    fn has_template(&self, template: &str) -> bool;
    fn send_template(
        &self,
        template: &str,
        product_id: &ProductId,
        email_to: &str,
    ) -> Result<(), MailError>;
    fn send(&self, mail: OutboundMail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail template not found: {0}")]
    TemplateMissing(String),
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Kind of entry appended to a product's activity history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Notification,
}

/// Append-only history entry attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub product_id: ProductId,
    pub subject: String,
    pub body: String,
    pub kind: MessageKind,
}

pub trait AuditLog: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}
