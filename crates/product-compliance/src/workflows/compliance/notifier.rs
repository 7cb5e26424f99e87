use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{Product, ProductId};
use super::repository::{
    AuditEntry, AuditLog, DirectoryError, MailError, MailGateway, MessageKind, OutboundMail,
    RecipientDirectory, SettingsStore,
};

/// Authorization group whose members receive degrade alerts.
pub const COMPLIANCE_NOTIFICATION_GROUP: &str = "compliance_notification";
/// Template preferred over the inline message when the gateway knows it.
pub const STATUS_CHANGE_TEMPLATE: &str = "compliance_status_change";

const AUDIT_SUBJECT: &str = "Compliance Status Alert";
const AUDIT_BODY: &str = "Compliance status changed from <b>Approved</b> to <b>Not Approved</b>.";
const PLACEHOLDER: &str = "N/A";

/// How the alert e-mail left the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DeliveryOutcome {
    Template,
    Inline,
    NoRecipients,
    Failed { reason: String },
}

/// Record of a single notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub product_id: ProductId,
    pub recipients: Vec<String>,
    pub delivery: DeliveryOutcome,
    pub audit_recorded: bool,
}

/// Best-effort dispatcher for approved -> not approved transitions.
///
/// Nothing in here returns an error; every collaborator failure is logged and absorbed.
pub struct TransitionNotifier {
    settings: Arc<dyn SettingsStore>,
    directory: Arc<dyn RecipientDirectory>,
    mail: Arc<dyn MailGateway>,
    audit: Arc<dyn AuditLog>,
    mail_from: Option<String>,
}

impl TransitionNotifier {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        directory: Arc<dyn RecipientDirectory>,
        mail: Arc<dyn MailGateway>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            settings,
            directory,
            mail,
            audit,
            mail_from: None,
        }
    }

    pub fn with_mail_from(mut self, mail_from: Option<String>) -> Self {
        self.mail_from = mail_from;
        self
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    /// Settings addresses first, then group members not already listed (exact-string dedup).
    pub fn collect_recipients(&self) -> Vec<String> {
        let mut recipients = self
            .settings
            .notification_emails()
            .map(|raw| parse_address_list(&raw))
            .unwrap_or_default();

        match self.directory.group_members(COMPLIANCE_NOTIFICATION_GROUP) {
            Ok(members) => {
                for email in members.into_iter().filter_map(|member| member.email) {
                    if !email.is_empty() && !recipients.contains(&email) {
                        recipients.push(email);
                    }
                }
            }
            Err(DirectoryError::UnknownGroup(group)) => {
                debug!(%group, "notification group not configured");
            }
            Err(err) => {
                warn!(error = %err, "could not resolve compliance notification group");
            }
        }

        recipients
    }

    pub fn notify(&self, product: &Product) -> NotificationReport {
        let recipients = self.collect_recipients();

        let delivery = if recipients.is_empty() {
            DeliveryOutcome::NoRecipients
        } else {
            let email_to = recipients.join(",");
            match self.deliver(product, &email_to) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(product_id = %product.id.0, error = %err, "compliance alert delivery failed");
                    DeliveryOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        };

        let audit_recorded = match self.audit.append(AuditEntry {
            product_id: product.id.clone(),
            subject: AUDIT_SUBJECT.to_string(),
            body: AUDIT_BODY.to_string(),
            kind: MessageKind::Notification,
        }) {
            Ok(()) => true,
            Err(err) => {
                warn!(product_id = %product.id.0, error = %err, "compliance audit entry dropped");
                false
            }
        };

        info!(
            product_id = %product.id.0,
            recipients = recipients.len(),
            ?delivery,
            "compliance status degraded to not approved"
        );

        NotificationReport {
            product_id: product.id.clone(),
            recipients,
            delivery,
            audit_recorded,
        }
    }

    fn deliver(&self, product: &Product, email_to: &str) -> Result<DeliveryOutcome, MailError> {
        if self.mail.has_template(STATUS_CHANGE_TEMPLATE) {
            self.mail
                .send_template(STATUS_CHANGE_TEMPLATE, &product.id, email_to)?;
            return Ok(DeliveryOutcome::Template);
        }

        self.mail
            .send(inline_message(product, email_to, self.mail_from.clone()))?;
        Ok(DeliveryOutcome::Inline)
    }
}

/// Split a comma separated address setting, trimming entries and dropping blanks.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn inline_message(
    product: &Product,
    email_to: &str,
    email_from: Option<String>,
) -> OutboundMail {
    let name = escape_html(&product.name);
    let reference = product
        .default_code
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    let body_html = format!(
        "<p>Hello,</p>\
         <p>The compliance status for the following product has changed from <b>Approved</b> to <b>Not Approved</b>:</p>\
         <ul>\
         <li><b>Product:</b> {name}</li>\
         <li><b>Internal Reference:</b> {reference}</li>\
         <li><b>Test Date:</b> {test_date}</li>\
         <li><b>Tracking Date:</b> {tracking_date}</li>\
         </ul>\
         <p>Please review the product compliance information.</p>",
        test_date = date_or_placeholder(product.test_date),
        tracking_date = date_or_placeholder(product.tracking_date),
    );

    OutboundMail {
        subject: format!(
            "Compliance Alert: {} - Status Changed to Not Approved",
            product.name
        ),
        body_html,
        email_to: email_to.to_string(),
        email_from,
    }
}

fn date_or_placeholder(date: Option<NaiveDate>) -> String {
    date.map(|value| value.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
