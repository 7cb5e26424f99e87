use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for products carrying a compliance checklist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// Identifier wrapper for a single checklist line on a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChecklistLineId(pub String);

/// Identifier wrapper for a compliance category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComplianceTypeId(pub String);

/// Tri-state answer recorded against a checklist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Yes,
    #[default]
    No,
    Na,
}

impl ChecklistStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ChecklistStatus::Yes => "yes",
            ChecklistStatus::No => "no",
            ChecklistStatus::Na => "na",
        }
    }

    /// `yes` or `na`.
    pub const fn is_satisfied(self) -> bool {
        matches!(self, ChecklistStatus::Yes | ChecklistStatus::Na)
    }
}

/// Derived approval status persisted on the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Approved,
    Warning,
    NotApproved,
    #[default]
    NoCompliance,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ComplianceStatus::Approved => "approved",
            ComplianceStatus::Warning => "warning",
            ComplianceStatus::NotApproved => "not_approved",
            ComplianceStatus::NoCompliance => "no_compliance",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ComplianceStatus::Approved => "Approved",
            ComplianceStatus::Warning => "Warning",
            ComplianceStatus::NotApproved => "Not Approved",
            ComplianceStatus::NoCompliance => "No Compliance",
        }
    }
}

/// Named compliance category that checklist lines point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceType {
    pub id: ComplianceTypeId,
    pub name: String,
    pub active: bool,
}

/// Reference to a compliance category on a line. `name` is refreshed from the type store on
/// every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceTypeRef {
    pub id: ComplianceTypeId,
    pub name: String,
}

impl From<&ComplianceType> for ComplianceTypeRef {
    fn from(value: &ComplianceType) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
        }
    }
}

/// One compliance requirement answered for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistLine {
    pub id: ChecklistLineId,
    pub compliance_type: ComplianceTypeRef,
    #[serde(default)]
    pub status: ChecklistStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Product record extended with the compliance checklist and derived status fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub default_code: Option<String>,
    pub test_date: Option<NaiveDate>,
    pub tracking_date: Option<NaiveDate>,
    pub compliance_note: Option<String>,
    pub compliance_lines: Vec<ChecklistLine>,
    pub compliance_status: ComplianceStatus,
    pub previous_compliance_status: Option<ComplianceStatus>,
}

impl Product {
    /// Fresh product without a checklist; status fields are filled by the first evaluation.
    pub fn new(id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            default_code: None,
            test_date: None,
            tracking_date: None,
            compliance_note: None,
            compliance_lines: Vec::new(),
            compliance_status: ComplianceStatus::NoCompliance,
            previous_compliance_status: None,
        }
    }

    pub fn has_both_dates(&self) -> bool {
        self.test_date.is_some() && self.tracking_date.is_some()
    }

    /// Products the periodic re-evaluation sweeps over.
    pub fn is_recompute_candidate(&self) -> bool {
        !self.compliance_lines.is_empty() && self.has_both_dates()
    }

    pub fn line(&self, id: &ChecklistLineId) -> Option<&ChecklistLine> {
        self.compliance_lines.iter().find(|line| &line.id == id)
    }

    pub fn line_mut(&mut self, id: &ChecklistLineId) -> Option<&mut ChecklistLine> {
        self.compliance_lines.iter_mut().find(|line| &line.id == id)
    }

    /// Compare a freshly derived status against the stored one without writing anything.
    ///
    /// The previous status wins when present; a product that has never been evaluated
    /// falls back to its current status.
    pub fn status_transition(&self, derived: ComplianceStatus) -> StatusTransition {
        StatusTransition {
            from: self
                .previous_compliance_status
                .unwrap_or(self.compliance_status),
            to: derived,
        }
    }

    pub fn commit_status(&mut self, derived: ComplianceStatus) {
        self.compliance_status = derived;
        self.previous_compliance_status = Some(derived);
    }

    /// Copy used by product duplication: no checklist lines, no previous status.
    pub fn duplicate(&self, id: ProductId) -> Self {
        Self {
            id,
            name: format!("{} (copy)", self.name),
            default_code: self.default_code.clone(),
            test_date: self.test_date,
            tracking_date: self.tracking_date,
            compliance_note: self.compliance_note.clone(),
            compliance_lines: Vec::new(),
            compliance_status: ComplianceStatus::NoCompliance,
            previous_compliance_status: None,
        }
    }
}

/// Old and new status observed during a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ComplianceStatus,
    pub to: ComplianceStatus,
}

impl StatusTransition {
    /// The only edge that triggers notifications.
    pub fn is_degradation(&self) -> bool {
        self.from == ComplianceStatus::Approved && self.to == ComplianceStatus::NotApproved
    }

    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}
