use serde::{Deserialize, Serialize};

use super::super::domain::{ChecklistLine, ChecklistStatus};

/// The three checklist categories that drive the approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredCategory {
    TestReports,
    Labeling,
    TrackingOnItem,
}

impl RequiredCategory {
    pub const ALL: [RequiredCategory; 3] = [
        RequiredCategory::TestReports,
        RequiredCategory::Labeling,
        RequiredCategory::TrackingOnItem,
    ];

    pub const fn canonical_name(self) -> &'static str {
        match self {
            RequiredCategory::TestReports => "test reports",
            RequiredCategory::Labeling => "labeling",
            RequiredCategory::TrackingOnItem => "tracking on item",
        }
    }

    /// Case-insensitive, otherwise exact: surrounding whitespace is not ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.canonical_name() == lowered)
    }
}

/// Decision input: one status per required category, `no` when the product has no line for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecklistSnapshot {
    pub test_reports: ChecklistStatus,
    pub labeling: ChecklistStatus,
    pub tracking_on_item: ChecklistStatus,
}

impl ChecklistSnapshot {
    /// Returns `None` for an empty checklist. Lines are scanned in order and the last line
    /// of a category wins; lines outside the required categories are skipped.
    pub fn from_lines(lines: &[ChecklistLine]) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }

        let mut snapshot = Self::default();
        for line in lines {
            if let Some(category) = RequiredCategory::from_name(&line.compliance_type.name) {
                snapshot.set(category, line.status);
            }
        }
        Some(snapshot)
    }

    pub fn get(&self, category: RequiredCategory) -> ChecklistStatus {
        match category {
            RequiredCategory::TestReports => self.test_reports,
            RequiredCategory::Labeling => self.labeling,
            RequiredCategory::TrackingOnItem => self.tracking_on_item,
        }
    }

    pub fn set(&mut self, category: RequiredCategory, status: ChecklistStatus) {
        match category {
            RequiredCategory::TestReports => self.test_reports = status,
            RequiredCategory::Labeling => self.labeling = status,
            RequiredCategory::TrackingOnItem => self.tracking_on_item = status,
        }
    }
}
