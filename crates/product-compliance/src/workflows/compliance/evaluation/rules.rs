use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::super::domain::ChecklistStatus;
use super::snapshot::ChecklistSnapshot;

/// Width of the tracking window on either side of the test date.
pub const TRACKING_WINDOW_MONTHS: u32 = 12;

/// Boolean predicates feeding the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSignals {
    pub tracking_ok: bool,
    pub tracking_date_filled: bool,
    pub all_fields_ok: bool,
    pub both_dates_filled: bool,
    pub date_range_valid: bool,
}

pub(crate) fn collect_signals(
    snapshot: &ChecklistSnapshot,
    test_date: Option<NaiveDate>,
    tracking_date: Option<NaiveDate>,
) -> ComplianceSignals {
    let tracking_ok = snapshot.tracking_on_item.is_satisfied();
    let all_fields_ok = snapshot.test_reports == ChecklistStatus::Yes
        && snapshot.labeling.is_satisfied()
        && tracking_ok;

    let date_range_valid = match (test_date, tracking_date) {
        (Some(test_date), Some(tracking_date)) => {
            tracking_window(test_date).contains(&tracking_date)
        }
        _ => false,
    };

    ComplianceSignals {
        tracking_ok,
        tracking_date_filled: tracking_date.is_some(),
        all_fields_ok,
        both_dates_filled: test_date.is_some() && tracking_date.is_some(),
        date_range_valid,
    }
}

/// Inclusive calendar-month window around `test_date`.
///
/// chrono clamps the day to the end of shorter months, so 2024-02-29 maps to 2025-02-28.
pub fn tracking_window(test_date: NaiveDate) -> std::ops::RangeInclusive<NaiveDate> {
    let months = Months::new(TRACKING_WINDOW_MONTHS);
    let start = test_date
        .checked_sub_months(months)
        .unwrap_or(NaiveDate::MIN);
    let end = test_date
        .checked_add_months(months)
        .unwrap_or(NaiveDate::MAX);
    start..=end
}
