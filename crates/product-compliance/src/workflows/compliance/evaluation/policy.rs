use super::super::domain::ComplianceStatus;
use super::rules::ComplianceSignals;

/// Priority-ordered decision table.
pub(crate) fn decide_status(signals: &ComplianceSignals) -> ComplianceStatus {
    if signals.all_fields_ok && signals.both_dates_filled && signals.date_range_valid {
        return ComplianceStatus::Approved;
    }

    // A missing test date alone does not block the warning tier.
    if signals.tracking_ok && signals.tracking_date_filled {
        return ComplianceStatus::Warning;
    }

    ComplianceStatus::NotApproved
}
