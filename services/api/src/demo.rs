use crate::infra::{build_compliance_stack, default_type_id, parse_checklist_status, parse_date};
use chrono::NaiveDate;
use clap::Args;
use product_compliance::config::AppConfig;
use product_compliance::error::AppError;
use product_compliance::workflows::compliance::{
    ChecklistSnapshot, ChecklistStatus, ComplianceServiceError, ComplianceUpdate, DateUpdate,
    EvaluationOutcome, LineDraft, LineUpdate, PeriodicReevaluator, ProductDraft,
    RequiredCategory, StatusEvaluator, COMPLIANCE_NOTIFICATION_GROUP,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct EvaluateArgs {
    /// Answer for the Test Reports line (yes, no, na). Omit all three for an empty checklist.
    #[arg(long, value_parser = parse_checklist_status)]
    pub(crate) test_reports: Option<ChecklistStatus>,
    /// Answer for the Labeling line (yes, no, na)
    #[arg(long, value_parser = parse_checklist_status)]
    pub(crate) labeling: Option<ChecklistStatus>,
    /// Answer for the Tracking on Item line (yes, no, na)
    #[arg(long, value_parser = parse_checklist_status)]
    pub(crate) tracking_on_item: Option<ChecklistStatus>,
    /// Test date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) test_date: Option<NaiveDate>,
    /// Tracking date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) tracking_date: Option<NaiveDate>,
    /// Emit the outcome as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Comma separated notification recipients (defaults to COMPLIANCE_NOTIFICATION_EMAIL)
    #[arg(long)]
    pub(crate) notification_emails: Option<String>,
    /// Extra address registered as a member of the notification group
    #[arg(long)]
    pub(crate) group_member: Option<String>,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let outcome = evaluate_answers(&args);

    if args.json {
        let rendered = serde_json::to_string_pretty(&outcome)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        println!("{rendered}");
        return Ok(());
    }

    println!("=== Compliance Evaluation ===");
    println!("Status: {}", outcome.status.display_name());
    match (outcome.snapshot, outcome.signals) {
        (Some(snapshot), Some(signals)) => {
            for category in RequiredCategory::ALL {
                println!(
                    "  {:<18} {}",
                    category.canonical_name(),
                    snapshot.get(category).label()
                );
            }
            println!("Signals:");
            println!("  all fields ok      {}", signals.all_fields_ok);
            println!("  both dates filled  {}", signals.both_dates_filled);
            println!("  date range valid   {}", signals.date_range_valid);
            println!("  tracking ok        {}", signals.tracking_ok);
            println!("  tracking date set  {}", signals.tracking_date_filled);
        }
        _ => println!("  checklist is empty"),
    }

    Ok(())
}

fn evaluate_answers(args: &EvaluateArgs) -> EvaluationOutcome {
    let answers = [
        (RequiredCategory::TestReports, args.test_reports),
        (RequiredCategory::Labeling, args.labeling),
        (RequiredCategory::TrackingOnItem, args.tracking_on_item),
    ];

    let snapshot = if answers.iter().all(|(_, answer)| answer.is_none()) {
        None
    } else {
        let mut snapshot = ChecklistSnapshot::default();
        for (category, answer) in answers {
            if let Some(status) = answer {
                snapshot.set(category, status);
            }
        }
        Some(snapshot)
    };

    StatusEvaluator::new().evaluate_snapshot(snapshot, args.test_date, args.tracking_date)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut notifications = AppConfig::load()?.notifications;
    if let Some(emails) = args.notification_emails {
        notifications.notification_emails = Some(emails);
    }
    if notifications.notification_emails.is_none() {
        notifications.notification_emails = Some("compliance@example.com".to_string());
    }

    let stack = build_compliance_stack(&notifications);
    if let Some(member) = args.group_member.as_deref() {
        stack
            .directory
            .add_member(COMPLIANCE_NOTIFICATION_GROUP, member, Some(member));
    }
    let service = &stack.service;

    println!("=== Product Compliance Demo ===");

    let created = service.create_product(ProductDraft {
        name: "Cordless Kettle".to_string(),
        default_code: Some("KT-2000".to_string()),
        test_date: NaiveDate::from_ymd_opt(2024, 1, 15),
        tracking_date: NaiveDate::from_ymd_opt(2025, 1, 15),
        compliance_note: Some("Batch 7 certification".to_string()),
        lines: vec![
            seeded_line("Test Reports", ChecklistStatus::Yes)?,
            seeded_line("Labeling", ChecklistStatus::Yes)?,
            seeded_line("Tracking on Item", ChecklistStatus::Na)?,
        ],
    })?;
    print_step("Created with a complete checklist", &created);
    let product_id = created.product.id.clone();

    let shifted = service.set_dates(
        &product_id,
        DateUpdate {
            test_date: created.product.test_date,
            tracking_date: NaiveDate::from_ymd_opt(2025, 1, 16),
        },
    )?;
    print_step("Tracking date moved one day past the window", &shifted);

    let restored = service.set_dates(
        &product_id,
        DateUpdate {
            test_date: created.product.test_date,
            tracking_date: created.product.tracking_date,
        },
    )?;
    print_step("Tracking date restored", &restored);

    let tracking_line = restored
        .product
        .compliance_lines
        .iter()
        .find(|line| {
            RequiredCategory::from_name(&line.compliance_type.name)
                == Some(RequiredCategory::TrackingOnItem)
        })
        .map(|line| line.id.clone())
        .ok_or_else(|| ComplianceServiceError::UnknownLine("Tracking on Item".to_string()))?;

    let degraded = service.update_line(
        &product_id,
        &tracking_line,
        LineUpdate {
            status: ChecklistStatus::No,
            notes: Some("serial missing on housing".to_string()),
        },
    )?;
    print_step("Tracking on Item answered no", &degraded);

    let copy = service.duplicate_product(&product_id)?;
    print_step("Duplicated without a checklist", &copy);

    let sweep = PeriodicReevaluator::new(Arc::clone(service)).run()?;
    println!(
        "\nSweep: {} evaluated, {} changed, {} notified, {} failed",
        sweep.evaluated,
        sweep.changed,
        sweep.notified.len(),
        sweep.failed.len()
    );

    println!("\nOutbox:");
    for mail in stack.mail.outbox() {
        println!("  to {} | {}", mail.email_to, mail.subject);
    }

    println!("\nProduct history:");
    for entry in stack.audit.entries() {
        println!("  {} | {} | {}", entry.product_id.0, entry.subject, entry.body);
    }

    Ok(())
}

fn seeded_line(name: &str, status: ChecklistStatus) -> Result<LineDraft, ComplianceServiceError> {
    let compliance_type_id = default_type_id(name)
        .ok_or_else(|| ComplianceServiceError::UnknownComplianceType(name.to_string()))?;
    Ok(LineDraft {
        compliance_type_id,
        status,
        notes: None,
    })
}

fn print_step(label: &str, update: &ComplianceUpdate) {
    let transition = update.evaluation.transition;
    println!(
        "\n{label}\n  {} [{}]: {} -> {}",
        update.product.name,
        update.product.id.0,
        transition.from.display_name(),
        transition.to.display_name()
    );
    if let Some(report) = &update.evaluation.notification {
        println!(
            "  alert: {} recipient(s), {:?}",
            report.recipients.len(),
            report.delivery
        );
    }
}
