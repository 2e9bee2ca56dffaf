use clap::Args;
use passport_office::config::{AppConfig, TelemetryConfig};
use passport_office::error::AppError;
use passport_office::telemetry;
use passport_office::workflows::passport::{
    write_csv, ApplicationId, ApplicationRecord, ApplicationReport, ApplicationSubmission,
    BiometricKind, DecisionImporter, DocumentDecision, DocumentRef, InMemoryApplicationRepository,
    InMemoryPassportRepository, PassportApplicationService, PassportDetails, PassportType,
    PersonalInfo,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type DemoService =
    PassportApplicationService<InMemoryApplicationRepository, InMemoryPassportRepository>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Fail the first document review so the application ends rejected.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Apply reviewer decisions from a CSV sheet instead of approving every document.
    /// Use `{id}` in the Application ID column to target the demo application.
    #[arg(long)]
    pub(crate) decisions_csv: Option<PathBuf>,
    /// Print the application export as CSV after the walkthrough.
    #[arg(long)]
    pub(crate) csv: bool,
    /// Issuing authority printed on the passport.
    #[arg(long, default_value = "Central Passport Authority")]
    pub(crate) authority: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&TelemetryConfig {
        log_level: "warn".to_string(),
    })?;

    let service = PassportApplicationService::new(
        Arc::new(InMemoryApplicationRepository::new()),
        Arc::new(InMemoryPassportRepository::new()),
        config.lifecycle,
    );

    println!("Passport application walkthrough");
    let record = service.create(sample_submission())?;
    print_step("created", &record);

    for kind in service.config().checklist_kinds() {
        let record = service.submit_document(&record.id, &kind, sample_document(kind.as_str()))?;
        print_step(&format!("submitted {kind}"), &record);
    }

    let record = service.biometric_capture(&record.id, BiometricKind::Fingerprint)?;
    print_step("captured fingerprint", &record);

    match &args.decisions_csv {
        Some(path) => apply_sheet(&service, &record.id, path)?,
        None => review_all(&service, &record.id, args.reject)?,
    }

    let record = service.get(&record.id)?;
    if record.status.is_terminal() {
        print_rejection(&record);
    } else {
        match service.issue(&record.id, &args.authority) {
            Ok(passport) => {
                println!(
                    "- issued {} by {} | valid {} to {} | dispatch {}",
                    passport.passport_number,
                    passport.issuing_authority,
                    passport.issue_date,
                    passport.expiry_date,
                    passport.dispatch_status.label()
                );
                let passport = service.dispatch(
                    &record.id,
                    "12 Harbour Road, Port Town",
                    Some("TRK-0001".to_string()),
                )?;
                println!(
                    "- dispatch {} to {}",
                    passport.dispatch_status.label(),
                    passport.delivery_address.as_deref().unwrap_or("-")
                );
            }
            Err(err) => println!("- issuance refused: {err}"),
        }
    }

    let record = service.get(&record.id)?;
    println!("\nStatus history");
    for change in &record.history {
        println!(
            "  {} -> {} at {}",
            change.from,
            change.to,
            change.at.format("%H:%M:%S")
        );
    }

    print_report(&service.report()?);

    if args.csv {
        println!();
        let records = service.list_applications(None)?;
        write_csv(&records, std::io::stdout())?;
    }

    Ok(())
}

fn review_all(service: &DemoService, id: &ApplicationId, reject: bool) -> Result<(), AppError> {
    for (index, kind) in service.config().checklist_kinds().into_iter().enumerate() {
        let decision = if reject && index == 0 {
            DocumentDecision::Failed
        } else {
            DocumentDecision::Verified
        };
        let record = service.decide_document(id, &kind, decision)?;
        print_step(&format!("{kind} {}", decision_label(decision)), &record);
        if record.status.is_terminal() {
            break;
        }
    }
    Ok(())
}

fn apply_sheet(service: &DemoService, id: &ApplicationId, path: &Path) -> Result<(), AppError> {
    let sheet = std::fs::read_to_string(path)?;
    let sheet = sheet.replace("{id}", &id.0);
    let summary = DecisionImporter::from_reader(sheet.as_bytes(), service)?;
    println!(
        "- decision sheet {}: {} applied | {} failed",
        path.display(),
        summary.applied,
        summary.failed
    );
    Ok(())
}

fn decision_label(decision: DocumentDecision) -> &'static str {
    match decision {
        DocumentDecision::Verified => "verified",
        DocumentDecision::Failed => "failed",
    }
}

fn print_step(action: &str, record: &ApplicationRecord) {
    let outstanding = record.checklist.outstanding_requirements().len();
    println!(
        "- {action:<28} status={:<20} outstanding={outstanding}",
        record.status.label()
    );
}

fn print_rejection(record: &ApplicationRecord) {
    let reason = record
        .rejection
        .as_ref()
        .map(|rejection| rejection.summary())
        .unwrap_or_else(|| "no reason recorded".to_string());
    println!("- application rejected: {reason}");
}

fn print_report(report: &ApplicationReport) {
    println!("\nApplications by status ({} total)", report.total);
    for entry in &report.status_counts {
        println!("  {:<20} {}", entry.status_label, entry.count);
    }
    println!(
        "  pending verification: {} | ready for issuance: {}",
        report.pending_verifications, report.ready_for_issuance
    );
}

fn sample_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        personal_info: PersonalInfo {
            full_name: "Mira Castell".to_string(),
            email: "mira.castell@example.com".to_string(),
            ..PersonalInfo::default()
        },
        passport_details: PassportDetails {
            passport_type: PassportType::Ordinary,
            purpose: "Tourism".to_string(),
        },
    }
}

fn sample_document(kind: &str) -> DocumentRef {
    DocumentRef {
        reference: format!("demo/{}.pdf", kind.to_ascii_lowercase().replace(' ', "-")),
        size_bytes: 96_000,
        content_type: Some("application/pdf".to_string()),
    }
}
