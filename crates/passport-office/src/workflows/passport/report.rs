use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::ApplicationStatus;
use super::repository::ApplicationRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCountEntry {
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub count: usize,
}

/// Applications submitted on one calendar day, broken down by their current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCountEntry {
    pub date: NaiveDate,
    pub total: usize,
    pub statuses: Vec<StatusCountEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationReport {
    pub total: usize,
    pub status_counts: Vec<StatusCountEntry>,
    pub daily: Vec<DailyCountEntry>,
    pub pending_verifications: usize,
    pub ready_for_issuance: usize,
}

impl ApplicationReport {
    pub fn build(records: &[ApplicationRecord]) -> Self {
        let mut overall: BTreeMap<ApplicationStatus, usize> = BTreeMap::new();
        let mut by_day: BTreeMap<NaiveDate, BTreeMap<ApplicationStatus, usize>> = BTreeMap::new();

        for record in records {
            *overall.entry(record.status).or_default() += 1;
            *by_day
                .entry(record.submitted_at.date_naive())
                .or_default()
                .entry(record.status)
                .or_default() += 1;
        }

        let count = |status: ApplicationStatus| overall.get(&status).copied().unwrap_or(0);

        let status_counts = ApplicationStatus::ordered()
            .into_iter()
            .map(|status| StatusCountEntry {
                status,
                status_label: status.label(),
                count: count(status),
            })
            .collect();

        let daily = by_day
            .into_iter()
            .map(|(date, counts)| DailyCountEntry {
                date,
                total: counts.values().sum(),
                statuses: counts
                    .into_iter()
                    .map(|(status, count)| StatusCountEntry {
                        status,
                        status_label: status.label(),
                        count,
                    })
                    .collect(),
            })
            .collect();

        Self {
            total: records.len(),
            status_counts,
            daily,
            pending_verifications: count(ApplicationStatus::Submitted)
                + count(ApplicationStatus::UnderVerification),
            ready_for_issuance: count(ApplicationStatus::Verified),
        }
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Application ID")]
    application_id: &'a str,
    #[serde(rename = "Applicant")]
    applicant: &'a str,
    #[serde(rename = "Passport Type")]
    passport_type: &'static str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Submitted")]
    submitted: String,
    #[serde(rename = "Last Updated")]
    last_updated: String,
    #[serde(rename = "Passport Number")]
    passport_number: Option<&'a str>,
}

/// Writes one CSV row per application, in the order given.
pub fn write_csv<W: Write>(records: &[ApplicationRecord], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(ExportRow {
            application_id: &record.id.0,
            applicant: &record.personal_info.full_name,
            passport_type: record.passport_details.passport_type.label(),
            status: record.status.label(),
            submitted: record.submitted_at.to_rfc3339(),
            last_updated: record.last_updated_at.to_rfc3339(),
            passport_number: record.passport_number.as_ref().map(|number| number.0.as_str()),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
