use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checklist::Checklist;
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, BiometricCapture, DocumentRecord,
    Passport, PassportDetails, PassportNumber, PersonalInfo, Rejection, RequirementKind,
    VerificationOutcome,
};
use super::lifecycle::StatusChange;

/// Persisted application shape. The checklist is embedded and owned by the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub personal_info: PersonalInfo,
    pub passport_details: PassportDetails,
    pub status: ApplicationStatus,
    pub checklist: Checklist,
    #[serde(default)]
    pub documents: BTreeMap<RequirementKind, DocumentRecord>,
    #[serde(default)]
    pub biometrics: BiometricCapture,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<PassportNumber>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub submitted_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every update.
    #[serde(default)]
    pub version: u64,
}

impl ApplicationRecord {
    pub fn new(
        id: ApplicationId,
        submission: ApplicationSubmission,
        checklist: Checklist,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            personal_info: submission.personal_info,
            passport_details: submission.passport_details,
            status: ApplicationStatus::Submitted,
            checklist,
            documents: BTreeMap::new(),
            biometrics: BiometricCapture::default(),
            rejection: None,
            passport_number: None,
            history: Vec::new(),
            submitted_at,
            last_updated_at: submitted_at,
            version: 0,
        }
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            applicant_name: self.personal_info.full_name.clone(),
            status: self.status.label(),
            outstanding_requirements: self.checklist.outstanding_requirements(),
            biometrics: self.biometrics,
            rejection_reason: self.rejection.as_ref().map(Rejection::summary),
            passport_number: self.passport_number.clone(),
            submitted_at: self.submitted_at,
            last_updated_at: self.last_updated_at,
        }
    }

    pub fn checklist_view(&self) -> ChecklistView {
        let entries = self
            .checklist
            .entries()
            .iter()
            .map(|(kind, outcome)| ChecklistEntryView {
                requirement: kind.clone(),
                outcome: *outcome,
                document_reference: self
                    .documents
                    .get(kind)
                    .map(|document| document.reference.clone()),
            })
            .collect();

        ChecklistView {
            application_id: self.id.clone(),
            entries,
            complete: self.checklist.is_complete(),
            has_failure: self.checklist.has_failure(),
        }
    }
}

/// Storage abstraction for applications.
///
/// `update` must be a compare-and-swap on `version`: it fails with
/// [`RepositoryError::StaleVersion`] unless the stored version equals the incoming one.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Storage abstraction for issued passports.
///
/// Implementations enforce two unique constraints on `insert`: the passport number and the
/// originating application.
pub trait PassportRepository: Send + Sync {
    fn insert(&self, passport: Passport) -> Result<Passport, RepositoryError>;
    fn contains_number(&self, number: &PassportNumber) -> Result<bool, RepositoryError>;
    fn fetch(&self, number: &PassportNumber) -> Result<Option<Passport>, RepositoryError>;
    fn fetch_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Passport>, RepositoryError>;
    /// Flips `dispatch_status` once. A second call fails with `Conflict`.
    fn mark_dispatched(
        &self,
        number: &PassportNumber,
        confirmation: DispatchConfirmation,
    ) -> Result<Passport, RepositoryError>;
    fn list(&self) -> Result<Vec<Passport>, RepositoryError>;
}

/// Delivery details recorded when a passport leaves the office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfirmation {
    pub delivery_address: String,
    pub tracking_number: Option<String>,
    pub dispatched_at: DateTime<Utc>,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("passport number {0} is already assigned")]
    DuplicatePassportNumber(PassportNumber),
    #[error("stale record (expected version {expected}, stored version {found})")]
    StaleVersion { expected: u64, found: u64 },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub status: &'static str,
    pub outstanding_requirements: Vec<RequirementKind>,
    pub biometrics: BiometricCapture,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<PassportNumber>,
    pub submitted_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistEntryView {
    pub requirement: RequirementKind,
    pub outcome: VerificationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistView {
    pub application_id: ApplicationId,
    pub entries: Vec<ChecklistEntryView>,
    pub complete: bool,
    pub has_failure: bool,
}
