use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Applicant details captured by the intake form. Only existence checks are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub current_address: String,
    #[serde(default)]
    pub permanent_address: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub emergency_contact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassportType {
    Ordinary,
    Official,
    Diplomatic,
}

impl PassportType {
    pub const fn label(self) -> &'static str {
        match self {
            PassportType::Ordinary => "ordinary",
            PassportType::Official => "official",
            PassportType::Diplomatic => "diplomatic",
        }
    }
}

/// Requested passport type and travel purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportDetails {
    pub passport_type: PassportType,
    #[serde(default)]
    pub purpose: String,
}

/// Payload accepted when a new application is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub personal_info: PersonalInfo,
    pub passport_details: PassportDetails,
}

/// Canonical lifecycle status. Only the state machine in `lifecycle` writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderVerification,
    Verified,
    Rejected,
    Issued,
    Dispatched,
}

impl ApplicationStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Submitted,
            Self::UnderVerification,
            Self::Verified,
            Self::Rejected,
            Self::Issued,
            Self::Dispatched,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderVerification => "under_verification",
            ApplicationStatus::Verified => "verified",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Issued => "issued",
            ApplicationStatus::Dispatched => "dispatched",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Dispatched
        )
    }

    /// Statuses during which documents may still be submitted or decided.
    pub const fn accepts_documents(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted | ApplicationStatus::UnderVerification
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == ' ' || c == '-', "_");
        Self::ordered()
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }
}

/// Named category of document evidence, e.g. "ID Proof".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementKind(pub String);

impl RequirementKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-requirement verification state held in the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Unsubmitted,
    Submitted,
    Verified,
    Failed,
}

impl VerificationOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationOutcome::Unsubmitted => "unsubmitted",
            VerificationOutcome::Submitted => "submitted",
            VerificationOutcome::Verified => "verified",
            VerificationOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Externally supplied verdict for a submitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentDecision {
    Verified,
    Failed,
}

impl DocumentDecision {
    pub const fn outcome(self) -> VerificationOutcome {
        match self {
            DocumentDecision::Verified => VerificationOutcome::Verified,
            DocumentDecision::Failed => VerificationOutcome::Failed,
        }
    }
}

impl FromStr for DocumentDecision {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "verified" | "pass" | "passed" => Ok(DocumentDecision::Verified),
            "failed" | "fail" | "rejected" => Ok(DocumentDecision::Failed),
            other => Err(format!("unknown document decision '{other}'")),
        }
    }
}

/// Reference to an uploaded document. The binary itself never reaches the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub reference: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Latest accepted submission for a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub reference: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    Face,
    Fingerprint,
}

/// Biometric capture flags. They are read by the final review but gate nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricCapture {
    pub face: bool,
    pub fingerprint: bool,
}

impl BiometricCapture {
    pub fn record(&mut self, kind: BiometricKind) {
        match kind {
            BiometricKind::Face => self.face = true,
            BiometricKind::Fingerprint => self.fingerprint = true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.face && self.fingerprint
    }
}

/// Why an application ended in `Rejected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Checklist-driven: at least one document failed verification.
    DocumentFailure { requirements: Vec<RequirementKind> },
    /// Reviewer override, independent of checklist state.
    ReviewerDecision { reason: String },
}

impl Rejection {
    pub fn summary(&self) -> String {
        match self {
            Rejection::DocumentFailure { requirements } => {
                let names: Vec<&str> = requirements.iter().map(RequirementKind::as_str).collect();
                format!("document verification failed: {}", names.join(", "))
            }
            Rejection::ReviewerDecision { reason } => format!("rejected by reviewer: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassportNumber(pub String);

impl fmt::Display for PassportNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Pending,
    Dispatched,
}

impl DispatchStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Dispatched => "dispatched",
        }
    }
}

/// Issued passport. Immutable apart from the one-way dispatch fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passport {
    pub passport_number: PassportNumber,
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub issuing_authority: String,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub dispatch_status: DispatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
}
