//! Passport application lifecycle: document checklist, status state machine, verification
//! pipeline, and passport issuance.
//!
//! Status is only ever written through [`lifecycle::transition`]. Service operations run a
//! read, guard, and compare-and-swap cycle against the application store, so concurrent
//! callers cannot both win the same state change.

pub mod checklist;
pub mod config;
pub mod domain;
pub mod import;
pub mod issuance;
pub mod lifecycle;
pub mod memory;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod verification;

#[cfg(test)]
mod tests;

pub use checklist::{Checklist, ChecklistError};
pub use config::{LifecycleConfig, RequirementSpec};
pub use domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, BiometricCapture, BiometricKind,
    DispatchStatus, DocumentDecision, DocumentRecord, DocumentRef, Passport, PassportDetails,
    PassportNumber, PassportType, PersonalInfo, Rejection, RequirementKind, UnknownStatus,
    VerificationOutcome,
};
pub use import::{
    DecisionImportError, DecisionImportRow, DecisionImportSummary, DecisionImporter,
    DecisionRowResult,
};
pub use issuance::{is_well_formed, IssuanceGenerator, PassportNumberSource, RandomPassportNumbers};
pub use lifecycle::{
    edge_guard, is_legal_edge, Guard, LifecycleError, StatusChange, TransitionContext,
    TransitionTrigger,
};
pub use memory::{InMemoryApplicationRepository, InMemoryPassportRepository};
pub use report::{write_csv, ApplicationReport, DailyCountEntry, StatusCountEntry};
pub use repository::{
    ApplicationRecord, ApplicationRepository, ApplicationStatusView, ChecklistEntryView,
    ChecklistView, DispatchConfirmation, PassportRepository, RepositoryError,
};
pub use router::application_router;
pub use service::{ApplicationServiceError, PassportApplicationService};
pub use verification::VerificationPipeline;
