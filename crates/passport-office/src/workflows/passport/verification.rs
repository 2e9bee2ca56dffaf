//! Document intake and verification decisions applied to a single application record.
//!
//! The pipeline only mutates the record it is handed; persistence and retry on concurrent
//! modification are the service's job.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::config::LifecycleConfig;
use super::domain::{
    ApplicationStatus, BiometricKind, DocumentDecision, DocumentRecord, DocumentRef,
    RequirementKind,
};
use super::lifecycle::{self, StatusChange, TransitionContext, TransitionTrigger};
use super::repository::ApplicationRecord;
use super::service::ApplicationServiceError;

#[derive(Debug, Clone)]
pub struct VerificationPipeline {
    max_document_bytes: u64,
}

impl VerificationPipeline {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            max_document_bytes: config.max_document_bytes,
        }
    }

    pub fn max_document_bytes(&self) -> u64 {
        self.max_document_bytes
    }

    /// Accepts a document for `kind` and opens verification on the first submission.
    pub fn submit_document(
        &self,
        record: &mut ApplicationRecord,
        kind: &RequirementKind,
        document: &DocumentRef,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, ApplicationServiceError> {
        if !record.status.accepts_documents() {
            return Err(ApplicationServiceError::not_eligible(
                record,
                "documents are no longer accepted",
            ));
        }

        if document.reference.trim().is_empty() || document.size_bytes == 0 {
            return Err(ApplicationServiceError::EmptyDocument {
                application_id: record.id.clone(),
                kind: kind.clone(),
            });
        }

        if document.size_bytes > self.max_document_bytes {
            warn!(
                application_id = %record.id,
                requirement = %kind,
                size_bytes = document.size_bytes,
                "document exceeds size limit"
            );
            return Err(ApplicationServiceError::PayloadTooLarge {
                application_id: record.id.clone(),
                kind: kind.clone(),
                size_bytes: document.size_bytes,
                max_bytes: self.max_document_bytes,
            });
        }

        let reopened = record
            .checklist
            .record_submission(kind)
            .map_err(|source| ApplicationServiceError::checklist(record, source))?;

        // A pending or verified entry keeps the document its outcome refers to.
        if !reopened {
            debug!(application_id = %record.id, requirement = %kind, "resubmission ignored");
            return Ok(None);
        }

        record.documents.insert(
            kind.clone(),
            DocumentRecord {
                reference: document.reference.trim().to_string(),
                size_bytes: document.size_bytes,
                content_type: document.content_type.clone(),
                submitted_at: now,
            },
        );
        debug!(application_id = %record.id, requirement = %kind, "document recorded");

        if record.status == ApplicationStatus::Submitted {
            let change = lifecycle::transition(
                record,
                ApplicationStatus::UnderVerification,
                TransitionContext::new(TransitionTrigger::DocumentIntake, now),
            )?;
            return Ok(Some(change));
        }

        Ok(None)
    }

    /// Records a verdict and resolves the application when the checklist settles.
    ///
    /// A failure rejects on the same call; a complete checklist verifies. This is the only
    /// path that advances status from checklist state.
    pub fn decide_document(
        &self,
        record: &mut ApplicationRecord,
        kind: &RequirementKind,
        decision: DocumentDecision,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, ApplicationServiceError> {
        if !record.status.accepts_documents() {
            return Err(ApplicationServiceError::not_eligible(
                record,
                "verification decisions are closed",
            ));
        }

        record
            .checklist
            .record_outcome(kind, decision)
            .map_err(|source| ApplicationServiceError::checklist(record, source))?;

        let target = if record.checklist.has_failure() {
            ApplicationStatus::Rejected
        } else if record.checklist.is_complete() {
            ApplicationStatus::Verified
        } else {
            return Ok(None);
        };

        let change = lifecycle::transition(
            record,
            target,
            TransitionContext::new(TransitionTrigger::ChecklistResolved, now),
        )?;
        Ok(Some(change))
    }

    /// Sets a biometric capture flag. Capture does not gate verification or issuance.
    pub fn biometric_capture(
        &self,
        record: &mut ApplicationRecord,
        kind: BiometricKind,
    ) -> Result<(), ApplicationServiceError> {
        if record.status.is_terminal() {
            return Err(ApplicationServiceError::not_eligible(
                record,
                "the application is closed",
            ));
        }
        record.biometrics.record(kind);
        Ok(())
    }

    /// Reviewer override: rejects regardless of checklist state.
    pub fn reject(
        &self,
        record: &mut ApplicationRecord,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ApplicationServiceError> {
        if reason.trim().is_empty() {
            return Err(ApplicationServiceError::InvalidInput(
                "a rejection reason is required".to_string(),
            ));
        }

        let change = lifecycle::transition(
            record,
            ApplicationStatus::Rejected,
            TransitionContext::new(
                TransitionTrigger::ReviewerDecision {
                    reason: reason.to_string(),
                },
                now,
            ),
        )?;
        Ok(change)
    }
}
