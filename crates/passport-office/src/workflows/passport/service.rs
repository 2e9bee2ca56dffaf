use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::checklist::{Checklist, ChecklistError};
use super::config::LifecycleConfig;
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, BiometricKind, DocumentDecision,
    DocumentRef, Passport, PassportNumber, RequirementKind,
};
use super::issuance::{IssuanceGenerator, PassportNumberSource, RandomPassportNumbers};
use super::lifecycle::{self, LifecycleError, TransitionContext, TransitionTrigger};
use super::report::ApplicationReport;
use super::repository::{
    ApplicationRecord, ApplicationRepository, DispatchConfirmation, PassportRepository,
    RepositoryError,
};
use super::verification::VerificationPipeline;

/// Re-reads allowed when a concurrent writer bumps the record version first.
const MAX_UPDATE_ATTEMPTS: u32 = 8;

/// Service composing the verification pipeline, issuance generator, and stores.
pub struct PassportApplicationService<R, P> {
    repository: Arc<R>,
    passports: Arc<P>,
    config: LifecycleConfig,
    pipeline: VerificationPipeline,
    issuance: IssuanceGenerator,
    numbers: Arc<dyn PassportNumberSource>,
    clock: fn() -> DateTime<Utc>,
}

impl<R, P> PassportApplicationService<R, P>
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    pub fn new(repository: Arc<R>, passports: Arc<P>, config: LifecycleConfig) -> Self {
        Self {
            repository,
            passports,
            pipeline: VerificationPipeline::new(&config),
            issuance: IssuanceGenerator::new(&config),
            config,
            numbers: Arc::new(RandomPassportNumbers),
            clock: Utc::now,
        }
    }

    pub fn with_number_source(mut self, numbers: Arc<dyn PassportNumberSource>) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Open a new application with an all-unsubmitted checklist.
    pub fn create(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        let info = &submission.personal_info;
        if info.full_name.trim().is_empty() {
            return Err(ApplicationServiceError::InvalidInput(
                "full name is required".to_string(),
            ));
        }
        if info.email.trim().is_empty() {
            return Err(ApplicationServiceError::InvalidInput(
                "email is required".to_string(),
            ));
        }

        if !self.config.has_required_documents() {
            warn!("refusing intake: no required documents are configured");
            return Err(ApplicationServiceError::NoRequiredDocuments);
        }

        let checklist = Checklist::new(self.config.checklist_kinds());
        let record = ApplicationRecord::new(
            ApplicationId::generate(),
            submission,
            checklist,
            (self.clock)(),
        );

        let stored = self.repository.insert(record)?;
        info!(application_id = %stored.id, "application submitted");
        Ok(stored)
    }

    pub fn submit_document(
        &self,
        application_id: &ApplicationId,
        kind: &RequirementKind,
        document: DocumentRef,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.mutate(application_id, |record, now| {
            self.pipeline
                .submit_document(record, kind, &document, now)
                .map(|_| ())
        })
    }

    pub fn decide_document(
        &self,
        application_id: &ApplicationId,
        kind: &RequirementKind,
        decision: DocumentDecision,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.mutate(application_id, |record, now| {
            self.pipeline
                .decide_document(record, kind, decision, now)
                .map(|_| ())
        })
    }

    pub fn biometric_capture(
        &self,
        application_id: &ApplicationId,
        kind: BiometricKind,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.mutate(application_id, |record, _| {
            self.pipeline.biometric_capture(record, kind)
        })
    }

    /// Reviewer override. Allowed from `Submitted` and `UnderVerification`.
    pub fn reject(
        &self,
        application_id: &ApplicationId,
        reason: &str,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.mutate(application_id, |record, now| {
            self.pipeline.reject(record, reason, now).map(|_| ())
        })
    }

    /// Raw state-machine step. The workflow operations above are the normal entry points;
    /// this exists for tooling that replays recorded triggers.
    pub fn transition(
        &self,
        application_id: &ApplicationId,
        target: ApplicationStatus,
        trigger: TransitionTrigger,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.mutate(application_id, |record, now| {
            lifecycle::transition(
                record,
                target,
                TransitionContext::new(trigger.clone(), now),
            )?;
            Ok(())
        })
    }

    /// Generate and persist a passport for a verified application, then mark it issued.
    pub fn issue(
        &self,
        application_id: &ApplicationId,
        issuing_authority: &str,
    ) -> Result<Passport, ApplicationServiceError> {
        let record = self.fetch(application_id)?;
        self.issuance.check_eligibility(&record, issuing_authority)?;

        // A passport stored by an earlier attempt whose status write failed is reused.
        let passport = match self.passports.fetch_for_application(application_id)? {
            Some(existing) => {
                info!(
                    application_id = %application_id,
                    passport_number = %existing.passport_number,
                    "resuming issuance with stored passport"
                );
                existing
            }
            None => self.issuance.allocate(
                self.numbers.as_ref(),
                self.passports.as_ref(),
                &record,
                issuing_authority,
                (self.clock)().date_naive(),
            )?,
        };

        self.mutate(application_id, |record, now| {
            self.issuance.check_eligibility(record, issuing_authority)?;
            self.issuance
                .commit_issue(record, &passport.passport_number, now)
                .map(|_| ())
        })?;

        info!(
            application_id = %application_id,
            passport_number = %passport.passport_number,
            expiry_date = %passport.expiry_date,
            "passport issued"
        );
        Ok(passport)
    }

    /// Confirm delivery of an issued passport and close the application.
    pub fn dispatch(
        &self,
        application_id: &ApplicationId,
        delivery_address: &str,
        tracking_number: Option<String>,
    ) -> Result<Passport, ApplicationServiceError> {
        let record = self.fetch(application_id)?;
        let passport_number = self.issuance.check_dispatch(&record, delivery_address)?;

        let confirmation = DispatchConfirmation {
            delivery_address: delivery_address.trim().to_string(),
            tracking_number: tracking_number
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            dispatched_at: (self.clock)(),
        };
        let passport = match self
            .passports
            .mark_dispatched(&passport_number, confirmation)
        {
            Ok(passport) => passport,
            // The store flip already happened while the application is still issued, so an
            // earlier attempt failed before closing it.
            Err(RepositoryError::Conflict) => {
                let passport = self.get_passport(&passport_number)?;
                info!(
                    application_id = %application_id,
                    passport_number = %passport_number,
                    "resuming dispatch of already dispatched passport"
                );
                passport
            }
            Err(RepositoryError::NotFound) => {
                return Err(ApplicationServiceError::PassportNotFound(passport_number));
            }
            Err(other) => return Err(other.into()),
        };
        let address = passport
            .delivery_address
            .clone()
            .unwrap_or_else(|| delivery_address.trim().to_string());

        self.mutate(application_id, |record, now| {
            self.issuance.check_dispatch(record, &address)?;
            self.issuance
                .commit_dispatch(record, &address, now)
                .map(|_| ())
        })?;

        info!(
            application_id = %application_id,
            passport_number = %passport.passport_number,
            "passport dispatched"
        );
        Ok(passport)
    }

    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.fetch(application_id)
    }

    pub fn get_status(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationStatus, ApplicationServiceError> {
        Ok(self.fetch(application_id)?.status)
    }

    pub fn get_checklist(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Checklist, ApplicationServiceError> {
        Ok(self.fetch(application_id)?.checklist)
    }

    /// Applications ordered by submission time, optionally filtered by status.
    pub fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, ApplicationServiceError> {
        let mut records = self.repository.list(status)?;
        records.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    pub fn get_passport(
        &self,
        passport_number: &PassportNumber,
    ) -> Result<Passport, ApplicationServiceError> {
        self.passports
            .fetch(passport_number)?
            .ok_or_else(|| ApplicationServiceError::PassportNotFound(passport_number.clone()))
    }

    pub fn report(&self) -> Result<ApplicationReport, ApplicationServiceError> {
        let records = self.list_applications(None)?;
        Ok(ApplicationReport::build(&records))
    }

    fn fetch(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.repository
            .fetch(application_id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(application_id.clone()))
    }

    /// Read, apply, and compare-and-swap a record. Guards always run against the copy that
    /// is about to be written; a stale write re-reads and re-evaluates from scratch.
    fn mutate<F>(
        &self,
        application_id: &ApplicationId,
        mut apply: F,
    ) -> Result<ApplicationRecord, ApplicationServiceError>
    where
        F: FnMut(&mut ApplicationRecord, DateTime<Utc>) -> Result<(), ApplicationServiceError>,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut record = self.fetch(application_id)?;
            apply(&mut record, (self.clock)())?;

            match self.repository.update(record) {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::StaleVersion { expected, found }) => {
                    debug!(
                        application_id = %application_id,
                        expected,
                        found,
                        attempt,
                        "concurrent update detected, retrying"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(application_id = %application_id, "gave up after repeated concurrent updates");
        Err(ApplicationServiceError::Contention {
            application_id: application_id.clone(),
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("application {application_id}: {source}")]
    Checklist {
        application_id: ApplicationId,
        status: ApplicationStatus,
        #[source]
        source: ChecklistError,
    },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("application {application_id}: document for '{kind}' is empty")]
    EmptyDocument {
        application_id: ApplicationId,
        kind: RequirementKind,
    },
    #[error(
        "application {application_id}: document for '{kind}' is {size_bytes} bytes, limit is {max_bytes}"
    )]
    PayloadTooLarge {
        application_id: ApplicationId,
        kind: RequirementKind,
        size_bytes: u64,
        max_bytes: u64,
    },
    #[error("application {application_id} is {status}: {reason}")]
    NotEligible {
        application_id: ApplicationId,
        status: ApplicationStatus,
        reason: &'static str,
    },
    #[error("application {application_id}: a delivery address is required")]
    MissingAddress { application_id: ApplicationId },
    #[error("no unique passport number found after {attempts} attempts")]
    PassportNumberCollision { attempts: u32 },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("passport {0} not found")]
    PassportNotFound(PassportNumber),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no required documents are configured")]
    NoRequiredDocuments,
    #[error("application {application_id} changed concurrently {attempts} times; try again")]
    Contention {
        application_id: ApplicationId,
        attempts: u32,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApplicationServiceError {
    pub(crate) fn not_eligible(record: &ApplicationRecord, reason: &'static str) -> Self {
        Self::NotEligible {
            application_id: record.id.clone(),
            status: record.status,
            reason,
        }
    }

    pub(crate) fn checklist(record: &ApplicationRecord, source: ChecklistError) -> Self {
        Self::Checklist {
            application_id: record.id.clone(),
            status: record.status,
            source,
        }
    }

    /// True for `UnknownRequirement` raised by the checklist.
    pub fn is_unknown_requirement(&self) -> bool {
        matches!(
            self,
            Self::Checklist {
                source: ChecklistError::UnknownRequirement { .. },
                ..
            }
        )
    }
}
