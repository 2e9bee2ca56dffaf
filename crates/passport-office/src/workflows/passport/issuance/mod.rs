//! Passport generation for verified applications and the dispatch hand-off.

mod numbering;

pub use numbering::{is_well_formed, PassportNumberSource, RandomPassportNumbers};

use chrono::{DateTime, Months, NaiveDate, Utc};
use tracing::warn;

use super::config::LifecycleConfig;
use super::domain::{ApplicationStatus, DispatchStatus, Passport, PassportNumber};
use super::lifecycle::{self, StatusChange, TransitionContext, TransitionTrigger};
use super::repository::{ApplicationRecord, PassportRepository, RepositoryError};
use super::service::ApplicationServiceError;

#[derive(Debug, Clone)]
pub struct IssuanceGenerator {
    validity_years: u32,
    number_attempts: u32,
}

impl IssuanceGenerator {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            validity_years: config.validity_years,
            number_attempts: config.number_attempts,
        }
    }

    /// Expiry is computed in calendar months, so 29 February clamps to 28 February.
    pub fn expiry_for(&self, issue_date: NaiveDate) -> NaiveDate {
        issue_date
            .checked_add_months(Months::new(self.validity_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn check_eligibility(
        &self,
        record: &ApplicationRecord,
        issuing_authority: &str,
    ) -> Result<(), ApplicationServiceError> {
        if record.status != ApplicationStatus::Verified {
            return Err(ApplicationServiceError::not_eligible(
                record,
                "only verified applications can be issued",
            ));
        }
        if issuing_authority.trim().is_empty() {
            return Err(ApplicationServiceError::not_eligible(
                record,
                "an issuing authority is required",
            ));
        }
        Ok(())
    }

    /// Draws candidates until one is free in `store` and persists the passport.
    ///
    /// The store's unique constraint is the final arbiter: a candidate that passes the
    /// lookup but loses an insert race is treated like any other collision.
    pub fn allocate<P>(
        &self,
        numbers: &dyn PassportNumberSource,
        store: &P,
        record: &ApplicationRecord,
        issuing_authority: &str,
        issue_date: NaiveDate,
    ) -> Result<Passport, ApplicationServiceError>
    where
        P: PassportRepository + ?Sized,
    {
        for attempt in 1..=self.number_attempts {
            let candidate = numbers.candidate();
            if store.contains_number(&candidate)? {
                warn!(
                    application_id = %record.id,
                    %candidate,
                    attempt,
                    "passport number collision"
                );
                continue;
            }

            let passport = self.build_passport(record, candidate, issuing_authority, issue_date);
            match store.insert(passport) {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::DuplicatePassportNumber(number)) => {
                    warn!(
                        application_id = %record.id,
                        candidate = %number,
                        attempt,
                        "passport number taken during insert"
                    );
                }
                Err(RepositoryError::Conflict) => {
                    return Err(ApplicationServiceError::not_eligible(
                        record,
                        "a passport has already been issued for this application",
                    ));
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(ApplicationServiceError::PassportNumberCollision {
            attempts: self.number_attempts,
        })
    }

    pub fn commit_issue(
        &self,
        record: &mut ApplicationRecord,
        passport_number: &PassportNumber,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ApplicationServiceError> {
        let change = lifecycle::transition(
            record,
            ApplicationStatus::Issued,
            TransitionContext::new(
                TransitionTrigger::PassportIssued {
                    passport_number: passport_number.clone(),
                },
                now,
            ),
        )?;
        Ok(change)
    }

    /// Validates a dispatch request and returns the linked passport number.
    pub fn check_dispatch(
        &self,
        record: &ApplicationRecord,
        delivery_address: &str,
    ) -> Result<PassportNumber, ApplicationServiceError> {
        if record.status != ApplicationStatus::Issued {
            return Err(ApplicationServiceError::not_eligible(
                record,
                "only issued passports can be dispatched",
            ));
        }
        if delivery_address.trim().is_empty() {
            return Err(ApplicationServiceError::MissingAddress {
                application_id: record.id.clone(),
            });
        }
        record
            .passport_number
            .clone()
            .ok_or_else(|| ApplicationServiceError::not_eligible(record, "no passport is linked"))
    }

    pub fn commit_dispatch(
        &self,
        record: &mut ApplicationRecord,
        delivery_address: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, ApplicationServiceError> {
        let change = lifecycle::transition(
            record,
            ApplicationStatus::Dispatched,
            TransitionContext::new(
                TransitionTrigger::DispatchConfirmed {
                    delivery_address: delivery_address.trim().to_string(),
                },
                now,
            ),
        )?;
        Ok(change)
    }

    fn build_passport(
        &self,
        record: &ApplicationRecord,
        passport_number: PassportNumber,
        issuing_authority: &str,
        issue_date: NaiveDate,
    ) -> Passport {
        Passport {
            passport_number,
            application_id: record.id.clone(),
            applicant_name: record.personal_info.full_name.clone(),
            issuing_authority: issuing_authority.trim().to_string(),
            issue_date,
            expiry_date: self.expiry_for(issue_date),
            dispatch_status: DispatchStatus::Pending,
            delivery_address: None,
            tracking_number: None,
            dispatched_at: None,
        }
    }
}
