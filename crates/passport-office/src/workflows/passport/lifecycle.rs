//! Application status state machine.
//!
//! Every status change goes through [`transition`]. The legal edges and their guards live in
//! [`edge_guard`]; anything absent from that table is an illegal transition.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicationId, ApplicationStatus, PassportNumber, Rejection};
use super::repository::ApplicationRecord;

/// What caused a transition. Keeps the checklist-driven path apart from reviewer overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionTrigger {
    DocumentIntake,
    ChecklistResolved,
    ReviewerDecision { reason: String },
    PassportIssued { passport_number: PassportNumber },
    DispatchConfirmed { delivery_address: String },
}

impl TransitionTrigger {
    fn reviewer_reason(&self) -> Option<&str> {
        match self {
            TransitionTrigger::ReviewerDecision { reason } if !reason.trim().is_empty() => {
                Some(reason.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionContext {
    pub trigger: TransitionTrigger,
    pub at: DateTime<Utc>,
}

impl TransitionContext {
    pub fn new(trigger: TransitionTrigger, at: DateTime<Utc>) -> Self {
        Self { trigger, at }
    }
}

/// One committed status change, kept on the record as an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub trigger: TransitionTrigger,
    pub at: DateTime<Utc>,
}

/// Condition attached to a legal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    ChecklistActivity,
    ChecklistComplete,
    FailureOrReviewerDecision,
    ReviewerDecision,
    PassportProduced,
    DeliveryAddress,
}

impl Guard {
    pub const fn description(self) -> &'static str {
        match self {
            Guard::ChecklistActivity => "at least one document must be submitted",
            Guard::ChecklistComplete => "every required document must be verified",
            Guard::FailureOrReviewerDecision => {
                "a failed document or an explicit reviewer decision is required"
            }
            Guard::ReviewerDecision => "an explicit reviewer decision with a reason is required",
            Guard::PassportProduced => "a passport must be produced for the application",
            Guard::DeliveryAddress => "dispatch requires a non-empty delivery address",
        }
    }

    fn holds(self, record: &ApplicationRecord, trigger: &TransitionTrigger) -> bool {
        match self {
            Guard::ChecklistActivity => record.checklist.has_activity(),
            Guard::ChecklistComplete => record.checklist.is_complete(),
            Guard::FailureOrReviewerDecision => {
                record.checklist.has_failure() || trigger.reviewer_reason().is_some()
            }
            Guard::ReviewerDecision => trigger.reviewer_reason().is_some(),
            Guard::PassportProduced => matches!(
                trigger,
                TransitionTrigger::PassportIssued { passport_number }
                    if !passport_number.0.trim().is_empty()
            ),
            Guard::DeliveryAddress => matches!(
                trigger,
                TransitionTrigger::DispatchConfirmed { delivery_address }
                    if !delivery_address.trim().is_empty()
            ),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Transition table. `None` means the edge does not exist.
pub fn edge_guard(from: ApplicationStatus, to: ApplicationStatus) -> Option<Guard> {
    use ApplicationStatus::*;

    match (from, to) {
        (Submitted, UnderVerification) => Some(Guard::ChecklistActivity),
        (UnderVerification, Verified) => Some(Guard::ChecklistComplete),
        (UnderVerification, Rejected) => Some(Guard::FailureOrReviewerDecision),
        (Submitted, Rejected) => Some(Guard::ReviewerDecision),
        (Verified, Issued) => Some(Guard::PassportProduced),
        (Issued, Dispatched) => Some(Guard::DeliveryAddress),
        _ => None,
    }
}

pub fn is_legal_edge(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    edge_guard(from, to).is_some()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("application {application_id}: no transition from {from} to {to}")]
    IllegalTransition {
        application_id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application {application_id}: cannot move from {from} to {to}: {guard}")]
    GuardNotSatisfied {
        application_id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
        guard: Guard,
    },
}

/// Moves `record` to `target`. The guard is evaluated before anything is written, so a
/// failure leaves the record untouched.
pub fn transition(
    record: &mut ApplicationRecord,
    target: ApplicationStatus,
    context: TransitionContext,
) -> Result<StatusChange, LifecycleError> {
    let from = record.status;
    let guard = edge_guard(from, target).ok_or_else(|| LifecycleError::IllegalTransition {
        application_id: record.id.clone(),
        from,
        to: target,
    })?;

    if !guard.holds(record, &context.trigger) {
        return Err(LifecycleError::GuardNotSatisfied {
            application_id: record.id.clone(),
            from,
            to: target,
            guard,
        });
    }

    let TransitionContext { trigger, at } = context;

    match &trigger {
        TransitionTrigger::PassportIssued { passport_number } => {
            record.passport_number = Some(passport_number.clone());
        }
        TransitionTrigger::ReviewerDecision { reason } if target == ApplicationStatus::Rejected => {
            record.rejection = Some(Rejection::ReviewerDecision {
                reason: reason.trim().to_string(),
            });
        }
        _ if target == ApplicationStatus::Rejected => {
            record.rejection = Some(Rejection::DocumentFailure {
                requirements: record.checklist.failed_requirements(),
            });
        }
        _ => {}
    }

    record.status = target;
    if at > record.last_updated_at {
        record.last_updated_at = at;
    }

    let change = StatusChange {
        from,
        to: target,
        trigger,
        at: record.last_updated_at,
    };
    record.history.push(change.clone());

    info!(
        application_id = %record.id,
        from = from.label(),
        to = target.label(),
        "application status changed"
    );

    Ok(change)
}
