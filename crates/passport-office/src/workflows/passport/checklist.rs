use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{DocumentDecision, RequirementKind, VerificationOutcome};

/// Errors raised while updating a checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecklistError {
    #[error("'{kind}' is not a configured requirement")]
    UnknownRequirement { kind: RequirementKind },
    #[error("cannot record {attempted} for '{kind}' while it is {current}")]
    InvalidTransition {
        kind: RequirementKind,
        current: VerificationOutcome,
        attempted: VerificationOutcome,
    },
}

/// Per-application verification checklist.
///
/// The key set is fixed when the checklist is built; no operation adds or removes entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    entries: BTreeMap<RequirementKind, VerificationOutcome>,
}

impl Checklist {
    pub fn new<I>(requirements: I) -> Self
    where
        I: IntoIterator<Item = RequirementKind>,
    {
        let entries = requirements
            .into_iter()
            .map(|kind| (kind, VerificationOutcome::Unsubmitted))
            .collect();
        Self { entries }
    }

    pub fn requirements(&self) -> impl Iterator<Item = &RequirementKind> {
        self.entries.keys()
    }

    pub fn entries(&self) -> &BTreeMap<RequirementKind, VerificationOutcome> {
        &self.entries
    }

    pub fn outcome(&self, kind: &RequirementKind) -> Option<VerificationOutcome> {
        self.entries.get(kind).copied()
    }

    pub fn contains(&self, kind: &RequirementKind) -> bool {
        self.entries.contains_key(kind)
    }

    /// Marks a requirement as submitted and reports whether the entry moved. Resubmitting
    /// after a failure reopens the entry; resubmitting a pending or verified entry is a no-op.
    pub fn record_submission(&mut self, kind: &RequirementKind) -> Result<bool, ChecklistError> {
        let entry = self.entry_mut(kind)?;
        match *entry {
            VerificationOutcome::Unsubmitted | VerificationOutcome::Failed => {
                *entry = VerificationOutcome::Submitted;
                Ok(true)
            }
            VerificationOutcome::Submitted | VerificationOutcome::Verified => Ok(false),
        }
    }

    /// Records a verdict for a submitted requirement.
    pub fn record_outcome(
        &mut self,
        kind: &RequirementKind,
        decision: DocumentDecision,
    ) -> Result<(), ChecklistError> {
        let entry = self.entry_mut(kind)?;
        if *entry != VerificationOutcome::Submitted {
            return Err(ChecklistError::InvalidTransition {
                kind: kind.clone(),
                current: *entry,
                attempted: decision.outcome(),
            });
        }
        *entry = decision.outcome();
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.entries
            .values()
            .all(|outcome| *outcome == VerificationOutcome::Verified)
    }

    pub fn has_failure(&self) -> bool {
        self.entries
            .values()
            .any(|outcome| *outcome == VerificationOutcome::Failed)
    }

    /// True once any entry has left `Unsubmitted`.
    pub fn has_activity(&self) -> bool {
        self.entries
            .values()
            .any(|outcome| *outcome != VerificationOutcome::Unsubmitted)
    }

    pub fn failed_requirements(&self) -> Vec<RequirementKind> {
        self.with_outcome(VerificationOutcome::Failed)
    }

    pub fn outstanding_requirements(&self) -> Vec<RequirementKind> {
        self.entries
            .iter()
            .filter(|(_, outcome)| **outcome != VerificationOutcome::Verified)
            .map(|(kind, _)| kind.clone())
            .collect()
    }

    fn with_outcome(&self, wanted: VerificationOutcome) -> Vec<RequirementKind> {
        self.entries
            .iter()
            .filter(|(_, outcome)| **outcome == wanted)
            .map(|(kind, _)| kind.clone())
            .collect()
    }

    fn entry_mut(
        &mut self,
        kind: &RequirementKind,
    ) -> Result<&mut VerificationOutcome, ChecklistError> {
        self.entries
            .get_mut(kind)
            .ok_or_else(|| ChecklistError::UnknownRequirement { kind: kind.clone() })
    }
}
