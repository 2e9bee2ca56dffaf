use serde::{Deserialize, Serialize};

use super::domain::RequirementKind;

pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_VALIDITY_YEARS: u32 = 10;
pub const DEFAULT_NUMBER_ATTEMPTS: u32 = 16;

/// Document kind listed in the intake configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSpec {
    pub kind: RequirementKind,
    pub required: bool,
}

impl RequirementSpec {
    pub fn required(name: &str) -> Self {
        Self {
            kind: RequirementKind::new(name),
            required: true,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            kind: RequirementKind::new(name),
            required: false,
        }
    }
}

/// Caller supplied knobs for the verification pipeline and issuance generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    pub requirements: Vec<RequirementSpec>,
    pub max_document_bytes: u64,
    pub validity_years: u32,
    pub number_attempts: u32,
}

impl LifecycleConfig {
    /// Kinds that make up every new checklist. Optional kinds are not tracked.
    pub fn checklist_kinds(&self) -> Vec<RequirementKind> {
        self.requirements
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.kind.clone())
            .collect()
    }

    /// A checklist without required kinds could never leave `Submitted` on its own.
    pub fn has_required_documents(&self) -> bool {
        self.requirements.iter().any(|spec| spec.required)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            requirements: vec![
                RequirementSpec::required("ID Proof"),
                RequirementSpec::required("Address Proof"),
                RequirementSpec::required("Photograph"),
                RequirementSpec::required("Birth Certificate"),
            ],
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            validity_years: DEFAULT_VALIDITY_YEARS,
            number_attempts: DEFAULT_NUMBER_ATTEMPTS,
        }
    }
}
