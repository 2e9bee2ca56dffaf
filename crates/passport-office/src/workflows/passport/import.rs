//! Bulk verification decisions from a reviewer's CSV sheet.
//!
//! The whole file is parsed before anything is applied, so a malformed sheet changes nothing.
//! Rows are then applied one by one through the service; a row that fails (unknown
//! application, document not yet submitted) is reported and does not stop the rest.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicationId, ApplicationStatus, DocumentDecision, RequirementKind};
use super::repository::{ApplicationRepository, PassportRepository};
use super::service::PassportApplicationService;

#[derive(Debug)]
pub enum DecisionImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: usize, message: String },
}

impl std::fmt::Display for DecisionImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionImportError::Io(err) => write!(f, "failed to read decision sheet: {}", err),
            DecisionImportError::Csv(err) => write!(f, "invalid decision CSV data: {}", err),
            DecisionImportError::InvalidRow { line, message } => {
                write!(f, "decision sheet line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for DecisionImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecisionImportError::Io(err) => Some(err),
            DecisionImportError::Csv(err) => Some(err),
            DecisionImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for DecisionImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for DecisionImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct DecisionRow {
    #[serde(rename = "Application ID")]
    application_id: String,
    #[serde(rename = "Requirement")]
    requirement: String,
    #[serde(rename = "Outcome")]
    outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedDecision {
    line: usize,
    application_id: ApplicationId,
    requirement: RequirementKind,
    decision: DocumentDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DecisionRowResult {
    Applied { status: ApplicationStatus },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionImportRow {
    pub line: usize,
    pub application_id: ApplicationId,
    pub requirement: RequirementKind,
    pub decision: DocumentDecision,
    #[serde(flatten)]
    pub result: DecisionRowResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionImportSummary {
    pub applied: usize,
    pub failed: usize,
    pub rows: Vec<DecisionImportRow>,
}

pub struct DecisionImporter;

impl DecisionImporter {
    pub fn from_path<P, R, S>(
        path: P,
        service: &PassportApplicationService<R, S>,
    ) -> Result<DecisionImportSummary, DecisionImportError>
    where
        P: AsRef<Path>,
        R: ApplicationRepository + 'static,
        S: PassportRepository + 'static,
    {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, service)
    }

    pub fn from_reader<T, R, S>(
        reader: T,
        service: &PassportApplicationService<R, S>,
    ) -> Result<DecisionImportSummary, DecisionImportError>
    where
        T: Read,
        R: ApplicationRepository + 'static,
        S: PassportRepository + 'static,
    {
        let decisions = parse_decisions(reader)?;
        let mut rows = Vec::with_capacity(decisions.len());

        for parsed in decisions {
            let result = match service.decide_document(
                &parsed.application_id,
                &parsed.requirement,
                parsed.decision,
            ) {
                Ok(record) => DecisionRowResult::Applied {
                    status: record.status,
                },
                Err(err) => DecisionRowResult::Failed {
                    error: err.to_string(),
                },
            };
            rows.push(DecisionImportRow {
                line: parsed.line,
                application_id: parsed.application_id,
                requirement: parsed.requirement,
                decision: parsed.decision,
                result,
            });
        }

        let failed = rows
            .iter()
            .filter(|row| matches!(row.result, DecisionRowResult::Failed { .. }))
            .count();
        let summary = DecisionImportSummary {
            applied: rows.len() - failed,
            failed,
            rows,
        };
        info!(
            applied = summary.applied,
            failed = summary.failed,
            "decision sheet imported"
        );
        Ok(summary)
    }
}

fn parse_decisions<T: Read>(reader: T) -> Result<Vec<ParsedDecision>, DecisionImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut decisions = Vec::new();

    for (index, record) in csv_reader.deserialize::<DecisionRow>().enumerate() {
        let row = record?;
        // Header occupies line 1.
        let line = index + 2;

        if row.application_id.is_empty() {
            return Err(DecisionImportError::InvalidRow {
                line,
                message: "application id is empty".to_string(),
            });
        }
        if row.requirement.is_empty() {
            return Err(DecisionImportError::InvalidRow {
                line,
                message: "requirement is empty".to_string(),
            });
        }
        let decision = row
            .outcome
            .parse::<DocumentDecision>()
            .map_err(|message| DecisionImportError::InvalidRow { line, message })?;

        decisions.push(ParsedDecision {
            line,
            application_id: ApplicationId(row.application_id),
            requirement: RequirementKind::new(row.requirement),
            decision,
        });
    }

    Ok(decisions)
}
