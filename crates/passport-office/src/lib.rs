//! Passport office back end: application intake, document verification, issuance, and
//! dispatch tracking.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
