use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::passport::config::LifecycleConfig;
use crate::workflows::passport::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, DocumentDecision, DocumentRef,
    PassportDetails, PassportNumber, PassportType, PersonalInfo, RequirementKind,
};
use crate::workflows::passport::issuance::PassportNumberSource;
use crate::workflows::passport::memory::{
    InMemoryApplicationRepository, InMemoryPassportRepository,
};
use crate::workflows::passport::repository::{
    ApplicationRecord, ApplicationRepository, PassportRepository, RepositoryError,
};
use crate::workflows::passport::{application_router, PassportApplicationService};

pub(super) type MemoryService =
    PassportApplicationService<InMemoryApplicationRepository, InMemoryPassportRepository>;

pub(super) const REQUIRED: [&str; 4] = [
    "ID Proof",
    "Address Proof",
    "Photograph",
    "Birth Certificate",
];

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 15, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn kind(name: &str) -> RequirementKind {
    RequirementKind::new(name)
}

pub(super) fn submission() -> ApplicationSubmission {
    ApplicationSubmission {
        personal_info: PersonalInfo {
            full_name: "Anika Rao".to_string(),
            email: "anika.rao@example.com".to_string(),
            phone: "+91 98450 00000".to_string(),
            nationality: "Indian".to_string(),
            current_address: "123 Main St".to_string(),
            ..PersonalInfo::default()
        },
        passport_details: PassportDetails {
            passport_type: PassportType::Ordinary,
            purpose: "Tourism".to_string(),
        },
    }
}

pub(super) fn document(reference: &str) -> DocumentRef {
    DocumentRef {
        reference: reference.to_string(),
        size_bytes: 48_000,
        content_type: Some("application/pdf".to_string()),
    }
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryApplicationRepository>,
    Arc<InMemoryPassportRepository>,
) {
    let repository = Arc::new(InMemoryApplicationRepository::new());
    let passports = Arc::new(InMemoryPassportRepository::new());
    let service = PassportApplicationService::new(
        repository.clone(),
        passports.clone(),
        LifecycleConfig::default(),
    )
    .with_clock(fixed_now);
    (service, repository, passports)
}

pub(super) fn submit_all<R, P>(
    service: &PassportApplicationService<R, P>,
    id: &ApplicationId,
) -> ApplicationRecord
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    let mut last = None;
    for name in REQUIRED {
        let reference = format!("uploads/{}/{}.pdf", id, name.replace(' ', "-"));
        last = Some(
            service
                .submit_document(id, &kind(name), document(&reference))
                .expect("document accepted"),
        );
    }
    last.expect("at least one requirement")
}

/// Submits and verifies every required document, leaving the application `Verified`.
pub(super) fn verified_application<R, P>(
    service: &PassportApplicationService<R, P>,
) -> ApplicationId
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    let record = service.create(submission()).expect("application created");
    submit_all(service, &record.id);
    for name in REQUIRED {
        service
            .decide_document(&record.id, &kind(name), DocumentDecision::Verified)
            .expect("decision recorded");
    }
    assert_eq!(
        service.get_status(&record.id).expect("status"),
        ApplicationStatus::Verified
    );
    record.id
}

/// Hands out a fixed script of candidates, repeating the last one when exhausted.
pub(super) struct ScriptedNumbers {
    script: Mutex<VecDeque<&'static str>>,
    last: &'static str,
}

impl ScriptedNumbers {
    pub(super) fn new(script: &[&'static str]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            last: script.last().copied().unwrap_or("P00000000"),
        }
    }
}

impl PassportNumberSource for ScriptedNumbers {
    fn candidate(&self) -> PassportNumber {
        let next = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or(self.last);
        PassportNumber(next.to_string())
    }
}

/// Reports a stale version for the first `stale_updates` writes, as if another writer
/// got there first.
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryApplicationRepository,
    stale_updates: AtomicU32,
}

impl RacingRepository {
    pub(super) fn new(stale_updates: u32) -> Self {
        Self {
            inner: InMemoryApplicationRepository::new(),
            stale_updates: AtomicU32::new(stale_updates),
        }
    }
}

impl ApplicationRepository for RacingRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let remaining = self.stale_updates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.stale_updates.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::StaleVersion {
                expected: record.version,
                found: record.version + 1,
            });
        }
        self.inner.update(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list(status)
    }
}

/// Fails the next `fail_next_updates` writes as if the store dropped out briefly.
#[derive(Default)]
pub(super) struct FlakyRepository {
    inner: InMemoryApplicationRepository,
    failing_updates: AtomicU32,
}

impl FlakyRepository {
    pub(super) fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }
}

impl ApplicationRepository for FlakyRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let remaining = self.failing_updates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_updates.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("connection reset".to_string()));
        }
        self.inner.update(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list(status)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(
        &self,
        _status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    application_router(Arc::new(service))
}
