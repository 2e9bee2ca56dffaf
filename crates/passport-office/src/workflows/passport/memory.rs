use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{ApplicationId, ApplicationStatus, DispatchStatus, Passport, PassportNumber};
use super::repository::{
    ApplicationRecord, ApplicationRepository, DispatchConfirmation, PassportRepository,
    RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

/// Process-local application store. Each update is a compare-and-swap on `version`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != record.version {
            return Err(RepositoryError::StaleVersion {
                expected: record.version,
                found: stored.version,
            });
        }
        record.version += 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    fn list(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard
            .values()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct PassportTables {
    by_number: HashMap<PassportNumber, Passport>,
    by_application: HashMap<ApplicationId, PassportNumber>,
}

/// Process-local passport store with unique number and one-per-application constraints.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPassportRepository {
    tables: Arc<Mutex<PassportTables>>,
}

impl InMemoryPassportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PassportRepository for InMemoryPassportRepository {
    fn insert(&self, passport: Passport) -> Result<Passport, RepositoryError> {
        let mut guard = lock(&self.tables)?;
        if guard.by_number.contains_key(&passport.passport_number) {
            return Err(RepositoryError::DuplicatePassportNumber(
                passport.passport_number,
            ));
        }
        if guard.by_application.contains_key(&passport.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.by_application.insert(
            passport.application_id.clone(),
            passport.passport_number.clone(),
        );
        guard
            .by_number
            .insert(passport.passport_number.clone(), passport.clone());
        Ok(passport)
    }

    fn contains_number(&self, number: &PassportNumber) -> Result<bool, RepositoryError> {
        let guard = lock(&self.tables)?;
        Ok(guard.by_number.contains_key(number))
    }

    fn fetch(&self, number: &PassportNumber) -> Result<Option<Passport>, RepositoryError> {
        let guard = lock(&self.tables)?;
        Ok(guard.by_number.get(number).cloned())
    }

    fn fetch_for_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Passport>, RepositoryError> {
        let guard = lock(&self.tables)?;
        Ok(guard
            .by_application
            .get(id)
            .and_then(|number| guard.by_number.get(number))
            .cloned())
    }

    fn mark_dispatched(
        &self,
        number: &PassportNumber,
        confirmation: DispatchConfirmation,
    ) -> Result<Passport, RepositoryError> {
        let mut guard = lock(&self.tables)?;
        let passport = guard
            .by_number
            .get_mut(number)
            .ok_or(RepositoryError::NotFound)?;
        if passport.dispatch_status == DispatchStatus::Dispatched {
            return Err(RepositoryError::Conflict);
        }
        passport.dispatch_status = DispatchStatus::Dispatched;
        passport.delivery_address = Some(confirmation.delivery_address);
        passport.tracking_number = confirmation.tracking_number;
        passport.dispatched_at = Some(confirmation.dispatched_at);
        Ok(passport.clone())
    }

    fn list(&self) -> Result<Vec<Passport>, RepositoryError> {
        let guard = lock(&self.tables)?;
        let mut passports: Vec<_> = guard.by_number.values().cloned().collect();
        passports.sort_by(|a, b| a.passport_number.cmp(&b.passport_number));
        Ok(passports)
    }
}
