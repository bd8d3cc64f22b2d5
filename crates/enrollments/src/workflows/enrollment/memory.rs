//! Mutex-guarded in-memory stores backing the API server and the tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{EnrollmentId, EnrollmentKey, EnrollmentRecord, RequirementId, RequirementRecord};
use super::repository::{EnrollmentRepository, RepositoryError, RequirementRepository};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Debug, Default)]
pub struct MemoryEnrollmentRepository {
    records: Mutex<BTreeMap<EnrollmentId, EnrollmentRecord>>,
}

impl EnrollmentRepository for MemoryEnrollmentRepository {
    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&record.id) || records.values().any(|stored| stored.key == record.key)
        {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, record: EnrollmentRecord) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records)?;
        if !records.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        if records
            .values()
            .any(|stored| stored.id != record.id && stored.key == record.key)
        {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.id, record);
        Ok(())
    }

    fn fetch(&self, id: EnrollmentId) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        Ok(lock(&self.records)?.get(&id).cloned())
    }

    fn find_by_key(&self, key: &EnrollmentKey) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .find(|record| &record.key == key)
            .cloned())
    }

    fn list_for_user(&self, user: &str) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .filter(|record| record.key.user == user)
            .cloned()
            .collect())
    }

    fn remove(&self, id: EnrollmentId) -> Result<(), RepositoryError> {
        lock(&self.records)?
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRequirementRepository {
    records: Mutex<BTreeMap<RequirementId, RequirementRecord>>,
}

fn same_slot(left: &RequirementRecord, right: &RequirementRecord) -> bool {
    left.enrollment == right.enrollment
        && left.discipline == right.discipline
        && left.offering == right.offering
}

impl RequirementRepository for MemoryRequirementRepository {
    fn insert(&self, record: RequirementRecord) -> Result<RequirementRecord, RepositoryError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&record.id)
            || records.values().any(|stored| same_slot(stored, &record))
        {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, record: RequirementRecord) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records)?;
        match records.get(&record.id) {
            None => return Err(RepositoryError::NotFound),
            // The owning enrollment never changes.
            Some(stored) if stored.enrollment != record.enrollment => {
                return Err(RepositoryError::Conflict)
            }
            Some(_) => {}
        }
        if records
            .values()
            .any(|stored| stored.id != record.id && same_slot(stored, &record))
        {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.id, record);
        Ok(())
    }

    fn find_by_key(
        &self,
        enrollment: EnrollmentId,
        discipline: &str,
        offering: &str,
    ) -> Result<Option<RequirementRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .find(|record| {
                record.enrollment == enrollment
                    && record.discipline == discipline
                    && record.offering == offering
            })
            .cloned())
    }

    fn list_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Vec<RequirementRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .filter(|record| record.enrollment == enrollment)
            .cloned()
            .collect())
    }

    fn remove(&self, id: RequirementId) -> Result<(), RepositoryError> {
        lock(&self.records)?
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn remove_for_enrollment(&self, enrollment: EnrollmentId) -> Result<usize, RepositoryError> {
        let mut records = lock(&self.records)?;
        let before = records.len();
        records.retain(|_, record| record.enrollment != enrollment);
        Ok(before - records.len())
    }
}
