use super::domain::{EnrollmentId, EnrollmentKey, EnrollmentRecord, RequirementId, RequirementRecord};

/// Storage abstraction for enrollments so the service can be exercised in isolation.
pub trait EnrollmentRepository: Send + Sync {
    /// Fails with `Conflict` when the (user, year, period) key is taken.
    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError>;
    fn update(&self, record: EnrollmentRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: EnrollmentId) -> Result<Option<EnrollmentRecord>, RepositoryError>;
    fn find_by_key(&self, key: &EnrollmentKey) -> Result<Option<EnrollmentRecord>, RepositoryError>;
    fn list_for_user(&self, user: &str) -> Result<Vec<EnrollmentRecord>, RepositoryError>;
    fn remove(&self, id: EnrollmentId) -> Result<(), RepositoryError>;
}

/// Storage abstraction for requirements, always addressed through their enrollment.
pub trait RequirementRepository: Send + Sync {
    /// Fails with `Conflict` when the enrollment already holds the (discipline, offering) pair.
    fn insert(&self, record: RequirementRecord) -> Result<RequirementRecord, RepositoryError>;
    fn update(&self, record: RequirementRecord) -> Result<(), RepositoryError>;
    fn find_by_key(
        &self,
        enrollment: EnrollmentId,
        discipline: &str,
        offering: &str,
    ) -> Result<Option<RequirementRecord>, RepositoryError>;
    fn list_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Vec<RequirementRecord>, RepositoryError>;
    fn remove(&self, id: RequirementId) -> Result<(), RepositoryError>;
    /// Removes every requirement of the enrollment, returning how many were dropped.
    fn remove_for_enrollment(&self, enrollment: EnrollmentId) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
