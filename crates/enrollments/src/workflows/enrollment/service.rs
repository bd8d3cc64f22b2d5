use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use super::admission::{AdmissionValidator, Candidate};
use super::credits::{CreditAggregator, CreditAssessment, CreditError};
use super::domain::{
    EnrollmentCode, EnrollmentId, EnrollmentKey, EnrollmentRecord, EnrollmentStatus, Field,
    Rejection, Rejections, RequirementCode, RequirementId, RequirementRecord, RequirementStatus,
};
use super::ranking::{RankScorer, RankingError};
use super::repository::{EnrollmentRepository, RepositoryError, RequirementRepository};
use super::window::{CalendarWindow, WindowGate};
use crate::remote::RemoteFacade;

static ENROLLMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REQUIREMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_enrollment_id() -> EnrollmentId {
    EnrollmentId(ENROLLMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

fn next_requirement_id() -> RequirementId {
    RequirementId(REQUIREMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Replacement values for an enrollment.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentUpdate {
    pub year: i32,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
    /// Attached to the pending credit raise request, if there is one.
    #[serde(default)]
    pub justification: Option<String>,
}

/// Replacement values for a requirement. A missing `comment` clears the stored one.
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementUpdate {
    #[serde(default)]
    pub discipline: String,
    #[serde(default)]
    pub offering: String,
    #[serde(default)]
    pub status: Option<RequirementStatus>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Outcome of a persisted requirement write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementWrite {
    pub requirement: RequirementRecord,
    pub credits: CreditAssessment,
}

/// Serializes requirement writes per enrollment.
#[derive(Debug, Default)]
struct EnrollmentLocks {
    held: Mutex<HashMap<EnrollmentId, Arc<AsyncMutex<()>>>>,
}

impl EnrollmentLocks {
    fn for_enrollment(&self, id: EnrollmentId) -> Arc<AsyncMutex<()>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(held.entry(id).or_default())
    }

    fn forget(&self, id: EnrollmentId) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Service composing the window gate, admission validator, rank scorer, and credit aggregator
/// over the enrollment and requirement stores.
pub struct EnrollmentService<E, R> {
    enrollments: Arc<E>,
    requirements: Arc<R>,
    gate: WindowGate,
    validator: AdmissionValidator,
    scorer: RankScorer,
    credits: CreditAggregator,
    locks: EnrollmentLocks,
}

impl<E, R> EnrollmentService<E, R>
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    pub fn new(enrollments: Arc<E>, requirements: Arc<R>, remote: RemoteFacade) -> Self {
        Self {
            enrollments,
            requirements,
            gate: WindowGate::new(remote.clone()),
            validator: AdmissionValidator::new(remote.clone()),
            scorer: RankScorer::new(remote.clone()),
            credits: CreditAggregator::new(remote),
            locks: EnrollmentLocks::default(),
        }
    }

    pub fn gate(&self) -> &WindowGate {
        &self.gate
    }

    /// Open an enrollment for `user`; only allowed inside the enrollment window.
    pub async fn create_enrollment(
        &self,
        user: &str,
        year: i32,
        period: &str,
        at: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, EnrollmentServiceError> {
        let period = period.trim();
        let mut rejections = Rejections::default();
        if period.is_empty() {
            rejections.reject(Field::Period, Rejection::Required);
        }
        if !self.gate.admits(at, CalendarWindow::Enrollment).await {
            rejections.reject(Field::CreatedAt, Rejection::OutsideEnrollmentPeriod);
        }
        if !rejections.is_empty() {
            return Err(EnrollmentServiceError::Rejected(rejections));
        }

        let record = EnrollmentRecord {
            id: next_enrollment_id(),
            key: EnrollmentKey::new(user, year, period),
            status: EnrollmentStatus::New,
            credit_raise_request: None,
            created_at: at,
            updated_at: at,
        };
        let stored = self.enrollments.insert(record)?;
        info!(user, enrollment = %stored.code(), "enrollment created");
        Ok(stored)
    }

    pub fn get_enrollment(
        &self,
        user: &str,
        code: &str,
    ) -> Result<EnrollmentRecord, EnrollmentServiceError> {
        let key = EnrollmentCode::parse(code)
            .map(|parsed| parsed.key_for(user))
            .ok_or_else(|| EnrollmentServiceError::enrollment_not_found(code))?;
        self.enrollments
            .find_by_key(&key)?
            .ok_or_else(|| EnrollmentServiceError::enrollment_not_found(code))
    }

    pub fn list_enrollments(
        &self,
        user: &str,
    ) -> Result<Vec<EnrollmentRecord>, EnrollmentServiceError> {
        Ok(self.enrollments.list_for_user(user)?)
    }

    /// Replace year, period, status, and justification. Cancelling is gated by the
    /// cancellation window.
    pub async fn update_enrollment(
        &self,
        user: &str,
        code: &str,
        update: EnrollmentUpdate,
        at: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, EnrollmentServiceError> {
        let (mut record, _guard) = self.lock_enrollment(user, code).await?;

        let period = update.period.trim();
        let mut rejections = Rejections::default();
        if period.is_empty() {
            rejections.reject(Field::Period, Rejection::Required);
        }
        let cancelling = update.status == Some(EnrollmentStatus::Cancelled)
            && record.status != EnrollmentStatus::Cancelled;
        if cancelling && !self.gate.admits(at, CalendarWindow::Cancellation).await {
            rejections.reject(Field::Status, Rejection::OutsideCancellationPeriod);
        }
        if !rejections.is_empty() {
            return Err(EnrollmentServiceError::Rejected(rejections));
        }

        record.key = EnrollmentKey::new(user, update.year, period);
        if let Some(status) = update.status {
            record.status = status;
        }
        if let (Some(justification), Some(request)) =
            (update.justification, record.credit_raise_request.as_mut())
        {
            request.justification = Some(justification);
        }
        record.updated_at = at;

        self.enrollments.update(record.clone())?;
        info!(
            user,
            enrollment = %record.code(),
            status = record.status.label(),
            "enrollment updated"
        );
        Ok(record)
    }

    /// Remove an enrollment and every requirement under it; returns the requirement count.
    pub async fn delete_enrollment(
        &self,
        user: &str,
        code: &str,
    ) -> Result<usize, EnrollmentServiceError> {
        let (record, guard) = self.lock_enrollment(user, code).await?;

        let removed = self.requirements.remove_for_enrollment(record.id)?;
        self.enrollments.remove(record.id)?;
        drop(guard);
        self.locks.forget(record.id);

        info!(user, enrollment = %record.code(), requirements = removed, "enrollment deleted");
        Ok(removed)
    }

    pub fn get_requirement(
        &self,
        user: &str,
        enrollment_code: &str,
        code: &str,
    ) -> Result<RequirementRecord, EnrollmentServiceError> {
        let enrollment = self.get_enrollment(user, enrollment_code)?;
        self.find_requirement(&enrollment, code)
    }

    pub fn list_requirements(
        &self,
        user: &str,
        enrollment_code: &str,
    ) -> Result<Vec<RequirementRecord>, EnrollmentServiceError> {
        let enrollment = self.get_enrollment(user, enrollment_code)?;
        Ok(self.requirements.list_for_enrollment(enrollment.id)?)
    }

    /// Admit, rank, and persist a new requirement, then re-aggregate the enrollment's credits.
    pub async fn create_requirement(
        &self,
        user: &str,
        enrollment_code: &str,
        discipline: &str,
        offering: &str,
        at: DateTime<Utc>,
    ) -> Result<RequirementWrite, EnrollmentServiceError> {
        let (enrollment, _guard) = self.lock_enrollment(user, enrollment_code).await?;
        let discipline = discipline.trim();
        let offering = offering.trim();

        if self
            .requirements
            .find_by_key(enrollment.id, discipline, offering)?
            .is_some()
        {
            return Err(EnrollmentServiceError::Conflict);
        }

        let siblings = self.requirements.list_for_enrollment(enrollment.id)?;
        let candidate = Candidate {
            user,
            requirement: None,
            discipline,
            offering,
            incoming_status: None,
        };
        self.admit(&candidate, &siblings, at).await?;
        let priority = self.scorer.score(user, discipline, offering, at).await?;

        let record = RequirementRecord {
            id: next_requirement_id(),
            enrollment: enrollment.id,
            discipline: discipline.to_string(),
            offering: offering.to_string(),
            status: RequirementStatus::New,
            comment: None,
            priority,
            created_at: at,
            updated_at: at,
        };
        let stored = self.requirements.insert(record)?;
        info!(
            user,
            enrollment = %enrollment.code(),
            requirement = %stored.code(),
            priority,
            "requirement created"
        );

        let credits = self.refresh_credits(enrollment.id, user, at).await;
        Ok(RequirementWrite {
            requirement: stored,
            credits,
        })
    }

    /// Re-run admission and ranking against the new values, then persist and re-aggregate.
    pub async fn update_requirement(
        &self,
        user: &str,
        enrollment_code: &str,
        code: &str,
        update: RequirementUpdate,
        at: DateTime<Utc>,
    ) -> Result<RequirementWrite, EnrollmentServiceError> {
        let (enrollment, _guard) = self.lock_enrollment(user, enrollment_code).await?;
        let mut record = self.find_requirement(&enrollment, code)?;
        let discipline = update.discipline.trim();
        let offering = update.offering.trim();

        let siblings = self.requirements.list_for_enrollment(enrollment.id)?;
        let candidate = Candidate {
            user,
            requirement: Some(record.id),
            discipline,
            offering,
            // Only a status change is gated; repeating the stored status is not.
            incoming_status: update.status.filter(|status| *status != record.status),
        };
        self.admit(&candidate, &siblings, at).await?;
        let priority = self.scorer.score(user, discipline, offering, at).await?;

        record.discipline = discipline.to_string();
        record.offering = offering.to_string();
        if let Some(status) = update.status {
            record.status = status;
        }
        record.comment = update.comment;
        record.priority = priority;
        record.updated_at = at;

        self.requirements.update(record.clone())?;
        info!(
            user,
            enrollment = %enrollment.code(),
            requirement = %record.code(),
            status = record.status.label(),
            priority,
            "requirement updated"
        );

        let credits = self.refresh_credits(enrollment.id, user, at).await;
        Ok(RequirementWrite {
            requirement: record,
            credits,
        })
    }

    pub async fn delete_requirement(
        &self,
        user: &str,
        enrollment_code: &str,
        code: &str,
    ) -> Result<(), EnrollmentServiceError> {
        let (enrollment, _guard) = self.lock_enrollment(user, enrollment_code).await?;
        let record = self.find_requirement(&enrollment, code)?;
        self.requirements.remove(record.id)?;
        info!(
            user,
            enrollment = %enrollment.code(),
            requirement = %record.code(),
            "requirement deleted"
        );
        Ok(())
    }

    async fn lock_enrollment(
        &self,
        user: &str,
        code: &str,
    ) -> Result<(EnrollmentRecord, OwnedMutexGuard<()>), EnrollmentServiceError> {
        let found = self.get_enrollment(user, code)?;
        let guard = self.locks.for_enrollment(found.id).lock_owned().await;
        // Re-read under the lock; a concurrent write may have changed or removed it.
        let record = self
            .enrollments
            .fetch(found.id)?
            .ok_or_else(|| EnrollmentServiceError::enrollment_not_found(code))?;
        Ok((record, guard))
    }

    fn find_requirement(
        &self,
        enrollment: &EnrollmentRecord,
        code: &str,
    ) -> Result<RequirementRecord, EnrollmentServiceError> {
        let parsed = RequirementCode::parse(code)
            .ok_or_else(|| EnrollmentServiceError::requirement_not_found(code))?;
        self.requirements
            .find_by_key(enrollment.id, &parsed.discipline, &parsed.offering)?
            .ok_or_else(|| EnrollmentServiceError::requirement_not_found(code))
    }

    async fn admit(
        &self,
        candidate: &Candidate<'_>,
        siblings: &[RequirementRecord],
        at: DateTime<Utc>,
    ) -> Result<(), EnrollmentServiceError> {
        let rejections = self.validator.validate(candidate, siblings, at).await;
        if rejections.is_empty() {
            Ok(())
        } else {
            info!(
                user = candidate.user,
                discipline = candidate.discipline,
                offering = candidate.offering,
                %rejections,
                "requirement rejected"
            );
            Err(EnrollmentServiceError::Rejected(rejections))
        }
    }

    async fn refresh_credits(
        &self,
        enrollment: EnrollmentId,
        user: &str,
        at: DateTime<Utc>,
    ) -> CreditAssessment {
        match self.aggregate_credits(enrollment, user, at).await {
            Ok(assessment) => assessment,
            Err(error) => {
                warn!(user, %error, "credit aggregation failed, requirement write kept");
                CreditAssessment::Unverified
            }
        }
    }

    async fn aggregate_credits(
        &self,
        id: EnrollmentId,
        user: &str,
        at: DateTime<Utc>,
    ) -> Result<CreditAssessment, CreditError> {
        let requirements = self.requirements.list_for_enrollment(id)?;
        let assessment = self.credits.assess(user, &requirements).await?;

        let mut enrollment = self.enrollments.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        if CreditAggregator::apply(&mut enrollment, assessment, at) {
            enrollment.updated_at = at;
            self.enrollments.update(enrollment.clone())?;
            if let CreditAssessment::Exceeded { total, limit } = assessment {
                info!(
                    user,
                    enrollment = %enrollment.code(),
                    requested_credits = total,
                    credit_limit = limit,
                    "credit raise request pending"
                );
            }
        }
        Ok(assessment)
    }
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error("write rejected: {0}")]
    Rejected(Rejections),
    #[error("{entity} '{code}' not found")]
    NotFound { entity: &'static str, code: String },
    #[error("record already exists")]
    Conflict,
    #[error("unable to rank requirement: {0}")]
    Unavailable(#[from] RankingError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl EnrollmentServiceError {
    fn enrollment_not_found(code: &str) -> Self {
        EnrollmentServiceError::NotFound {
            entity: "enrollment",
            code: code.to_string(),
        }
    }

    fn requirement_not_found(code: &str) -> Self {
        EnrollmentServiceError::NotFound {
            entity: "requirement",
            code: code.to_string(),
        }
    }
}

impl From<RepositoryError> for EnrollmentServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict => EnrollmentServiceError::Conflict,
            other => EnrollmentServiceError::Repository(other),
        }
    }
}
