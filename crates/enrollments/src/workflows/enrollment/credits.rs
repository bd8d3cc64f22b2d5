use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;

use super::domain::{CreditRaiseRequest, CreditRaiseStatus, EnrollmentRecord, RequirementRecord};
use super::repository::RepositoryError;
use crate::remote::{RemoteError, RemoteFacade};

/// Credit load of an enrollment measured against the student's modality ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CreditAssessment {
    Within { total: u32, limit: u32 },
    Exceeded { total: u32, limit: u32 },
    /// Aggregation could not complete; the requirement write still stands.
    Unverified,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreditError {
    #[error("student '{0}' has no academic history")]
    MissingHistory(String),
    #[error("modality '{course_modality}' has no catalog entry for {year}")]
    MissingModality { year: i32, course_modality: String },
    #[error("discipline '{0}' is not in the catalog")]
    MissingDiscipline(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Sums requested credits and raises the pending flag when the ceiling is passed.
#[derive(Debug, Clone)]
pub struct CreditAggregator {
    remote: RemoteFacade,
}

impl CreditAggregator {
    pub fn new(remote: RemoteFacade) -> Self {
        Self { remote }
    }

    /// Credit ceiling of the student's current modality.
    pub async fn credit_limit(&self, user: &str) -> Result<u32, CreditError> {
        let history = self
            .remote
            .current_history(user)
            .await?
            .ok_or_else(|| CreditError::MissingHistory(user.to_string()))?;
        let course_modality = history.course_modality();
        let modality = self
            .remote
            .modality(history.year, &course_modality)
            .await?
            .ok_or(CreditError::MissingModality {
                year: history.year,
                course_modality,
            })?;
        Ok(modality.credit_limit)
    }

    /// Credits of every listed requirement, one catalog lookup per requirement.
    pub async fn total_credits(&self, requirements: &[RequirementRecord]) -> Result<u32, CreditError> {
        let credits = try_join_all(requirements.iter().map(|requirement| async move {
            self.remote
                .discipline(&requirement.discipline)
                .await?
                .map(|discipline| discipline.credits)
                .ok_or_else(|| CreditError::MissingDiscipline(requirement.discipline.clone()))
        }))
        .await?;
        Ok(credits.into_iter().sum())
    }

    pub async fn assess(
        &self,
        user: &str,
        requirements: &[RequirementRecord],
    ) -> Result<CreditAssessment, CreditError> {
        let (limit, total) =
            futures::try_join!(self.credit_limit(user), self.total_credits(requirements))?;
        if total > limit {
            Ok(CreditAssessment::Exceeded { total, limit })
        } else {
            Ok(CreditAssessment::Within { total, limit })
        }
    }

    /// Flag the enrollment when the assessment exceeds the ceiling; returns whether it changed.
    ///
    /// A flag raised earlier stays as it is when the load drops back under the ceiling.
    pub fn apply(
        enrollment: &mut EnrollmentRecord,
        assessment: CreditAssessment,
        at: DateTime<Utc>,
    ) -> bool {
        let CreditAssessment::Exceeded { total, .. } = assessment else {
            return false;
        };
        let justification = enrollment
            .credit_raise_request
            .take()
            .and_then(|request| request.justification);
        enrollment.credit_raise_request = Some(CreditRaiseRequest {
            requested_credits: total,
            requested_at: at,
            justification,
            status: CreditRaiseStatus::Pending,
        });
        true
    }
}
