use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde_json::Value;

use crate::remote::{BlockType, FixtureCalendar, FixtureCatalog, FixtureHistory, RemoteFacade};
use crate::workflows::enrollment::domain::{
    EnrollmentId, EnrollmentKey, EnrollmentRecord, RequirementId, RequirementRecord,
    RequirementStatus,
};
use crate::workflows::enrollment::memory::{MemoryEnrollmentRepository, MemoryRequirementRepository};
use crate::workflows::enrollment::repository::{
    EnrollmentRepository, RepositoryError, RequirementRepository,
};
use crate::workflows::enrollment::service::EnrollmentService;

pub(super) const USER: &str = "111111";
pub(super) const ENROLLMENT: &str = "2014-1";
pub(super) const COURSE_MODALITY: &str = "42-AA";

pub(super) type MemoryService =
    EnrollmentService<MemoryEnrollmentRepository, MemoryRequirementRepository>;

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid instant")
}

/// Reference instant inside every 2014 window of [`calendar`].
pub(super) fn now() -> DateTime<Utc> {
    at(2014, 3, 10)
}

/// Catalog for course 42, modality AA, catalog year 2013 (ceiling 10 credits).
///
/// MC102 and F128 share the Tuesday 10h slot; MA111 meets on other days.
pub(super) fn catalog() -> FixtureCatalog {
    FixtureCatalog::default()
        .with_discipline("MC001", 4, &[])
        .with_discipline("MC102", 6, &[])
        .with_discipline("MA111", 6, &[])
        .with_discipline("F128", 4, &[])
        .with_discipline("MC302", 4, &["MC001"])
        .with_discipline("MC404", 4, &["MC001", "MC202"])
        .with_offering("MC001", "2014-1-A", &[(6, 8)])
        .with_offering("MC102", "2014-1-A", &[(2, 10), (4, 10)])
        .with_offering("MC102", "2014-1-B", &[(2, 10), (4, 14)])
        .with_reservation("MC102", "2014-1-B", "42", 2014)
        .with_offering("MA111", "2014-1-A", &[(3, 8), (5, 8)])
        .with_offering("F128", "2014-1-A", &[(2, 10), (6, 14)])
        .with_offering("MC302", "2014-1-A", &[(3, 16)])
        .with_offering("MC404", "2014-1-A", &[(5, 16)])
        .with_modality(2013, COURSE_MODALITY, 10)
        .with_block(2013, COURSE_MODALITY, "B1", BlockType::Required)
        .with_block(2013, COURSE_MODALITY, "B2", BlockType::Optional)
        .with_block_requirement(2013, COURSE_MODALITY, "B1", "MC102", 2)
        .with_block_requirement(2013, COURSE_MODALITY, "B2", "MC102", 1)
        .with_block_requirement(2013, COURSE_MODALITY, "B2", "MA111", 4)
}

/// Student admitted in 2013 who passed MC001 and failed MC202 in their first year.
pub(super) fn history() -> FixtureHistory {
    FixtureHistory::default()
        .with_history(USER, 2012, "42", "AA")
        .with_history(USER, 2013, "42", "AA")
        .with_outcome(USER, 2012, "MC001", 1)
        .with_outcome(USER, 2012, "MC202", 5)
}

pub(super) fn calendar_for(year: i32) -> FixtureCalendar {
    FixtureCalendar::default()
        .with_event(year, "enrollment-starts", at(year, 3, 1))
        .with_event(year, "enrollment-ends", at(year, 3, 20))
        .with_event(year, "cancellation-starts", at(year, 3, 1))
        .with_event(year, "cancellation-ends", at(year, 4, 1))
        .with_event(year, "discipline-quit-starts", at(year, 3, 1))
        .with_event(year, "discipline-quit-ends", at(year, 4, 15))
}

pub(super) fn calendar() -> FixtureCalendar {
    calendar_for(2014)
}

/// Every window open for the whole current year, for handlers that stamp `Utc::now()`.
pub(super) fn open_calendar() -> FixtureCalendar {
    let year = Utc::now().year();
    let start = at(year, 1, 1) - chrono::Duration::days(1);
    let end = at(year + 1, 1, 2);
    FixtureCalendar::default()
        .with_event(year, "enrollment-starts", start)
        .with_event(year, "enrollment-ends", end)
        .with_event(year, "cancellation-starts", start)
        .with_event(year, "cancellation-ends", end)
        .with_event(year, "discipline-quit-starts", start)
        .with_event(year, "discipline-quit-ends", end)
}

pub(super) fn facade(
    catalog: FixtureCatalog,
    history: FixtureHistory,
    calendar: FixtureCalendar,
) -> RemoteFacade {
    RemoteFacade::new(
        Arc::new(catalog),
        Arc::new(history),
        Arc::new(calendar),
        Duration::from_millis(200),
    )
}

pub(super) fn remote() -> RemoteFacade {
    facade(catalog(), history(), calendar())
}

pub(super) fn build_service_with(
    remote: RemoteFacade,
) -> (
    MemoryService,
    Arc<MemoryEnrollmentRepository>,
    Arc<MemoryRequirementRepository>,
) {
    let enrollments = Arc::new(MemoryEnrollmentRepository::default());
    let requirements = Arc::new(MemoryRequirementRepository::default());
    let service = EnrollmentService::new(enrollments.clone(), requirements.clone(), remote);
    (service, enrollments, requirements)
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<MemoryEnrollmentRepository>,
    Arc<MemoryRequirementRepository>,
) {
    build_service_with(remote())
}

pub(super) async fn open_enrollment(service: &MemoryService) -> EnrollmentRecord {
    service
        .create_enrollment(USER, 2014, "1", now())
        .await
        .expect("enrollment opens inside the window")
}

pub(super) fn stored_requirement(
    id: u64,
    enrollment: EnrollmentId,
    discipline: &str,
    offering: &str,
) -> RequirementRecord {
    RequirementRecord {
        id: RequirementId(id),
        enrollment,
        discipline: discipline.to_string(),
        offering: offering.to_string(),
        status: RequirementStatus::New,
        comment: None,
        priority: 0,
        created_at: now(),
        updated_at: now(),
    }
}

pub(super) struct UnavailableEnrollments;

impl EnrollmentRepository for UnavailableEnrollments {
    fn insert(&self, _record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: EnrollmentRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: EnrollmentId) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_key(
        &self,
        _key: &EnrollmentKey,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_for_user(&self, _user: &str) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: EnrollmentId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn requirement_count(
    requirements: &MemoryRequirementRepository,
    enrollment: EnrollmentId,
) -> usize {
    requirements
        .list_for_enrollment(enrollment)
        .expect("list succeeds")
        .len()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
