use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::credits::CreditAssessment;
use super::domain::RequirementView;
use super::ranking::RankingError;
use super::repository::{EnrollmentRepository, RequirementRepository};
use super::service::{
    EnrollmentService, EnrollmentServiceError, EnrollmentUpdate, RequirementUpdate,
    RequirementWrite,
};

/// Router builder exposing enrollment and requirement endpoints scoped to a user.
pub fn enrollment_router<E, R>(service: Arc<EnrollmentService<E, R>>) -> Router
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    Router::new()
        .route(
            "/users/:user/enrollments",
            get(list_enrollments_handler::<E, R>).post(create_enrollment_handler::<E, R>),
        )
        .route(
            "/users/:user/enrollments/:enrollment",
            get(get_enrollment_handler::<E, R>)
                .put(update_enrollment_handler::<E, R>)
                .delete(delete_enrollment_handler::<E, R>),
        )
        .route(
            "/users/:user/enrollments/:enrollment/requirements",
            get(list_requirements_handler::<E, R>).post(create_requirement_handler::<E, R>),
        )
        .route(
            "/users/:user/enrollments/:enrollment/requirements/:requirement",
            get(get_requirement_handler::<E, R>)
                .put(update_requirement_handler::<E, R>)
                .delete(delete_requirement_handler::<E, R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateEnrollmentRequest {
    year: i32,
    #[serde(default)]
    period: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequirementRequest {
    #[serde(default)]
    discipline: String,
    #[serde(default)]
    offering: String,
}

/// Requirement view plus the credit state left behind by the write.
#[derive(Debug, Serialize)]
struct RequirementWriteView {
    #[serde(flatten)]
    requirement: RequirementView,
    credits: CreditAssessment,
}

fn write_view(write: &RequirementWrite, enrollment: &str) -> RequirementWriteView {
    RequirementWriteView {
        requirement: write.requirement.view(enrollment),
        credits: write.credits,
    }
}

fn error_response(error: EnrollmentServiceError) -> Response {
    match error {
        EnrollmentServiceError::Rejected(rejections) => {
            (StatusCode::BAD_REQUEST, axum::Json(rejections.payload())).into_response()
        }
        EnrollmentServiceError::NotFound { .. } => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        EnrollmentServiceError::Conflict => {
            let payload = json!({
                "error": "record already exists",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        EnrollmentServiceError::Unavailable(RankingError::MissingHistory(_)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        EnrollmentServiceError::Unavailable(RankingError::Remote(_)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        EnrollmentServiceError::Repository(ref source) => {
            error!(error = %source, "enrollment store failure");
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn create_enrollment_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path(user): Path<String>,
    axum::Json(request): axum::Json<CreateEnrollmentRequest>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service
        .create_enrollment(&user, request.year, &request.period, Utc::now())
        .await
    {
        Ok(record) => (StatusCode::CREATED, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_enrollments_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path(user): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service.list_enrollments(&user) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_enrollment_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment)): Path<(String, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service.get_enrollment(&user, &enrollment) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_enrollment_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment)): Path<(String, String)>,
    axum::Json(update): axum::Json<EnrollmentUpdate>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service
        .update_enrollment(&user, &enrollment, update, Utc::now())
        .await
    {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_enrollment_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment)): Path<(String, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service.delete_enrollment(&user, &enrollment).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_requirement_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment)): Path<(String, String)>,
    axum::Json(request): axum::Json<CreateRequirementRequest>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service
        .create_requirement(
            &user,
            &enrollment,
            &request.discipline,
            &request.offering,
            Utc::now(),
        )
        .await
    {
        Ok(write) => {
            (StatusCode::CREATED, axum::Json(write_view(&write, &enrollment))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_requirements_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment)): Path<(String, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service.list_requirements(&user, &enrollment) {
        Ok(records) => {
            let views: Vec<_> = records
                .iter()
                .map(|record| record.view(&enrollment))
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_requirement_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment, requirement)): Path<(String, String, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service.get_requirement(&user, &enrollment, &requirement) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view(&enrollment))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_requirement_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment, requirement)): Path<(String, String, String)>,
    axum::Json(update): axum::Json<RequirementUpdate>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service
        .update_requirement(&user, &enrollment, &requirement, update, Utc::now())
        .await
    {
        Ok(write) => (StatusCode::OK, axum::Json(write_view(&write, &enrollment))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_requirement_handler<E, R>(
    State(service): State<Arc<EnrollmentService<E, R>>>,
    Path((user, enrollment, requirement)): Path<(String, String, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    R: RequirementRepository + 'static,
{
    match service
        .delete_requirement(&user, &enrollment, &requirement)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
