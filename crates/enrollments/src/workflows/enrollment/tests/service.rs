use super::common::*;
use crate::remote::FixtureCall;
use crate::workflows::enrollment::credits::CreditAssessment;
use crate::workflows::enrollment::domain::{
    CreditRaiseStatus, EnrollmentStatus, Field, Rejection, RequirementStatus,
};
use crate::workflows::enrollment::ranking::RankingError;
use crate::workflows::enrollment::repository::EnrollmentRepository;
use crate::workflows::enrollment::service::{
    EnrollmentServiceError, EnrollmentUpdate, RequirementUpdate,
};

fn rejection(result: Result<impl std::fmt::Debug, EnrollmentServiceError>, field: Field) -> Rejection {
    match result {
        Err(EnrollmentServiceError::Rejected(rejections)) => rejections
            .get(field)
            .unwrap_or_else(|| panic!("no rejection on {}: {rejections}", field.label())),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn enrollment_opens_only_inside_the_enrollment_window() {
    let (service, _, _) = build_service();

    let early = service.create_enrollment(USER, 2014, "1", at(2014, 2, 28)).await;
    assert_eq!(
        rejection(early, Field::CreatedAt),
        Rejection::OutsideEnrollmentPeriod
    );

    let late = service.create_enrollment(USER, 2014, "1", at(2014, 3, 20)).await;
    assert_eq!(
        rejection(late, Field::CreatedAt),
        Rejection::OutsideEnrollmentPeriod
    );

    let record = open_enrollment(&service).await;
    assert_eq!(record.code(), ENROLLMENT);
    assert_eq!(record.status, EnrollmentStatus::New);
}

#[tokio::test]
async fn enrollment_period_is_required() {
    let (service, _, _) = build_service();
    let result = service.create_enrollment(USER, 2014, "  ", now()).await;
    assert_eq!(rejection(result, Field::Period), Rejection::Required);
}

#[tokio::test]
async fn duplicate_enrollment_conflicts() {
    let (service, _, _) = build_service();
    open_enrollment(&service).await;

    assert!(matches!(
        service.create_enrollment(USER, 2014, "1", now()).await,
        Err(EnrollmentServiceError::Conflict)
    ));
    service
        .create_enrollment("222222", 2014, "1", now())
        .await
        .expect("another student may use the same term");
}

#[tokio::test]
async fn credit_raise_is_requested_once_the_ceiling_is_passed() {
    let (service, enrollments, _) = build_service();
    let enrollment = open_enrollment(&service).await;

    let first = service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("MC102 admitted");
    assert_eq!(first.requirement.priority, 7);
    assert_eq!(
        first.credits,
        CreditAssessment::Within { total: 6, limit: 10 }
    );
    let stored = enrollments
        .fetch(enrollment.id)
        .expect("fetch succeeds")
        .expect("enrollment present");
    assert!(stored.credit_raise_request.is_none());

    let second = service
        .create_requirement(USER, ENROLLMENT, "MA111", "2014-1-A", now())
        .await
        .expect("MA111 admitted");
    assert_eq!(second.requirement.priority, 8);
    assert_eq!(
        second.credits,
        CreditAssessment::Exceeded { total: 12, limit: 10 }
    );

    let request = service
        .get_enrollment(USER, ENROLLMENT)
        .expect("enrollment present")
        .credit_raise_request
        .expect("credit raise requested");
    assert_eq!(request.requested_credits, 12);
    assert_eq!(request.status, CreditRaiseStatus::Pending);
    assert_eq!(request.requested_at, now());
}

#[tokio::test]
async fn concurrent_requirement_writes_do_not_lose_the_credit_request() {
    let (service, _, requirements) = build_service();
    let enrollment = open_enrollment(&service).await;

    let (first, second) = tokio::join!(
        service.create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now()),
        service.create_requirement(USER, ENROLLMENT, "MA111", "2014-1-A", now()),
    );
    first.expect("MC102 admitted");
    second.expect("MA111 admitted");

    assert_eq!(requirement_count(&requirements, enrollment.id), 2);
    let request = service
        .get_enrollment(USER, ENROLLMENT)
        .expect("enrollment present")
        .credit_raise_request
        .expect("credit raise requested");
    assert_eq!(request.requested_credits, 12);
}

#[tokio::test]
async fn conflicting_schedule_is_rejected_and_not_stored() {
    let (service, _, requirements) = build_service();
    let enrollment = open_enrollment(&service).await;
    service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("MC102 admitted");

    let result = service
        .create_requirement(USER, ENROLLMENT, "F128", "2014-1-A", now())
        .await;
    assert_eq!(rejection(result, Field::Offering), Rejection::TimeConflict);
    assert_eq!(requirement_count(&requirements, enrollment.id), 1);
}

#[tokio::test]
async fn duplicate_requirement_conflicts() {
    let (service, _, _) = build_service();
    open_enrollment(&service).await;
    service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("MC102 admitted");

    assert!(matches!(
        service
            .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
            .await,
        Err(EnrollmentServiceError::Conflict)
    ));
}

#[tokio::test]
async fn requirement_under_unknown_enrollment_is_not_found() {
    let (service, _, _) = build_service();
    match service
        .create_requirement(USER, "2014-2", "MC102", "2014-1-A", now())
        .await
    {
        Err(EnrollmentServiceError::NotFound { entity, code }) => {
            assert_eq!(entity, "enrollment");
            assert_eq!(code, "2014-2");
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn quitting_follows_the_quit_window() {
    let (service, _, _) = build_service();
    open_enrollment(&service).await;
    service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("MC102 admitted");
    let quit = RequirementUpdate {
        discipline: "MC102".to_string(),
        offering: "2014-1-A".to_string(),
        status: Some(RequirementStatus::Quit),
        comment: Some("changing track".to_string()),
    };

    let late = service
        .update_requirement(USER, ENROLLMENT, "MC102-2014-1-A", quit.clone(), at(2014, 4, 15))
        .await;
    assert_eq!(rejection(late, Field::Status), Rejection::OutsideQuitPeriod);

    let write = service
        .update_requirement(USER, ENROLLMENT, "MC102-2014-1-A", quit, at(2014, 4, 14))
        .await
        .expect("quit inside the window");
    assert_eq!(write.requirement.status, RequirementStatus::Quit);
    assert_eq!(write.requirement.comment.as_deref(), Some("changing track"));
}

#[tokio::test]
async fn editing_a_quit_requirement_after_the_window_keeps_it_quit() {
    let (service, _, _) = build_service();
    open_enrollment(&service).await;
    service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("MC102 admitted");
    let quit = |comment: &str| RequirementUpdate {
        discipline: "MC102".to_string(),
        offering: "2014-1-A".to_string(),
        status: Some(RequirementStatus::Quit),
        comment: Some(comment.to_string()),
    };
    service
        .update_requirement(
            USER,
            ENROLLMENT,
            "MC102-2014-1-A",
            quit("changing track"),
            at(2014, 4, 14),
        )
        .await
        .expect("quit inside the window");

    let write = service
        .update_requirement(
            USER,
            ENROLLMENT,
            "MC102-2014-1-A",
            quit("moved to evening"),
            at(2014, 4, 20),
        )
        .await
        .expect("status unchanged, so the window is not consulted");
    assert_eq!(write.requirement.status, RequirementStatus::Quit);
    assert_eq!(write.requirement.comment.as_deref(), Some("moved to evening"));
}

#[tokio::test]
async fn dashed_discipline_is_never_stored() {
    let (service, _, requirements) = build_service();
    let enrollment = open_enrollment(&service).await;

    let refused = service
        .create_requirement(USER, ENROLLMENT, "MC-102", "2014-1-A", now())
        .await;
    assert_eq!(rejection(refused, Field::Discipline), Rejection::Separator);
    assert_eq!(requirement_count(&requirements, enrollment.id), 0);
}

#[tokio::test]
async fn update_moves_requirement_within_its_enrollment_and_rescores() {
    let (service, _, requirements) = build_service();
    let enrollment = open_enrollment(&service).await;
    let created = service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("MC102 admitted");

    let write = service
        .update_requirement(
            USER,
            ENROLLMENT,
            "MC102-2014-1-A",
            RequirementUpdate {
                discipline: "MC102".to_string(),
                offering: "2014-1-B".to_string(),
                status: None,
                comment: None,
            },
            now(),
        )
        .await
        .expect("move to the B offering");

    assert_eq!(write.requirement.id, created.requirement.id);
    assert_eq!(write.requirement.enrollment, enrollment.id);
    assert_eq!(write.requirement.priority, 3);
    assert_eq!(write.requirement.status, RequirementStatus::New);
    assert_eq!(requirement_count(&requirements, enrollment.id), 1);
    assert!(service
        .get_requirement(USER, ENROLLMENT, "MC102-2014-1-B")
        .is_ok());
    assert!(matches!(
        service.get_requirement(USER, ENROLLMENT, "MC102-2014-1-A"),
        Err(EnrollmentServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn cancelling_follows_the_cancellation_window() {
    let (service, _, _) = build_service();
    open_enrollment(&service).await;
    let cancel = EnrollmentUpdate {
        year: 2014,
        period: "1".to_string(),
        status: Some(EnrollmentStatus::Cancelled),
        justification: None,
    };

    let late = service
        .update_enrollment(USER, ENROLLMENT, cancel.clone(), at(2014, 4, 2))
        .await;
    assert_eq!(
        rejection(late, Field::Status),
        Rejection::OutsideCancellationPeriod
    );

    let record = service
        .update_enrollment(USER, ENROLLMENT, cancel, at(2014, 3, 25))
        .await
        .expect("cancel inside the window");
    assert_eq!(record.status, EnrollmentStatus::Cancelled);
    assert_eq!(record.updated_at, at(2014, 3, 25));
}

#[tokio::test]
async fn justification_attaches_to_the_pending_request() {
    let (service, _, _) = build_service();
    open_enrollment(&service).await;
    for (discipline, offering) in [("MC102", "2014-1-A"), ("MA111", "2014-1-A")] {
        service
            .create_requirement(USER, ENROLLMENT, discipline, offering, now())
            .await
            .expect("requirement admitted");
    }

    let record = service
        .update_enrollment(
            USER,
            ENROLLMENT,
            EnrollmentUpdate {
                year: 2014,
                period: "1".to_string(),
                status: None,
                justification: Some("last semester".to_string()),
            },
            now(),
        )
        .await
        .expect("update succeeds");

    let request = record.credit_raise_request.expect("request present");
    assert_eq!(request.justification.as_deref(), Some("last semester"));
    assert_eq!(request.requested_credits, 12);
}

#[tokio::test]
async fn deleting_an_enrollment_cascades_to_its_requirements() {
    let (service, _, requirements) = build_service();
    let enrollment = open_enrollment(&service).await;
    for (discipline, offering) in [("MC102", "2014-1-A"), ("MA111", "2014-1-A")] {
        service
            .create_requirement(USER, ENROLLMENT, discipline, offering, now())
            .await
            .expect("requirement admitted");
    }

    let removed = service
        .delete_enrollment(USER, ENROLLMENT)
        .await
        .expect("delete succeeds");

    assert_eq!(removed, 2);
    assert_eq!(requirement_count(&requirements, enrollment.id), 0);
    assert!(matches!(
        service.get_enrollment(USER, ENROLLMENT),
        Err(EnrollmentServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn deleting_a_requirement_leaves_its_siblings() {
    let (service, _, requirements) = build_service();
    let enrollment = open_enrollment(&service).await;
    for (discipline, offering) in [("MC102", "2014-1-A"), ("MA111", "2014-1-A")] {
        service
            .create_requirement(USER, ENROLLMENT, discipline, offering, now())
            .await
            .expect("requirement admitted");
    }

    service
        .delete_requirement(USER, ENROLLMENT, "MC102-2014-1-A")
        .await
        .expect("delete succeeds");

    let remaining = service
        .list_requirements(USER, ENROLLMENT)
        .expect("list succeeds");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].discipline, "MA111");
    assert_eq!(requirement_count(&requirements, enrollment.id), 1);
}

#[tokio::test]
async fn failed_aggregation_keeps_the_write() {
    let remote = facade(
        catalog().failing(FixtureCall::Modality),
        history(),
        calendar(),
    );
    let (service, _, requirements) = build_service_with(remote);
    let enrollment = open_enrollment(&service).await;

    let write = service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await
        .expect("write stands");

    assert_eq!(write.credits, CreditAssessment::Unverified);
    assert_eq!(requirement_count(&requirements, enrollment.id), 1);
}

#[tokio::test]
async fn failed_ranking_stores_nothing() {
    let remote = facade(
        catalog().failing(FixtureCall::Blocks),
        history(),
        calendar(),
    );
    let (service, _, requirements) = build_service_with(remote);
    let enrollment = open_enrollment(&service).await;

    let result = service
        .create_requirement(USER, ENROLLMENT, "MC102", "2014-1-A", now())
        .await;

    assert!(matches!(
        result,
        Err(EnrollmentServiceError::Unavailable(RankingError::Remote(_)))
    ));
    assert_eq!(requirement_count(&requirements, enrollment.id), 0);
}
