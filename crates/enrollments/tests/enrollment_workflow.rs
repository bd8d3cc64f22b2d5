//! Integration scenarios for a student's term enrollment, driven through the public service
//! facade against fixture collaborators.

mod common {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use enrollments::remote::{
        BlockType, FixtureCalendar, FixtureCatalog, FixtureHistory, RemoteFacade,
    };
    use enrollments::workflows::enrollment::{
        EnrollmentService, MemoryEnrollmentRepository, MemoryRequirementRepository,
    };

    pub const USER: &str = "183029";

    pub type Service = EnrollmentService<MemoryEnrollmentRepository, MemoryRequirementRepository>;

    pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 9, 30, 0)
            .single()
            .expect("valid instant")
    }

    pub fn remote() -> RemoteFacade {
        let catalog = FixtureCatalog::default()
            .with_discipline("MC102", 6, &[])
            .with_discipline("MC202", 6, &["MC102"])
            .with_discipline("MA141", 4, &[])
            .with_discipline("F315", 4, &[])
            .with_discipline("MC322", 4, &[])
            .with_offering("MC202", "2017-2-A", &[(2, 8), (4, 8)])
            .with_offering("MA141", "2017-2-A", &[(3, 10), (5, 10)])
            .with_offering("F315", "2017-2-B", &[(4, 8), (6, 8)])
            .with_offering("MC322", "2017-2-A", &[(6, 14)])
            .with_modality(2016, "34-AA", 12)
            .with_block(2016, "34-AA", "core", BlockType::Required)
            .with_block(2016, "34-AA", "electives", BlockType::Optional)
            .with_block_requirement(2016, "34-AA", "core", "MC202", 3)
            .with_block_requirement(2016, "34-AA", "electives", "MA141", 2);
        let history = FixtureHistory::default()
            .with_history(USER, 2016, "34", "AA")
            .with_outcome(USER, 2016, "MC102", 2);
        let calendar = FixtureCalendar::default()
            .with_event(2017, "enrollment-starts", at(2017, 7, 20))
            .with_event(2017, "enrollment-ends", at(2017, 8, 1))
            .with_event(2017, "cancellation-starts", at(2017, 7, 20))
            .with_event(2017, "cancellation-ends", at(2017, 8, 15))
            .with_event(2017, "discipline-quit-starts", at(2017, 8, 1))
            .with_event(2017, "discipline-quit-ends", at(2017, 9, 1));

        RemoteFacade::new(
            Arc::new(catalog),
            Arc::new(history),
            Arc::new(calendar),
            Duration::from_millis(500),
        )
    }

    pub fn service() -> Service {
        EnrollmentService::new(
            Arc::new(MemoryEnrollmentRepository::default()),
            Arc::new(MemoryRequirementRepository::default()),
            remote(),
        )
    }
}

use common::*;
use enrollments::workflows::enrollment::{
    CreditAssessment, EnrollmentServiceError, Field, Rejection, RequirementStatus,
    RequirementUpdate,
};

#[tokio::test]
async fn student_builds_a_term_and_quits_a_discipline() {
    let service = service();
    let enrollment = service
        .create_enrollment(USER, 2017, "2", at(2017, 7, 25))
        .await
        .expect("enrollment window is open");
    assert_eq!(enrollment.code(), "2017-2");

    // Second semester of 2017 for a 2016 student: user semester 4, ahead of neither block.
    let core = service
        .create_requirement(USER, "2017-2", "MC202", "2017-2-A", at(2017, 7, 25))
        .await
        .expect("prerequisite MC102 was approved");
    assert_eq!(core.requirement.priority, 7);
    assert_eq!(core.credits, CreditAssessment::Within { total: 6, limit: 12 });

    let elective = service
        .create_requirement(USER, "2017-2", "MA141", "2017-2-A", at(2017, 7, 26))
        .await
        .expect("no schedule overlap with MC202");
    assert_eq!(elective.requirement.priority, 4);

    let clash = service
        .create_requirement(USER, "2017-2", "F315", "2017-2-B", at(2017, 7, 26))
        .await;
    match clash {
        Err(EnrollmentServiceError::Rejected(rejections)) => {
            assert_eq!(
                rejections.get(Field::Offering),
                Some(Rejection::TimeConflict)
            );
        }
        other => panic!("expected time conflict, got {other:?}"),
    }

    let quit = service
        .update_requirement(
            USER,
            "2017-2",
            "MA141-2017-2-A",
            RequirementUpdate {
                discipline: "MA141".to_string(),
                offering: "2017-2-A".to_string(),
                status: Some(RequirementStatus::Quit),
                comment: None,
            },
            at(2017, 8, 10),
        )
        .await
        .expect("inside the quit window");
    assert_eq!(quit.requirement.status, RequirementStatus::Quit);

    let listed = service
        .list_requirements(USER, "2017-2")
        .expect("requirements listed");
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn credit_ceiling_flags_the_enrollment_until_it_is_deleted() {
    let service = service();
    service
        .create_enrollment(USER, 2017, "2", at(2017, 7, 25))
        .await
        .expect("enrollment window is open");

    for (discipline, offering) in [("MC202", "2017-2-A"), ("MA141", "2017-2-A")] {
        service
            .create_requirement(USER, "2017-2", discipline, offering, at(2017, 7, 25))
            .await
            .expect("requirement admitted");
    }
    let within = service
        .get_enrollment(USER, "2017-2")
        .expect("enrollment present");
    assert!(within.credit_raise_request.is_none());

    let over = service
        .create_requirement(USER, "2017-2", "MC322", "2017-2-A", at(2017, 7, 27))
        .await
        .expect("requirement admitted");
    assert_eq!(
        over.credits,
        CreditAssessment::Exceeded { total: 14, limit: 12 }
    );

    // Dropping back under the ceiling leaves the request for review.
    service
        .delete_requirement(USER, "2017-2", "MC322-2017-2-A")
        .await
        .expect("requirement removed");
    let flagged = service
        .get_enrollment(USER, "2017-2")
        .expect("enrollment present")
        .credit_raise_request
        .expect("request kept");
    assert_eq!(flagged.requested_credits, 14);
    assert_eq!(flagged.requested_at, at(2017, 7, 27));

    assert_eq!(
        service
            .delete_enrollment(USER, "2017-2")
            .await
            .expect("enrollment removed"),
        2
    );
    assert!(service.list_enrollments(USER).expect("list succeeds").is_empty());
}
