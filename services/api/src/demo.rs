use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use clap::Args;
use enrollments::config::AppConfig;
use enrollments::error::AppError;
use enrollments::remote::{
    http_facade, BlockType, FixtureCalendar, FixtureCatalog, FixtureHistory, RemoteFacade,
};
use enrollments::workflows::enrollment::{
    semester_index, CalendarWindow, EnrollmentService, EnrollmentServiceError,
    MemoryEnrollmentRepository, MemoryRequirementRepository, WindowGate,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEMO_COURSE: &str = "42";
const DEMO_MODALITY: &str = "AA";
const DEMO_CREDIT_LIMIT: u32 = 10;

#[derive(Args, Debug, Default)]
pub(crate) struct WindowsArgs {
    /// Instant to evaluate (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Instant the scripted requests are made at. Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Student identifier used for the scripted enrollment.
    #[arg(long, default_value = "183029")]
    pub(crate) user: String,
}

pub(crate) async fn run_windows(args: WindowsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let gate = WindowGate::new(http_facade(&config.remote)?);
    let at = args.at.unwrap_or_else(Utc::now);

    println!("Calendar windows at {}", at.to_rfc3339());
    for window in CalendarWindow::ALL {
        match gate.is_open(at, window).await {
            Ok(true) => println!("  {:<16} open", window.label()),
            Ok(false) => println!("  {:<16} closed", window.label()),
            Err(err) => println!("  {:<16} unverified ({})", window.label(), err),
        }
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let at = args.at.unwrap_or_else(Utc::now);
    let user = args.user.as_str();
    let year = at.year();
    let period = semester_index(at).to_string();
    let service = EnrollmentService::new(
        Arc::new(MemoryEnrollmentRepository::default()),
        Arc::new(MemoryRequirementRepository::default()),
        fixture_remote(user, at),
    );

    println!("Enrollment demo for student {user} at {}", at.to_rfc3339());
    let enrollment = match service.create_enrollment(user, year, &period, at).await {
        Ok(enrollment) => enrollment,
        Err(err) => {
            println!("  Enrollment refused: {}", describe(&err));
            return Ok(());
        }
    };
    let code = enrollment.code();
    println!("  Opened enrollment {code}");

    let script = [
        ("MC202", "A", "prerequisite MC102 already approved"),
        ("MA211", "A", "pushes the term over the credit ceiling"),
        ("F228", "A", "shares a Monday slot with MC202"),
        ("MC102", "A", "already approved"),
    ];
    for (discipline, offering, note) in script {
        println!("\n  Requesting {discipline}-{offering} ({note})");
        match service
            .create_requirement(user, &code, discipline, offering, at)
            .await
        {
            Ok(write) => {
                println!("    Priority: {}", write.requirement.priority);
                print_json("    Credits", &write.credits);
            }
            Err(err) => println!("    Refused: {}", describe(&err)),
        }
    }

    println!();
    match service.get_enrollment(user, &code) {
        Ok(enrollment) => print_json("  Final enrollment", &enrollment.view()),
        Err(err) => println!("  Enrollment lookup failed: {}", describe(&err)),
    }
    match service.list_requirements(user, &code) {
        Ok(requirements) => {
            let views: Vec<_> = requirements
                .iter()
                .map(|requirement| requirement.view(&code))
                .collect();
            print_json("  Requirements", &views);
        }
        Err(err) => println!("  Requirement listing failed: {}", describe(&err)),
    }
    Ok(())
}

fn describe(err: &EnrollmentServiceError) -> String {
    match err {
        EnrollmentServiceError::Rejected(rejections) => {
            serde_json::to_string(&rejections.payload()).unwrap_or_else(|_| err.to_string())
        }
        other => other.to_string(),
    }
}

fn print_json<T: Serialize>(label: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{label}:\n{json}"),
        Err(err) => println!("{label} unavailable: {err}"),
    }
}

/// Collaborators for a student admitted the year before `at`, with every window open around it.
fn fixture_remote(user: &str, at: DateTime<Utc>) -> RemoteFacade {
    let year = at.year();
    let catalog_year = year - 1;
    let course_modality = format!("{DEMO_COURSE}-{DEMO_MODALITY}");

    let catalog = FixtureCatalog::default()
        .with_discipline("MC102", 6, &[])
        .with_discipline("MC202", 6, &["MC102"])
        .with_discipline("MA211", 6, &[])
        .with_discipline("F228", 4, &[])
        .with_offering("MC102", "A", &[(3, 14), (5, 14)])
        .with_offering("MC202", "A", &[(2, 10), (4, 10)])
        .with_offering("MA211", "A", &[(3, 8), (5, 8)])
        .with_offering("F228", "A", &[(2, 10), (6, 14)])
        .with_reservation("MC202", "A", DEMO_COURSE, catalog_year)
        .with_modality(catalog_year, &course_modality, DEMO_CREDIT_LIMIT)
        .with_block(catalog_year, &course_modality, "core", BlockType::Required)
        .with_block(catalog_year, &course_modality, "electives", BlockType::Optional)
        .with_block_requirement(catalog_year, &course_modality, "core", "MC202", 2)
        .with_block_requirement(catalog_year, &course_modality, "electives", "MA211", 3);

    let history = FixtureHistory::default()
        .with_history(user, catalog_year, DEMO_COURSE, DEMO_MODALITY)
        .with_outcome(user, catalog_year, "MC102", 1);

    let opens = at - ChronoDuration::days(7);
    let closes = at + ChronoDuration::days(7);
    let calendar = CalendarWindow::ALL
        .into_iter()
        .fold(FixtureCalendar::default(), |calendar, window| {
            calendar
                .with_event(year, window.start_event(), opens)
                .with_event(year, window.end_event(), closes)
        });

    RemoteFacade::new(
        Arc::new(catalog),
        Arc::new(history),
        Arc::new(calendar),
        Duration::from_millis(500),
    )
}
