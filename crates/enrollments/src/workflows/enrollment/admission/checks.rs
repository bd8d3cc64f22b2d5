use futures::future::try_join_all;
use tracing::{debug, warn};

use super::super::domain::{Rejection, RequirementRecord};
use crate::remote::{Discipline, DisciplineOutcome, Offering, RemoteError, RemoteFacade};

fn unverified(check: &'static str, reason: Rejection, error: &RemoteError) -> Rejection {
    warn!(check, %error, "collaborator unavailable, failing check closed");
    reason
}

pub(super) fn offering_exists(
    offering: &Result<Option<Offering>, RemoteError>,
) -> Result<(), Rejection> {
    match offering {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(Rejection::OfferingNotFound),
        Err(error) => Err(unverified(
            "offering existence",
            Rejection::OfferingNotFound,
            error,
        )),
    }
}

async fn approved_in_any_year(
    remote: &RemoteFacade,
    user: &str,
    years: &[i32],
    discipline: &str,
) -> Result<bool, RemoteError> {
    let outcomes = try_join_all(
        years
            .iter()
            .map(|&year| remote.discipline_outcome(user, year, discipline)),
    )
    .await?;
    Ok(outcomes.iter().flatten().any(DisciplineOutcome::is_approved))
}

/// Every prerequisite must be approved in some year of the student's history.
pub(super) async fn prerequisites_fulfilled(
    remote: &RemoteFacade,
    user: &str,
    discipline: &Result<Option<Discipline>, RemoteError>,
    years: &Result<Vec<i32>, RemoteError>,
) -> Result<(), Rejection> {
    const CHECK: &str = "prerequisite fulfillment";
    let reason = Rejection::PrerequisiteNotFulfilled;

    let discipline = match discipline {
        Ok(Some(discipline)) => discipline,
        Ok(None) => return Err(reason),
        Err(error) => return Err(unverified(CHECK, reason, error)),
    };

    let prerequisites: Vec<&str> = discipline.prerequisite_codes().collect();
    if prerequisites.is_empty() {
        return Ok(());
    }

    let years = years
        .as_ref()
        .map_err(|error| unverified(CHECK, reason, error))?;
    let fulfilled = try_join_all(
        prerequisites
            .iter()
            .map(|code| approved_in_any_year(remote, user, years, code)),
    )
    .await
    .map_err(|error| unverified(CHECK, reason, &error))?;

    if fulfilled.into_iter().all(|approved| approved) {
        Ok(())
    } else {
        Err(reason)
    }
}

pub(super) async fn not_already_approved(
    remote: &RemoteFacade,
    user: &str,
    discipline: &str,
    years: &Result<Vec<i32>, RemoteError>,
) -> Result<(), Rejection> {
    const CHECK: &str = "prior approval";
    let reason = Rejection::AlreadyApproved;

    let years = years
        .as_ref()
        .map_err(|error| unverified(CHECK, reason, error))?;
    match approved_in_any_year(remote, user, years, discipline).await {
        Ok(false) => Ok(()),
        Ok(true) => Err(reason),
        Err(error) => Err(unverified(CHECK, reason, &error)),
    }
}

/// Siblings are the other requirements of the enrollment with a different discipline.
pub(super) fn no_schedule_conflict(
    candidate: &Result<Option<Offering>, RemoteError>,
    siblings: &[(&RequirementRecord, Result<Option<Offering>, RemoteError>)],
) -> Result<(), Rejection> {
    const CHECK: &str = "schedule conflict";
    let reason = Rejection::TimeConflict;

    // A missing candidate offering is reported by the existence check.
    let candidate = match candidate {
        Ok(Some(offering)) => offering,
        Ok(None) => return Ok(()),
        Err(error) => return Err(unverified(CHECK, reason, error)),
    };

    for (sibling, offering) in siblings {
        match offering {
            Ok(Some(other)) if candidate.shares_slot_with(other) => {
                debug!(sibling = %sibling.code(), "offering schedules overlap");
                return Err(reason);
            }
            Ok(_) => {}
            Err(error) => return Err(unverified(CHECK, reason, error)),
        }
    }
    Ok(())
}

/// `window` is `None` when the write does not move the requirement to `quit`.
pub(super) fn quit_window(window: Option<bool>) -> Result<(), Rejection> {
    match window {
        Some(false) => Err(Rejection::OutsideQuitPeriod),
        Some(true) | None => Ok(()),
    }
}
