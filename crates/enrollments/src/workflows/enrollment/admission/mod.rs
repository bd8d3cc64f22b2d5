mod checks;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use super::domain::{
    Field, Rejection, Rejections, RequirementCode, RequirementId, RequirementRecord,
    RequirementStatus,
};
use super::window::{CalendarWindow, WindowGate};
use crate::remote::{History, RemoteFacade};

/// Requirement state a write is trying to persist.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub user: &'a str,
    /// Set when an existing requirement is being updated, so it never conflicts with itself.
    pub requirement: Option<RequirementId>,
    pub discipline: &'a str,
    pub offering: &'a str,
    /// Status the write moves the requirement to, if it changes it.
    pub incoming_status: Option<RequirementStatus>,
}

/// Runs every admission check for a candidate requirement and collects failures per field.
///
/// All checks run on every write. Independent lookups are fetched concurrently first; the
/// history-dependent checks run once the history listing is in. A collaborator that fails or
/// times out fails the check that needed it and nothing else.
#[derive(Debug, Clone)]
pub struct AdmissionValidator {
    remote: RemoteFacade,
    gate: WindowGate,
}

impl AdmissionValidator {
    pub fn new(remote: RemoteFacade) -> Self {
        let gate = WindowGate::new(remote.clone());
        Self { remote, gate }
    }

    /// `siblings` are the requirements currently stored under the candidate's enrollment.
    pub async fn validate(
        &self,
        candidate: &Candidate<'_>,
        siblings: &[RequirementRecord],
        at: DateTime<Utc>,
    ) -> Rejections {
        let mut rejections = Rejections::default();
        if candidate.discipline.trim().is_empty() {
            rejections.reject(Field::Discipline, Rejection::Required);
        } else if candidate.discipline.contains(RequirementCode::SEPARATOR) {
            // The requirement code could not be split back into its parts.
            rejections.reject(Field::Discipline, Rejection::Separator);
        }
        if candidate.offering.trim().is_empty() {
            rejections.reject(Field::Offering, Rejection::Required);
        }
        if !rejections.is_empty() {
            return rejections;
        }

        let others: Vec<&RequirementRecord> = siblings
            .iter()
            .filter(|sibling| Some(sibling.id) != candidate.requirement)
            .filter(|sibling| sibling.discipline != candidate.discipline)
            .collect();
        let quitting = candidate.incoming_status == Some(RequirementStatus::Quit);

        let (offering, discipline, histories, sibling_offerings, quit_window) = futures::join!(
            self.remote.offering(candidate.discipline, candidate.offering),
            self.remote.discipline(candidate.discipline),
            self.remote.histories(candidate.user),
            join_all(
                others
                    .iter()
                    .map(|sibling| self.remote.offering(&sibling.discipline, &sibling.offering))
            ),
            async {
                if quitting {
                    Some(self.gate.admits(at, CalendarWindow::DisciplineQuit).await)
                } else {
                    None
                }
            },
        );

        let years = histories.map(|histories| history_years(&histories));
        let (prerequisites, approval) = futures::join!(
            checks::prerequisites_fulfilled(&self.remote, candidate.user, &discipline, &years),
            checks::not_already_approved(&self.remote, candidate.user, candidate.discipline, &years),
        );

        let siblings: Vec<_> = others.into_iter().zip(sibling_offerings).collect();
        let verdicts = [
            (Field::Offering, checks::offering_exists(&offering)),
            (Field::Discipline, prerequisites),
            (Field::Discipline, approval),
            (
                Field::Offering,
                checks::no_schedule_conflict(&offering, &siblings),
            ),
            (Field::Status, checks::quit_window(quit_window)),
        ];

        for (field, verdict) in verdicts {
            if let Err(reason) = verdict {
                rejections.reject(field, reason);
            }
        }
        rejections
    }
}

fn history_years(histories: &[History]) -> Vec<i32> {
    histories
        .iter()
        .map(|history| history.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
