mod policy;

pub use policy::{priority_score, semester_index, user_semester};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::remote::{BlockType, History, Offering, RemoteError, RemoteFacade};

/// Inputs of the priority table, kept so a score can be explained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrioritySignals {
    pub block_type: BlockType,
    pub is_ahead: bool,
    pub is_reserved: bool,
}

impl PrioritySignals {
    pub fn score(&self) -> u8 {
        priority_score(self.block_type, self.is_ahead, self.is_reserved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankingError {
    #[error("student '{0}' has no academic history")]
    MissingHistory(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Scores admitted requirements from curriculum blocks and the student's cohort timing.
#[derive(Debug, Clone)]
pub struct RankScorer {
    remote: RemoteFacade,
}

impl RankScorer {
    pub fn new(remote: RemoteFacade) -> Self {
        Self { remote }
    }

    pub async fn signals(
        &self,
        user: &str,
        discipline: &str,
        offering: &str,
        at: DateTime<Utc>,
    ) -> Result<PrioritySignals, RankingError> {
        let (history, offering) = futures::join!(
            self.remote.current_history(user),
            self.remote.offering(discipline, offering)
        );
        let history = history?.ok_or_else(|| RankingError::MissingHistory(user.to_string()))?;
        let offering = offering?.unwrap_or_default();
        let course_modality = history.course_modality();

        let blocks = self.remote.blocks(history.year, &course_modality).await?;
        let requirements = try_join_all(blocks.iter().map(|block| {
            self.remote
                .block_requirement(history.year, &course_modality, &block.code, discipline)
        }))
        .await?;

        let matched = blocks
            .iter()
            .zip(requirements)
            .find_map(|(block, requirement)| requirement.map(|found| (block.block_type, found)));

        let signals = match matched {
            Some((block_type, requirement)) => PrioritySignals {
                block_type,
                is_ahead: is_ahead(&offering, &history),
                is_reserved: user_semester(at, history.year) < requirement.suggested_semester,
            },
            None => PrioritySignals {
                block_type: BlockType::Extra,
                is_ahead: is_ahead(&offering, &history),
                is_reserved: false,
            },
        };
        debug!(
            user,
            discipline,
            block_type = signals.block_type.label(),
            is_ahead = signals.is_ahead,
            is_reserved = signals.is_reserved,
            "priority signals computed"
        );
        Ok(signals)
    }

    pub async fn score(
        &self,
        user: &str,
        discipline: &str,
        offering: &str,
        at: DateTime<Utc>,
    ) -> Result<u8, RankingError> {
        Ok(self.signals(user, discipline, offering, at).await?.score())
    }
}

/// Offering seats provisioned for a later cohort of the student's own course.
fn is_ahead(offering: &Offering, history: &History) -> bool {
    offering.reservations.iter().any(|reservation| {
        reservation.course.code == history.course
            && reservation
                .catalog_year
                .map_or(false, |year| year > history.year)
    })
}
