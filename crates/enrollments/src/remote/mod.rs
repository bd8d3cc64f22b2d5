//! Read-only query contracts for the catalog, history, and calendar services.
//!
//! Each service is a trait so the pipeline can run against HTTP clients in production and
//! in-memory fixtures in tests. [`RemoteFacade`] is what the pipeline actually talks to: it
//! bounds every call with the configured timeout and drains paged listings.

pub mod fixture;
pub mod http;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use fixture::{FixtureCalendar, FixtureCall, FixtureCatalog, FixtureHistory};
pub use http::{http_facade, HttpCalendarClient, HttpCatalogClient, HttpHistoryClient};

pub(crate) const CATALOG: &str = "catalog";
pub(crate) const HISTORY: &str = "history";
pub(crate) const CALENDAR: &str = "calendar";

/// Upper bound on pages drained from a paged listing. A listing still going past it is
/// reported as [`RemoteError::Truncated`] rather than returned partially.
const MAX_PAGES: u32 = 64;

/// Outcome status codes the history service uses for an approved discipline.
pub const APPROVED_OUTCOMES: [u16; 13] = [1, 2, 3, 4, 7, 10, 11, 12, 13, 14, 15, 16, 20];

/// Failure talking to one of the collaborating services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("{service} call timed out after {elapsed_ms}ms")]
    Timeout {
        service: &'static str,
        elapsed_ms: u64,
    },
    #[error("{service} transport failure: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} returned an undecodable payload: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error("{service} listing did not end within {pages} pages")]
    Truncated { service: &'static str, pages: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineRef {
    pub code: String,
}

/// Catalog record of a discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discipline {
    pub code: String,
    pub credits: u32,
    /// Prerequisite disciplines.
    #[serde(default)]
    pub requirements: Vec<DisciplineRef>,
}

impl Discipline {
    pub fn prerequisite_codes(&self) -> impl Iterator<Item = &str> {
        self.requirements.iter().map(|prerequisite| prerequisite.code.as_str())
    }
}

/// One weekly meeting of an offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub weekday: u8,
    pub hour: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub code: String,
}

/// Seats of an offering provisioned for a course cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub course: CourseRef,
    #[serde(rename = "yearCatalog", default)]
    pub catalog_year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub schedules: Vec<ScheduleSlot>,
}

impl Offering {
    pub fn shares_slot_with(&self, other: &Offering) -> bool {
        self.schedules
            .iter()
            .any(|slot| other.schedules.contains(slot))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modality {
    #[serde(rename = "creditLimit")]
    pub credit_limit: u32,
}

/// Curriculum classification of a catalog block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Required,
    Optional,
    Extra,
}

impl BlockType {
    pub const fn label(self) -> &'static str {
        match self {
            BlockType::Required => "required",
            BlockType::Optional => "optional",
            BlockType::Extra => "extra",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub code: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequirement {
    #[serde(rename = "suggestedSemester")]
    pub suggested_semester: i32,
}

/// A term of the student's academic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub year: i32,
    pub course: String,
    pub modality: String,
}

impl History {
    /// Key the catalog uses for a course's curriculum track.
    pub fn course_modality(&self) -> String {
        format!("{}-{}", self.course, self.modality)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineOutcome {
    pub status: u16,
}

impl DisciplineOutcome {
    pub fn is_approved(&self) -> bool {
        APPROVED_OUTCOMES.contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: DateTime<Utc>,
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn discipline(&self, code: &str) -> Result<Option<Discipline>, RemoteError>;
    async fn offering(
        &self,
        discipline: &str,
        offering: &str,
    ) -> Result<Option<Offering>, RemoteError>;
    async fn modality(
        &self,
        year: i32,
        course_modality: &str,
    ) -> Result<Option<Modality>, RemoteError>;
    /// One page of the modality's blocks; an empty page ends the listing.
    async fn blocks(
        &self,
        year: i32,
        course_modality: &str,
        page: u32,
    ) -> Result<Vec<Block>, RemoteError>;
    async fn block_requirement(
        &self,
        year: i32,
        course_modality: &str,
        block: &str,
        discipline: &str,
    ) -> Result<Option<BlockRequirement>, RemoteError>;
}

#[async_trait]
pub trait HistoryService: Send + Sync {
    /// One page of the student's term histories; an empty page ends the listing.
    async fn histories(&self, user: &str, page: u32) -> Result<Vec<History>, RemoteError>;
    async fn current_history(&self, user: &str) -> Result<Option<History>, RemoteError>;
    /// `None` means the student never took the discipline that year.
    async fn discipline_outcome(
        &self,
        user: &str,
        year: i32,
        discipline: &str,
    ) -> Result<Option<DisciplineOutcome>, RemoteError>;
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn event(&self, year: i32, slug: &str) -> Result<Option<CalendarEvent>, RemoteError>;
}

/// Typed, time-bounded accessors over the three collaborating services.
#[derive(Clone)]
pub struct RemoteFacade {
    catalog: Arc<dyn CatalogService>,
    history: Arc<dyn HistoryService>,
    calendar: Arc<dyn CalendarService>,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFacade")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteFacade {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        history: Arc<dyn HistoryService>,
        calendar: Arc<dyn CalendarService>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            history,
            calendar,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, service: &'static str, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                service,
                elapsed_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    pub async fn discipline(&self, code: &str) -> Result<Option<Discipline>, RemoteError> {
        self.bounded(CATALOG, self.catalog.discipline(code)).await
    }

    pub async fn offering(
        &self,
        discipline: &str,
        offering: &str,
    ) -> Result<Option<Offering>, RemoteError> {
        self.bounded(CATALOG, self.catalog.offering(discipline, offering))
            .await
    }

    pub async fn modality(
        &self,
        year: i32,
        course_modality: &str,
    ) -> Result<Option<Modality>, RemoteError> {
        self.bounded(CATALOG, self.catalog.modality(year, course_modality))
            .await
    }

    /// Every block of the modality, in catalog order.
    pub async fn blocks(&self, year: i32, course_modality: &str) -> Result<Vec<Block>, RemoteError> {
        let mut blocks = Vec::new();
        for page in 0..=MAX_PAGES {
            let batch = self
                .bounded(CATALOG, self.catalog.blocks(year, course_modality, page))
                .await?;
            if batch.is_empty() {
                return Ok(blocks);
            }
            blocks.extend(batch);
        }
        Err(RemoteError::Truncated {
            service: CATALOG,
            pages: MAX_PAGES,
        })
    }

    pub async fn block_requirement(
        &self,
        year: i32,
        course_modality: &str,
        block: &str,
        discipline: &str,
    ) -> Result<Option<BlockRequirement>, RemoteError> {
        self.bounded(
            CATALOG,
            self.catalog
                .block_requirement(year, course_modality, block, discipline),
        )
        .await
    }

    /// Every term history of the student.
    pub async fn histories(&self, user: &str) -> Result<Vec<History>, RemoteError> {
        let mut histories = Vec::new();
        for page in 0..=MAX_PAGES {
            let batch = self
                .bounded(HISTORY, self.history.histories(user, page))
                .await?;
            if batch.is_empty() {
                return Ok(histories);
            }
            histories.extend(batch);
        }
        Err(RemoteError::Truncated {
            service: HISTORY,
            pages: MAX_PAGES,
        })
    }

    pub async fn current_history(&self, user: &str) -> Result<Option<History>, RemoteError> {
        self.bounded(HISTORY, self.history.current_history(user))
            .await
    }

    pub async fn discipline_outcome(
        &self,
        user: &str,
        year: i32,
        discipline: &str,
    ) -> Result<Option<DisciplineOutcome>, RemoteError> {
        self.bounded(
            HISTORY,
            self.history.discipline_outcome(user, year, discipline),
        )
        .await
    }

    pub async fn event(&self, year: i32, slug: &str) -> Result<Option<CalendarEvent>, RemoteError> {
        self.bounded(CALENDAR, self.calendar.event(year, slug)).await
    }
}
