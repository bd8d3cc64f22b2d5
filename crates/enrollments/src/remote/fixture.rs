//! In-memory stand-ins for the remote services.
//!
//! Fixtures answer from static tables and can be told to fail or stall specific calls, which
//! is how the fail-closed behavior of the pipeline is exercised.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    Block, BlockRequirement, BlockType, CalendarEvent, CalendarService, CatalogService, CourseRef,
    Discipline, DisciplineOutcome, DisciplineRef, History, HistoryService, Modality, Offering,
    RemoteError, Reservation, ScheduleSlot, CALENDAR, CATALOG, HISTORY,
};

const DEFAULT_PAGE_SIZE: usize = 20;

/// Remote operations a fixture can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureCall {
    Discipline,
    Offering,
    Modality,
    Blocks,
    BlockRequirement,
    Histories,
    CurrentHistory,
    DisciplineOutcome,
    Event,
}

#[derive(Debug, Default, Clone)]
struct Behavior {
    failures: HashSet<FixtureCall>,
    latency: Option<Duration>,
}

impl Behavior {
    async fn enter(&self, service: &'static str, call: FixtureCall) -> Result<(), RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failures.contains(&call) {
            return Err(RemoteError::Status {
                service,
                status: 503,
            });
        }
        Ok(())
    }
}

fn page_of<T: Clone>(items: &[T], page: u32, page_size: usize) -> Vec<T> {
    items
        .iter()
        .skip(page as usize * page_size)
        .take(page_size)
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
pub struct FixtureCatalog {
    disciplines: HashMap<String, Discipline>,
    offerings: HashMap<(String, String), Offering>,
    modalities: HashMap<(i32, String), Modality>,
    blocks: HashMap<(i32, String), Vec<Block>>,
    block_requirements: HashMap<(i32, String, String, String), BlockRequirement>,
    page_size: usize,
    behavior: Behavior,
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self {
            disciplines: HashMap::new(),
            offerings: HashMap::new(),
            modalities: HashMap::new(),
            blocks: HashMap::new(),
            block_requirements: HashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            behavior: Behavior::default(),
        }
    }
}

impl FixtureCatalog {
    pub fn with_discipline(mut self, code: &str, credits: u32, prerequisites: &[&str]) -> Self {
        self.disciplines.insert(
            code.to_string(),
            Discipline {
                code: code.to_string(),
                credits,
                requirements: prerequisites
                    .iter()
                    .map(|code| DisciplineRef {
                        code: code.to_string(),
                    })
                    .collect(),
            },
        );
        self
    }

    pub fn with_offering(mut self, discipline: &str, offering: &str, slots: &[(u8, u8)]) -> Self {
        self.offerings
            .entry((discipline.to_string(), offering.to_string()))
            .or_default()
            .schedules = slots
            .iter()
            .map(|&(weekday, hour)| ScheduleSlot { weekday, hour })
            .collect();
        self
    }

    /// Reserve seats of an offering for the cohort of `course` admitted in `catalog_year`.
    pub fn with_reservation(
        mut self,
        discipline: &str,
        offering: &str,
        course: &str,
        catalog_year: i32,
    ) -> Self {
        self.offerings
            .entry((discipline.to_string(), offering.to_string()))
            .or_default()
            .reservations
            .push(Reservation {
                course: CourseRef {
                    code: course.to_string(),
                },
                catalog_year: Some(catalog_year),
            });
        self
    }

    pub fn with_modality(mut self, year: i32, course_modality: &str, credit_limit: u32) -> Self {
        self.modalities.insert(
            (year, course_modality.to_string()),
            Modality { credit_limit },
        );
        self
    }

    pub fn with_block(
        mut self,
        year: i32,
        course_modality: &str,
        code: &str,
        block_type: BlockType,
    ) -> Self {
        self.blocks
            .entry((year, course_modality.to_string()))
            .or_default()
            .push(Block {
                code: code.to_string(),
                block_type,
            });
        self
    }

    pub fn with_block_requirement(
        mut self,
        year: i32,
        course_modality: &str,
        block: &str,
        discipline: &str,
        suggested_semester: i32,
    ) -> Self {
        self.block_requirements.insert(
            (
                year,
                course_modality.to_string(),
                block.to_string(),
                discipline.to_string(),
            ),
            BlockRequirement { suggested_semester },
        );
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn failing(mut self, call: FixtureCall) -> Self {
        self.behavior.failures.insert(call);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = Some(latency);
        self
    }
}

#[async_trait]
impl CatalogService for FixtureCatalog {
    async fn discipline(&self, code: &str) -> Result<Option<Discipline>, RemoteError> {
        self.behavior.enter(CATALOG, FixtureCall::Discipline).await?;
        Ok(self.disciplines.get(code).cloned())
    }

    async fn offering(
        &self,
        discipline: &str,
        offering: &str,
    ) -> Result<Option<Offering>, RemoteError> {
        self.behavior.enter(CATALOG, FixtureCall::Offering).await?;
        Ok(self
            .offerings
            .get(&(discipline.to_string(), offering.to_string()))
            .cloned())
    }

    async fn modality(
        &self,
        year: i32,
        course_modality: &str,
    ) -> Result<Option<Modality>, RemoteError> {
        self.behavior.enter(CATALOG, FixtureCall::Modality).await?;
        Ok(self
            .modalities
            .get(&(year, course_modality.to_string()))
            .copied())
    }

    async fn blocks(
        &self,
        year: i32,
        course_modality: &str,
        page: u32,
    ) -> Result<Vec<Block>, RemoteError> {
        self.behavior.enter(CATALOG, FixtureCall::Blocks).await?;
        Ok(self
            .blocks
            .get(&(year, course_modality.to_string()))
            .map(|blocks| page_of(blocks, page, self.page_size))
            .unwrap_or_default())
    }

    async fn block_requirement(
        &self,
        year: i32,
        course_modality: &str,
        block: &str,
        discipline: &str,
    ) -> Result<Option<BlockRequirement>, RemoteError> {
        self.behavior
            .enter(CATALOG, FixtureCall::BlockRequirement)
            .await?;
        Ok(self
            .block_requirements
            .get(&(
                year,
                course_modality.to_string(),
                block.to_string(),
                discipline.to_string(),
            ))
            .copied())
    }
}

#[derive(Debug, Clone)]
pub struct FixtureHistory {
    histories: HashMap<String, Vec<History>>,
    outcomes: HashMap<(String, i32, String), DisciplineOutcome>,
    page_size: usize,
    behavior: Behavior,
}

impl Default for FixtureHistory {
    fn default() -> Self {
        Self {
            histories: HashMap::new(),
            outcomes: HashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            behavior: Behavior::default(),
        }
    }
}

impl FixtureHistory {
    pub fn with_history(mut self, user: &str, year: i32, course: &str, modality: &str) -> Self {
        self.histories
            .entry(user.to_string())
            .or_default()
            .push(History {
                year,
                course: course.to_string(),
                modality: modality.to_string(),
            });
        self
    }

    pub fn with_outcome(mut self, user: &str, year: i32, discipline: &str, status: u16) -> Self {
        self.outcomes.insert(
            (user.to_string(), year, discipline.to_string()),
            DisciplineOutcome { status },
        );
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn failing(mut self, call: FixtureCall) -> Self {
        self.behavior.failures.insert(call);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = Some(latency);
        self
    }
}

#[async_trait]
impl HistoryService for FixtureHistory {
    async fn histories(&self, user: &str, page: u32) -> Result<Vec<History>, RemoteError> {
        self.behavior.enter(HISTORY, FixtureCall::Histories).await?;
        Ok(self
            .histories
            .get(user)
            .map(|histories| page_of(histories, page, self.page_size))
            .unwrap_or_default())
    }

    async fn current_history(&self, user: &str) -> Result<Option<History>, RemoteError> {
        self.behavior
            .enter(HISTORY, FixtureCall::CurrentHistory)
            .await?;
        Ok(self
            .histories
            .get(user)
            .and_then(|histories| histories.iter().max_by_key(|history| history.year))
            .cloned())
    }

    async fn discipline_outcome(
        &self,
        user: &str,
        year: i32,
        discipline: &str,
    ) -> Result<Option<DisciplineOutcome>, RemoteError> {
        self.behavior
            .enter(HISTORY, FixtureCall::DisciplineOutcome)
            .await?;
        Ok(self
            .outcomes
            .get(&(user.to_string(), year, discipline.to_string()))
            .copied())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureCalendar {
    events: HashMap<(i32, String), CalendarEvent>,
    behavior: Behavior,
}

impl FixtureCalendar {
    pub fn with_event(mut self, year: i32, slug: &str, date: DateTime<Utc>) -> Self {
        self.events
            .insert((year, slug.to_string()), CalendarEvent { date });
        self
    }

    pub fn failing(mut self, call: FixtureCall) -> Self {
        self.behavior.failures.insert(call);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = Some(latency);
        self
    }
}

#[async_trait]
impl CalendarService for FixtureCalendar {
    async fn event(&self, year: i32, slug: &str) -> Result<Option<CalendarEvent>, RemoteError> {
        self.behavior.enter(CALENDAR, FixtureCall::Event).await?;
        Ok(self.events.get(&(year, slug.to_string())).copied())
    }
}
