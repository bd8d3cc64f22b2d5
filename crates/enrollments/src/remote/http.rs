use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::{
    Block, BlockRequirement, CalendarEvent, CalendarService, CatalogService, Discipline,
    DisciplineOutcome, History, HistoryService, Modality, Offering, RemoteError, RemoteFacade,
    CALENDAR, CATALOG, HISTORY,
};
use crate::config::RemoteConfig;

/// JSON-over-HTTP transport shared by the service clients.
#[derive(Debug, Clone)]
struct JsonClient {
    client: Client,
    base_url: Url,
    service: &'static str,
    timeout: Duration,
}

impl JsonClient {
    fn new(
        service: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| RemoteError::Transport {
                service,
                message: format!("'{raw}' is not a usable base url"),
            })?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Transport {
                service,
                message: err.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            service,
            timeout,
        })
    }

    /// Appends each value as a single percent-encoded path segment.
    ///
    /// `None` when a value could never name a resource (empty, `.` or `..`).
    fn url(&self, segments: &[&str], page: Option<u32>) -> Option<Url> {
        if segments
            .iter()
            .any(|segment| matches!(*segment, "" | "." | ".."))
        {
            return None;
        }

        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().ok()?;
            path.pop_if_empty();
            // Dot segments are dropped by the encoder, hence the check above.
            path.extend(segments);
        }
        if let Some(page) = page {
            url.query_pairs_mut()
                .append_pair("page", &page.to_string());
        }
        Some(url)
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, RemoteError> {
        match self.url(segments, None) {
            Some(url) => self.fetch(url).await,
            None => Ok(None),
        }
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        page: u32,
    ) -> Result<Vec<T>, RemoteError> {
        match self.url(segments, Some(page)) {
            Some(url) => Ok(self.fetch::<Vec<T>>(url).await?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, RemoteError> {
        let response = self.client.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                RemoteError::Timeout {
                    service: self.service,
                    elapsed_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                RemoteError::Transport {
                    service: self.service,
                    message: err.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                service: self.service,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|err| RemoteError::Decode {
                service: self.service,
                message: err.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    http: JsonClient,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            http: JsonClient::new(CATALOG, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn discipline(&self, code: &str) -> Result<Option<Discipline>, RemoteError> {
        self.http.get_optional(&["disciplines", code]).await
    }

    async fn offering(
        &self,
        discipline: &str,
        offering: &str,
    ) -> Result<Option<Offering>, RemoteError> {
        self.http
            .get_optional(&["disciplines", discipline, "offerings", offering])
            .await
    }

    async fn modality(
        &self,
        year: i32,
        course_modality: &str,
    ) -> Result<Option<Modality>, RemoteError> {
        let year = year.to_string();
        self.http
            .get_optional(&["catalogs", year.as_str(), "modalities", course_modality])
            .await
    }

    async fn blocks(
        &self,
        year: i32,
        course_modality: &str,
        page: u32,
    ) -> Result<Vec<Block>, RemoteError> {
        let year = year.to_string();
        self.http
            .get_page(
                &["catalogs", year.as_str(), "modalities", course_modality, "blocks"],
                page,
            )
            .await
    }

    async fn block_requirement(
        &self,
        year: i32,
        course_modality: &str,
        block: &str,
        discipline: &str,
    ) -> Result<Option<BlockRequirement>, RemoteError> {
        self.http
            .get_optional(&[
                "catalogs",
                year.to_string().as_str(),
                "modalities",
                course_modality,
                "blocks",
                block,
                "requirements",
                discipline,
            ])
            .await
    }
}

#[derive(Debug, Clone)]
pub struct HttpHistoryClient {
    http: JsonClient,
}

impl HttpHistoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            http: JsonClient::new(HISTORY, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl HistoryService for HttpHistoryClient {
    async fn histories(&self, user: &str, page: u32) -> Result<Vec<History>, RemoteError> {
        self.http
            .get_page(&["users", user, "histories"], page)
            .await
    }

    async fn current_history(&self, user: &str) -> Result<Option<History>, RemoteError> {
        self.http
            .get_optional(&["users", user, "current-history"])
            .await
    }

    async fn discipline_outcome(
        &self,
        user: &str,
        year: i32,
        discipline: &str,
    ) -> Result<Option<DisciplineOutcome>, RemoteError> {
        self.http
            .get_optional(&[
                "users",
                user,
                "histories",
                year.to_string().as_str(),
                "disciplines",
                discipline,
            ])
            .await
    }
}

#[derive(Debug, Clone)]
pub struct HttpCalendarClient {
    http: JsonClient,
}

impl HttpCalendarClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            http: JsonClient::new(CALENDAR, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl CalendarService for HttpCalendarClient {
    async fn event(&self, year: i32, slug: &str) -> Result<Option<CalendarEvent>, RemoteError> {
        let year = year.to_string();
        self.http
            .get_optional(&["calendars", year.as_str(), "events", slug])
            .await
    }
}

/// Build a facade backed by the HTTP clients for the configured service URLs.
pub fn http_facade(config: &RemoteConfig) -> Result<RemoteFacade, RemoteError> {
    let timeout = config.timeout();
    Ok(RemoteFacade::new(
        Arc::new(HttpCatalogClient::new(&config.courses_uri, timeout)?),
        Arc::new(HttpHistoryClient::new(&config.history_uri, timeout)?),
        Arc::new(HttpCalendarClient::new(&config.calendar_uri, timeout)?),
        timeout,
    ))
}
