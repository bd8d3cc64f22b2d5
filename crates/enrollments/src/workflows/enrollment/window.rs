use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use crate::remote::{RemoteError, RemoteFacade};

/// Calendar intervals that gate enrollment and requirement transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarWindow {
    Enrollment,
    Cancellation,
    DisciplineQuit,
}

impl CalendarWindow {
    pub const ALL: [CalendarWindow; 3] = [
        CalendarWindow::Enrollment,
        CalendarWindow::Cancellation,
        CalendarWindow::DisciplineQuit,
    ];

    pub const fn start_event(self) -> &'static str {
        match self {
            CalendarWindow::Enrollment => "enrollment-starts",
            CalendarWindow::Cancellation => "cancellation-starts",
            CalendarWindow::DisciplineQuit => "discipline-quit-starts",
        }
    }

    pub const fn end_event(self) -> &'static str {
        match self {
            CalendarWindow::Enrollment => "enrollment-ends",
            CalendarWindow::Cancellation => "cancellation-ends",
            CalendarWindow::DisciplineQuit => "discipline-quit-ends",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CalendarWindow::Enrollment => "enrollment",
            CalendarWindow::Cancellation => "cancellation",
            CalendarWindow::DisciplineQuit => "discipline quit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("calendar event '{slug}' is not defined for {year}")]
    MissingEvent { year: i32, slug: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Decides whether an instant lies inside a calendar interval `[start, end)`.
#[derive(Debug, Clone)]
pub struct WindowGate {
    remote: RemoteFacade,
}

impl WindowGate {
    pub fn new(remote: RemoteFacade) -> Self {
        Self { remote }
    }

    pub async fn is_within_window(
        &self,
        at: DateTime<Utc>,
        year: i32,
        start_event: &str,
        end_event: &str,
    ) -> Result<bool, WindowError> {
        let (start, end) = futures::join!(
            self.remote.event(year, start_event),
            self.remote.event(year, end_event)
        );

        let start = start?.ok_or_else(|| WindowError::MissingEvent {
            year,
            slug: start_event.to_string(),
        })?;
        let end = end?.ok_or_else(|| WindowError::MissingEvent {
            year,
            slug: end_event.to_string(),
        })?;

        Ok(start.date <= at && at < end.date)
    }

    /// Window state for the calendar year of `at`.
    pub async fn is_open(&self, at: DateTime<Utc>, window: CalendarWindow) -> Result<bool, WindowError> {
        self.is_within_window(at, at.year(), window.start_event(), window.end_event())
            .await
    }

    /// Fail-closed variant: an unreachable calendar or a missing event never opens the window.
    pub async fn admits(&self, at: DateTime<Utc>, window: CalendarWindow) -> bool {
        match self.is_open(at, window).await {
            Ok(open) => open,
            Err(error) => {
                warn!(window = window.label(), %error, "unable to verify calendar window");
                false
            }
        }
    }
}
