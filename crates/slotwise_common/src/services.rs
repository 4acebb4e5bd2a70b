//! Service abstractions for external services.
//!
//! The assistant talks to calendars only through [`CalendarService`], so providers can be
//! swapped (Google, in-memory) and failure modes injected in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Provider-neutral calendar failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Calendar provider rate limited the request: {0}")]
    RateLimited(String),
    #[error("Calendar credentials expired or were rejected: {0}")]
    AuthExpired(String),
    #[error("Booking conflict")]
    Conflict,
    /// A create carried a client-assigned id that the provider already holds.
    #[error("Event {0} already exists")]
    AlreadyExists(String),
    /// The request may or may not have been applied (transport failure, timeout).
    #[error("Calendar write outcome unknown: {0}")]
    Ambiguous(String),
    #[error("Calendar provider unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Event not found: {0}")]
    NotFound(String),
}

/// A trait for calendar service operations.
///
/// Reads list events overlapping a window; writes create or move a single event. Writes
/// are not idempotent on the provider side unless `NewEvent::event_id` is set.
pub trait CalendarService: Send + Sync {
    /// List events overlapping `[start_time, end_time)`, sorted by start.
    fn list_events(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<CalendarEvent>, CalendarError>;

    /// Create a calendar event.
    fn create_event(
        &self,
        calendar_id: &str,
        event: NewEvent,
    ) -> BoxFuture<'_, CalendarEventResult, CalendarError>;

    /// Move or retitle an existing calendar event.
    fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: NewEvent,
    ) -> BoxFuture<'_, CalendarEventResult, CalendarError>;
}

/// An event as read from the calendar. The calendar owns it; we only hold a copy per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// The ID of the event.
    pub id: String,
    /// The start time of the event.
    pub start: DateTime<Utc>,
    /// The end time of the event.
    pub end: DateTime<Utc>,
    /// The summary or title of the event.
    pub title: String,
    /// Whether the event blocks scheduling (transparent events do not).
    pub busy: bool,
}

impl CalendarEvent {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Data needed to write an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Client-assigned id; lets a retry detect that an earlier attempt already landed.
    pub event_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: String,
    pub description: Option<String>,
}

/// Represents the result of a calendar event operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventResult {
    /// The ID of the event.
    pub event_id: Option<String>,
    /// The status of the event.
    pub status: String,
}
