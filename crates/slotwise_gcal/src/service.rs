// --- File: crates/slotwise_gcal/src/service.rs ---
//! Google Calendar implementation of the `CalendarService` trait.

use chrono::{DateTime, Utc};
use google_calendar3::api::{Event, EventDateTime, FreeBusyRequest, FreeBusyRequestItem};
use slotwise_common::services::{
    BoxFuture, CalendarError, CalendarEvent, CalendarEventResult, CalendarService, NewEvent,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::HubType;

/// Google Calendar service implementation.
pub struct GoogleCalendarService {
    calendar_hub: Arc<HubType>,
}

impl GoogleCalendarService {
    /// Create a new Google Calendar service.
    pub fn new(calendar_hub: Arc<HubType>) -> Self {
        Self { calendar_hub }
    }
}

/// Maps a Google API failure onto the provider-neutral taxonomy.
///
/// Transport-level failures are `Ambiguous`: the request may have reached Google.
pub fn map_api_error(err: google_calendar3::Error) -> CalendarError {
    match err {
        google_calendar3::Error::HttpError(e) => CalendarError::Ambiguous(e.to_string()),
        google_calendar3::Error::Io(e) => CalendarError::Ambiguous(e.to_string()),
        google_calendar3::Error::MissingToken(e) => CalendarError::AuthExpired(e.to_string()),
        google_calendar3::Error::BadRequest(body) => classify_error_body(&body),
        google_calendar3::Error::Failure(response) => {
            let status = response.status();
            classify_failure(Some(status.as_u16()), None, status.to_string())
        }
        other => CalendarError::Unavailable(other.to_string()),
    }
}

/// Reads the `{"error": {"code", "message", "errors": [{"reason"}]}}` body Google sends
/// with a non-success status.
pub fn classify_error_body(body: &serde_json::Value) -> CalendarError {
    let error = &body["error"];
    let status = error["code"].as_u64().and_then(|c| u16::try_from(c).ok());
    let reason = error["errors"][0]["reason"].as_str();
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    classify_failure(status, reason, message)
}

/// Classifies an API failure by its HTTP status and Google's error reason.
pub fn classify_failure(status: Option<u16>, reason: Option<&str>, message: String) -> CalendarError {
    match (status, reason) {
        (_, Some("rateLimitExceeded" | "userRateLimitExceeded" | "quotaExceeded")) => {
            CalendarError::RateLimited(message)
        }
        (_, Some("duplicate")) | (Some(409), _) => CalendarError::AlreadyExists(message),
        (Some(401), _) => CalendarError::AuthExpired(message),
        (Some(429), _) => CalendarError::RateLimited(message),
        (Some(404 | 410), _) => CalendarError::NotFound(message),
        (Some(400), _) => CalendarError::InvalidEvent(message),
        _ => CalendarError::Unavailable(message),
    }
}

/// Converts a Google event into our read model. All-day and cancelled events are skipped
/// by returning `None`, as are events with missing bounds.
fn to_calendar_event(event: Event) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }
    let start = event.start.as_ref().and_then(|s| s.date_time)?;
    let end = event.end.as_ref().and_then(|e| e.date_time)?;
    if end <= start {
        warn!("Skipping event {:?} with end before start", event.id);
        return None;
    }
    Some(CalendarEvent {
        id: event.id.unwrap_or_default(),
        start,
        end,
        title: event.summary.unwrap_or_default(),
        busy: event.transparency.as_deref() != Some("transparent"),
    })
}

fn to_google_event(event: NewEvent) -> Event {
    Event {
        id: event.event_id,
        summary: Some(event.summary),
        description: event.description,
        start: Some(EventDateTime {
            date_time: Some(event.start),
            time_zone: Some("UTC".to_string()), // Store event times in UTC
            ..Default::default()
        }),
        end: Some(EventDateTime {
            date_time: Some(event.end),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Busy periods from the free/busy endpoint, sorted by start.
async fn busy_periods(
    hub: &HubType,
    calendar_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, CalendarError> {
    let req = FreeBusyRequest {
        time_min: Some(start_time),
        time_max: Some(end_time),
        time_zone: Some("UTC".to_string()),
        items: Some(vec![FreeBusyRequestItem {
            id: Some(calendar_id.to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let (_response, freebusy_response) = hub
        .freebusy()
        .query(req)
        .doit()
        .await
        .map_err(map_api_error)?;

    let mut periods = Vec::new();
    if let Some(calendars) = freebusy_response.calendars {
        if let Some(busy) = calendars.get(calendar_id).and_then(|c| c.busy.as_ref()) {
            for period in busy {
                match (period.start, period.end) {
                    (Some(start), Some(end)) => periods.push((start, end)),
                    _ => debug!("Skipping busy period with missing start/end: {:?}", period),
                }
            }
        }
    }
    periods.sort_by_key(|p| p.0);
    Ok(periods)
}

impl CalendarService for GoogleCalendarService {
    fn list_events(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<CalendarEvent>, CalendarError> {
        let calendar_id = calendar_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let mut events = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let mut request = calendar_hub
                    .events()
                    .list(&calendar_id)
                    .time_min(start_time)
                    .time_max(end_time)
                    .single_events(true) // Expand recurring events
                    .order_by("startTime");
                if let Some(token) = page_token.as_deref() {
                    request = request.page_token(token);
                }

                let (_, page) = request.doit().await.map_err(map_api_error)?;
                events.extend(
                    page.items
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(to_calendar_event),
                );

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            events.sort_by_key(|e| e.start);
            Ok(events)
        })
    }

    /// Inserts the event after a free/busy check. A client-assigned `event_id` becomes
    /// the Google event id, so a duplicate insert surfaces as `AlreadyExists`.
    fn create_event(
        &self,
        calendar_id: &str,
        event: NewEvent,
    ) -> BoxFuture<'_, CalendarEventResult, CalendarError> {
        let calendar_id = calendar_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            if event.end <= event.start {
                return Err(CalendarError::InvalidEvent(
                    "End time must be after start time".to_string(),
                ));
            }

            let busy = busy_periods(&calendar_hub, &calendar_id, event.start, event.end).await?;
            // Check for overlap: (StartA < EndB) and (EndA > StartB)
            if busy
                .iter()
                .any(|(busy_start, busy_end)| event.start < *busy_end && event.end > *busy_start)
            {
                return Err(CalendarError::Conflict);
            }

            let requested_id = event.event_id.clone();
            let (_response, created_event) = calendar_hub
                .events()
                .insert(to_google_event(event), &calendar_id)
                .doit()
                .await
                .map_err(|e| match map_api_error(e) {
                    CalendarError::AlreadyExists(_) => {
                        CalendarError::AlreadyExists(requested_id.clone().unwrap_or_default())
                    }
                    other => other,
                })?;

            Ok(CalendarEventResult {
                event_id: created_event.id,
                status: created_event
                    .status
                    .unwrap_or_else(|| "confirmed".to_string()),
            })
        })
    }

    /// Moves an event with a patch. Busy periods belonging to the event itself are not
    /// visible through free/busy ids, so only the new range outside the old one is checked.
    fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: NewEvent,
    ) -> BoxFuture<'_, CalendarEventResult, CalendarError> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            if event.end <= event.start {
                return Err(CalendarError::InvalidEvent(
                    "End time must be after start time".to_string(),
                ));
            }

            let (_response, existing) = calendar_hub
                .events()
                .get(&calendar_id, &event_id)
                .doit()
                .await
                .map_err(map_api_error)?;
            let own_range = to_calendar_event(existing.clone()).map(|e| (e.start, e.end));

            let busy = busy_periods(&calendar_hub, &calendar_id, event.start, event.end).await?;
            let blocked = busy.iter().any(|(busy_start, busy_end)| {
                let overlaps = event.start < *busy_end && event.end > *busy_start;
                let is_self = own_range
                    .map(|(s, e)| s <= *busy_start && *busy_end <= e)
                    .unwrap_or(false);
                overlaps && !is_self
            });
            if blocked {
                return Err(CalendarError::Conflict);
            }

            let sequence = existing.sequence.map(|n| n + 1).unwrap_or(1);
            let patch = Event {
                id: None,
                sequence: Some(sequence),
                ..to_google_event(event)
            };

            let (_response, updated) = calendar_hub
                .events()
                .patch(patch, &calendar_id, &event_id)
                .doit()
                .await
                .map_err(map_api_error)?;

            Ok(CalendarEventResult {
                event_id: updated.id,
                status: updated.status.unwrap_or_else(|| "confirmed".to_string()),
            })
        })
    }
}
