// --- File: crates/slotwise_gcal/src/memory.rs ---
//! In-process calendar used when no Google credentials are configured, and by tests.

use chrono::{DateTime, Utc};
use slotwise_common::services::{
    BoxFuture, CalendarError, CalendarEvent, CalendarEventResult, CalendarService, NewEvent,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

type Store = HashMap<String, Vec<CalendarEvent>>;

/// Calendar held in memory, keyed by calendar id. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryCalendarService {
    events: Arc<Mutex<Store>>,
}

impl MemoryCalendarService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event directly, bypassing conflict checks.
    pub fn insert(&self, calendar_id: &str, event: CalendarEvent) -> Result<(), CalendarError> {
        let mut store = self.lock()?;
        let events = store.entry(calendar_id.to_string()).or_default();
        events.push(event);
        events.sort_by_key(|e| e.start);
        Ok(())
    }

    /// Snapshot of everything stored for a calendar.
    pub fn events(&self, calendar_id: &str) -> Vec<CalendarEvent> {
        self.lock()
            .map(|store| store.get(calendar_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, CalendarError> {
        self.events
            .lock()
            .map_err(|_| CalendarError::Unavailable("in-memory calendar poisoned".to_string()))
    }
}

fn validate(event: &NewEvent) -> Result<(), CalendarError> {
    if event.end <= event.start {
        return Err(CalendarError::InvalidEvent(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

impl CalendarService for MemoryCalendarService {
    fn list_events(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<CalendarEvent>, CalendarError> {
        let calendar_id = calendar_id.to_string();

        Box::pin(async move {
            let store = self.lock()?;
            let mut events: Vec<CalendarEvent> = store
                .get(&calendar_id)
                .map(|events| {
                    events
                        .iter()
                        .filter(|e| e.overlaps(start_time, end_time))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            events.sort_by_key(|e| e.start);
            Ok(events)
        })
    }

    fn create_event(
        &self,
        calendar_id: &str,
        event: NewEvent,
    ) -> BoxFuture<'_, CalendarEventResult, CalendarError> {
        let calendar_id = calendar_id.to_string();

        Box::pin(async move {
            validate(&event)?;
            let mut store = self.lock()?;
            let events = store.entry(calendar_id).or_default();

            if let Some(id) = event.event_id.as_deref() {
                if events.iter().any(|e| e.id == id) {
                    return Err(CalendarError::AlreadyExists(id.to_string()));
                }
            }
            if events
                .iter()
                .any(|e| e.busy && e.overlaps(event.start, event.end))
            {
                return Err(CalendarError::Conflict);
            }

            let id = event
                .event_id
                .unwrap_or_else(|| format!("mem{}", Uuid::new_v4().simple()));
            debug!("Creating in-memory event {} at {}", id, event.start);
            events.push(CalendarEvent {
                id: id.clone(),
                start: event.start,
                end: event.end,
                title: event.summary,
                busy: true,
            });
            events.sort_by_key(|e| e.start);

            Ok(CalendarEventResult {
                event_id: Some(id),
                status: "confirmed".to_string(),
            })
        })
    }

    fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: NewEvent,
    ) -> BoxFuture<'_, CalendarEventResult, CalendarError> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();

        Box::pin(async move {
            validate(&event)?;
            let mut store = self.lock()?;
            let events = store.entry(calendar_id).or_default();

            if events
                .iter()
                .any(|e| e.id != event_id && e.busy && e.overlaps(event.start, event.end))
            {
                return Err(CalendarError::Conflict);
            }
            let existing = events
                .iter_mut()
                .find(|e| e.id == event_id)
                .ok_or_else(|| CalendarError::NotFound(event_id.clone()))?;

            existing.start = event.start;
            existing.end = event.end;
            existing.title = event.summary;
            events.sort_by_key(|e| e.start);

            Ok(CalendarEventResult {
                event_id: Some(event_id),
                status: "confirmed".to_string(),
            })
        })
    }
}
