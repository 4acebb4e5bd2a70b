// --- File: crates/slotwise_assistant/src/test_support.rs ---
//! Builders shared by the unit tests. Dates are pinned to the week of Monday 2025-05-05.
#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use slotwise_common::CalendarEvent;

use crate::model::{Action, Constraints, SchedulingRequest};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// 2025-05-05 is a Monday; `day_offset` 1 is Tuesday and so on.
pub fn week(day_offset: u32, h: u32, mi: u32) -> DateTime<Utc> {
    utc(2025, 5, 5 + day_offset, h, mi)
}

pub fn clock(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn busy(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        start,
        end,
        title: format!("Event {}", id),
        busy: true,
    }
}

pub fn titled(id: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        title: title.to_string(),
        ..busy(id, start, end)
    }
}

pub fn working_hours() -> Constraints {
    Constraints {
        daily_start: Some(clock(9, 0)),
        daily_end: Some(clock(17, 0)),
        ..Constraints::default()
    }
}

/// UTC create request over `[earliest, latest]` with 09:00-17:00 daily bounds.
pub fn request(earliest: DateTime<Utc>, latest: DateTime<Utc>, minutes: i64) -> SchedulingRequest {
    request_in(Tz::UTC, earliest, latest, minutes, working_hours())
}

pub fn request_in(
    tz: Tz,
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    minutes: i64,
    constraints: Constraints,
) -> SchedulingRequest {
    SchedulingRequest::new(
        Action::Create,
        earliest,
        latest,
        tz,
        Duration::minutes(minutes),
        constraints,
        "Meeting",
    )
    .unwrap()
}

/// Monday 2025-05-05, 09:00-17:00 UTC.
pub fn monday_request(minutes: i64) -> SchedulingRequest {
    request(week(0, 9, 0), week(0, 17, 0), minutes)
}
