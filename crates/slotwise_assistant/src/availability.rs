// --- File: crates/slotwise_assistant/src/availability.rs ---
//! Availability resolution: the free time inside a request's window, cut into offers.
//!
//! Pure functions over the request, the events already on the calendar and the caller's
//! `now`. Identical inputs give identical output.

use chrono::{DateTime, Datelike, Duration, Utc};
use slotwise_common::CalendarEvent;
use tracing::debug;

use crate::error::SchedulingError;
use crate::model::{local_day_end, local_to_utc, CandidateSlot, SchedulingRequest};

type Interval = (DateTime<Utc>, DateTime<Utc>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Granularity of offered start times. `None` offers whole free segments.
    pub step: Option<Duration>,
    /// Earliest-first truncation. `None` keeps everything.
    pub display_limit: Option<usize>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            step: Some(Duration::minutes(30)),
            display_limit: None,
        }
    }
}

/// Fails with `InvalidWindow` when the whole window is at or before `now`.
pub fn check_window(
    request: &SchedulingRequest,
    now: DateTime<Utc>,
) -> Result<Interval, SchedulingError> {
    if request.latest() <= now {
        return Err(SchedulingError::InvalidWindow(
            "the requested time is already in the past".to_string(),
        ));
    }
    // A window that started earlier is clipped to now
    Ok((request.earliest().max(now), request.latest()))
}

/// Maximal free segments of the window that are at least `duration` long, in order.
pub fn free_segments(
    request: &SchedulingRequest,
    events: &[CalendarEvent],
    now: DateTime<Utc>,
) -> Result<Vec<CandidateSlot>, SchedulingError> {
    let window = check_window(request, now)?;
    let segments = day_segments(request, window);
    let busy = merged_busy(request, events);

    let mut free = Vec::new();
    let mut cursor = 0;
    for (seg_start, seg_end) in segments {
        // Busy intervals ending before this segment cannot touch later ones either
        while cursor < busy.len() && busy[cursor].1 <= seg_start {
            cursor += 1;
        }
        let mut start = seg_start;
        let mut i = cursor;
        while i < busy.len() && busy[i].0 < seg_end {
            let (busy_start, busy_end) = busy[i];
            if busy_start > start {
                free.push(CandidateSlot::new(start, busy_start));
            }
            start = start.max(busy_end);
            i += 1;
        }
        if start < seg_end {
            free.push(CandidateSlot::new(start, seg_end));
        }
    }

    free.retain(|slot| slot.duration() >= request.duration());
    Ok(free)
}

/// Candidate slots for a request, chronological and truncated to the display limit.
///
/// With a step, each free segment is enumerated into slots of exactly `duration` whose
/// starts sit on the step grid in local time. Consecutive starts are at least `duration`
/// apart, so offered slots never overlap each other.
pub fn resolve_slots(
    request: &SchedulingRequest,
    events: &[CalendarEvent],
    now: DateTime<Utc>,
    options: &ResolverOptions,
) -> Result<Vec<CandidateSlot>, SchedulingError> {
    let free = free_segments(request, events, now)?;
    let limit = options.display_limit.unwrap_or(usize::MAX);

    let mut slots = match options.step.filter(|s| *s > Duration::zero()) {
        None => free,
        Some(step) => {
            let duration = request.duration();
            let stride = stride_for(duration, step);
            let mut slots = Vec::new();
            'segments: for segment in &free {
                let mut start = align_up(segment.start, step, request);
                while start + duration <= segment.end {
                    slots.push(CandidateSlot::new(start, start + duration));
                    if slots.len() >= limit {
                        break 'segments;
                    }
                    start += stride;
                }
            }
            slots
        }
    };

    slots.sort();
    slots.truncate(limit);
    debug!(
        "Resolved {} candidate slot(s) for {} minute request",
        slots.len(),
        request.duration().num_minutes()
    );
    Ok(slots)
}

/// Smallest multiple of `step` that is at least `duration`.
fn stride_for(duration: Duration, step: Duration) -> Duration {
    let step_secs = step.num_seconds().max(1);
    let steps = (duration.num_seconds() + step_secs - 1) / step_secs;
    Duration::seconds(steps.max(1) * step_secs)
}

/// Rounds `instant` up onto the step grid counted from local midnight.
fn align_up(instant: DateTime<Utc>, step: Duration, request: &SchedulingRequest) -> DateTime<Utc> {
    let local = instant.with_timezone(&request.time_zone());
    let since_midnight = local.time().signed_duration_since(chrono::NaiveTime::MIN);
    let step_ms = step.num_milliseconds().max(1);
    let rem = since_midnight.num_milliseconds() % step_ms;
    if rem == 0 {
        instant
    } else {
        instant + Duration::milliseconds(step_ms - rem)
    }
}

/// The window cut into one segment per allowed local day, bounded by the daily limits.
fn day_segments(request: &SchedulingRequest, window: Interval) -> Vec<Interval> {
    let tz = request.time_zone();
    let constraints = request.constraints();
    let (window_start, window_end) = window;
    let mut day = window_start.with_timezone(&tz).date_naive();
    let last_day = window_end.with_timezone(&tz).date_naive();

    let mut segments = Vec::new();
    while day <= last_day {
        if !constraints.excluded_weekdays.contains(&day.weekday()) {
            let start = match constraints.daily_start {
                Some(t) => local_to_utc(tz, day, t),
                None => local_to_utc(tz, day, chrono::NaiveTime::MIN),
            };
            let end = match constraints.daily_end {
                Some(t) => local_to_utc(tz, day, t),
                None => local_day_end(tz, day),
            };
            if let (Some(start), Some(end)) = (start, end) {
                let start = start.max(window_start);
                let end = end.min(window_end);
                if start < end {
                    segments.push((start, end));
                }
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    segments
}

/// Busy events plus explicit exclusions, sorted and merged. Touching intervals merge too.
fn merged_busy(request: &SchedulingRequest, events: &[CalendarEvent]) -> Vec<Interval> {
    let ignored = request.ignored_event_id();
    let mut busy: Vec<Interval> = events
        .iter()
        .filter(|e| e.busy && e.end > e.start)
        .filter(|e| ignored != Some(e.id.as_str()))
        .map(|e| (e.start, e.end))
        .chain(
            request
                .constraints()
                .excluded_intervals
                .iter()
                .copied()
                .filter(|(s, e)| e > s),
        )
        .collect();
    busy.sort_by_key(|(start, _)| *start);

    let mut merged: Vec<Interval> = Vec::with_capacity(busy.len());
    for (start, end) in busy {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}
