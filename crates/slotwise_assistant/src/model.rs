// --- File: crates/slotwise_assistant/src/model.rs ---
//! Structured scheduling requests and the slots offered for them.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Query,
    Reschedule,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Query => "query",
            Action::Reschedule => "reschedule",
        }
    }
}

/// Narrowing applied on top of the time window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    /// Local time of day before which nothing is offered.
    pub daily_start: Option<NaiveTime>,
    /// Local time of day after which nothing is offered. `None` means midnight.
    pub daily_end: Option<NaiveTime>,
    pub excluded_weekdays: Vec<Weekday>,
    pub excluded_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Constraints {
    pub fn exclude_weekday(&mut self, day: Weekday) {
        if !self.excluded_weekdays.contains(&day) {
            self.excluded_weekdays.push(day);
        }
    }

    pub fn exclude_interval(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        if start < end && !self.excluded_intervals.contains(&(start, end)) {
            self.excluded_intervals.push((start, end));
        }
    }
}

/// What the user asked for. Only built through [`SchedulingRequest::new`], so
/// `earliest <= latest` and `duration > 0` always hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingRequest {
    action: Action,
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    time_zone: Tz,
    duration: Duration,
    constraints: Constraints,
    title: String,
    reschedule_target: Option<String>,
    ignored_event_id: Option<String>,
}

impl SchedulingRequest {
    pub fn new(
        action: Action,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
        time_zone: Tz,
        duration: Duration,
        constraints: Constraints,
        title: impl Into<String>,
    ) -> Result<Self, SchedulingError> {
        if duration <= Duration::zero() {
            return Err(SchedulingError::AmbiguousIntent(
                "the meeting length must be more than zero minutes".to_string(),
            ));
        }
        if latest < earliest {
            return Err(SchedulingError::InvalidWindow(
                "the window ends before it starts".to_string(),
            ));
        }
        Ok(Self {
            action,
            earliest,
            latest,
            time_zone,
            duration,
            constraints,
            title: title.into(),
            reschedule_target: None,
            ignored_event_id: None,
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn earliest(&self) -> DateTime<Utc> {
        self.earliest
    }

    pub fn latest(&self) -> DateTime<Utc> {
        self.latest
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Title hint naming the event a reschedule should move.
    pub fn reschedule_target(&self) -> Option<&str> {
        self.reschedule_target.as_deref()
    }

    /// Event left out of the busy set (the one being moved).
    pub fn ignored_event_id(&self) -> Option<&str> {
        self.ignored_event_id.as_deref()
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_reschedule_target(mut self, hint: Option<String>) -> Self {
        self.reschedule_target = hint;
        self
    }

    pub fn with_ignored_event(mut self, event_id: Option<String>) -> Self {
        self.ignored_event_id = event_id;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Result<Self, SchedulingError> {
        if duration <= Duration::zero() {
            return Err(SchedulingError::AmbiguousIntent(
                "the meeting length must be more than zero minutes".to_string(),
            ));
        }
        self.duration = duration;
        Ok(self)
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Replaces the window, keeping everything else.
    pub fn with_window(
        mut self,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    ) -> Result<Self, SchedulingError> {
        if latest < earliest {
            return Err(SchedulingError::InvalidWindow(
                "the window ends before it starts".to_string(),
            ));
        }
        self.earliest = earliest;
        self.latest = latest;
        Ok(self)
    }

    /// First and last local calendar day the window touches.
    pub fn local_days(&self) -> (NaiveDate, NaiveDate) {
        let first = self.earliest.with_timezone(&self.time_zone);
        let last = self.latest.with_timezone(&self.time_zone);
        let mut last_day = last.date_naive();
        if last.time() == NaiveTime::MIN && self.latest > self.earliest {
            last_day = last_day.pred_opt().unwrap_or(last_day);
        }
        (first.date_naive(), last_day)
    }
}

/// A free slot offered to the user. Recomputed on every resolve, never stored on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CandidateSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &CandidateSlot) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Human label in the given zone, e.g. "Tue May 6, 14:00-14:30".
    pub fn label(&self, tz: Tz) -> String {
        let start = self.start.with_timezone(&tz);
        let end = self.end.with_timezone(&tz);
        if start.date_naive() == end.date_naive() {
            format!("{}-{}", start.format("%a %b %-d, %H:%M"), end.format("%H:%M"))
        } else {
            format!(
                "{} - {}",
                start.format("%a %b %-d, %H:%M"),
                end.format("%a %b %-d, %H:%M")
            )
        }
    }
}

/// Local wall-clock time to UTC. A time inside a DST gap moves forward by the gap.
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

/// Start of the local day after `date`, in UTC.
pub fn local_day_end(tz: Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    date.succ_opt()
        .and_then(|next| local_to_utc(tz, next, NaiveTime::MIN))
}
