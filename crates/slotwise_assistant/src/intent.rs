// --- File: crates/slotwise_assistant/src/intent.rs ---
//! Intent extraction: free text to a structured [`SchedulingRequest`].
//!
//! Extraction is pure. The caller supplies the current time and zone; nothing here reads
//! a clock or performs I/O. [`IntentOracle`] is the seam a hosted language model would
//! plug into; [`RuleBasedOracle`] is the deterministic parser shipped by default.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use slotwise_common::CalendarEvent;
use tracing::debug;

use crate::error::SchedulingError;
use crate::model::{local_day_end, local_to_utc, Action, Constraints, SchedulingRequest};
use crate::phrases::{
    count_word, parse_time, parse_time_range, weekday_from_word, TIME, WEEKDAY,
};
use crate::settings::AssistantSettings;

/// Everything extraction may depend on besides the utterance.
#[derive(Debug, Clone, Copy)]
pub struct IntentContext<'a> {
    pub now: DateTime<Utc>,
    pub time_zone: Tz,
    pub settings: &'a AssistantSettings,
    /// Request currently being negotiated, used for defaults such as the duration.
    pub pending: Option<&'a SchedulingRequest>,
}

/// Result of reading a follow-up against the pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    /// Same days, narrower constraints.
    Narrowed(SchedulingRequest),
    /// The follow-up names a new day; it has to be extracted as a fresh request.
    StartOver,
    /// Nothing in the follow-up changes the request.
    Unchanged,
}

/// Natural-language understanding seam.
pub trait IntentOracle: Send + Sync {
    /// Reads a new request. Fails with `AmbiguousIntent` naming what is missing.
    fn extract(
        &self,
        utterance: &str,
        ctx: &IntentContext<'_>,
    ) -> Result<SchedulingRequest, SchedulingError>;

    /// Reads a follow-up as a narrowing of `pending`.
    fn refine(
        &self,
        utterance: &str,
        pending: &SchedulingRequest,
        ctx: &IntentContext<'_>,
    ) -> Result<Refinement, SchedulingError>;
}

/// Keyword and pattern based oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedOracle;

impl RuleBasedOracle {
    pub fn new() -> Self {
        Self
    }
}

const MONTH: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

/// Longest meeting the parser accepts.
const MAX_MEETING_MINUTES: i64 = 24 * 60;
/// Furthest "in N days" may reach.
const MAX_DAYS_AHEAD: i64 = 5 * 366;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("intent pattern should compile - this is a bug")
}

static RESCHEDULE_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:reschedul\w*|move|moving|push|postpon\w*)\b"));
static QUERY_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:free|available|availability|open)\b"));
static CREATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:book|schedule|set up|setup|arrange|add|plan|need|put in)\b")
});
static HINT_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"\b(?:reschedule|move|push|postpone)\s+(?:back\s+)?(.+?)(?:\s+(?:to|for|on|until|till|from|into|at|by|next|this|tomorrow|today|in)\b|[.,!?]|$)",
    )
});
// Runs on the original casing so names keep their capitals
static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\bwith\s+([A-Z][A-Za-z'-]*(?:\s+[A-Z][A-Za-z'-]*)?)"));
static NOUN_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(call|lunch|coffee|dinner|breakfast|interview|sync|standup|review|demo|catch-up|appointment|session|chat|meeting)\b")
});

static EXCLUDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(?:not on|not|except(?: on)?|excluding|but not|no)\s+((?:{wd})s?(?:\s*(?:,|and|or|nor)\s*(?:on\s+)?(?:{wd})s?)*)",
        wd = WEEKDAY
    ))
});
static WEEKDAY_WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"\b(?:{})s?\b", WEEKDAY)));
static NOT_AT_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"\bnot at\s+({})", TIME)));

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\b(\d{4})-(\d{2})-(\d{2})\b"));
static MONTH_DAY_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b",
        MONTH
    ))
});
static DAY_MONTH_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({})\b",
        MONTH
    ))
});

static HALF_HOUR_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:an?\s+)?half(?:\s+an?)?\s+hour\b"));
static AN_HOUR_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:an?|one)\s+hour(\s+and\s+a\s+half)?\b"));
static HOURS_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(\d+(?:\.\d+)?)\s*-?\s*(?:hours?|hrs?|h)\b"));
static MINUTES_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(\d+)\s*-?\s*(?:minutes?|mins?|m)\b"));

static DAY_AFTER_TOMORROW_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:the\s+)?day after tomorrow\b"));
static TOMORROW_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\btomorrow\b"));
static TODAY_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:today|this (morning|afternoon|evening))\b"));
static TONIGHT_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\btonight\b"));
static IN_DAYS_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\bin\s+(\d+|an?|one|two|three|four|five|six|seven|ten)\s+(days?|weeks?)\b")
});
static THIS_WEEK_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\b(?:this|the rest of the) week\b"));
static NEXT_WEEK_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\bnext week\b"));
static WEEKDAY_ANCHOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(?:(this|next|coming|on)\s+)?({})\b",
        WEEKDAY
    ))
});

static PART_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\b(morning|afternoon|evening)s?\b"));
static RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(?:between|from)\s+({t})\s*(?:and|to|until|till|-)\s*({t})",
        t = TIME
    ))
});
static BARE_RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*-\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm))\b")
});
static NOT_BEFORE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"\b(?:not before|no earlier than)\s+({})", TIME))
});
static NOT_AFTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"\b(?:not after|no later than)\s+({})", TIME))
});
static AFTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(?:after|from|starting at|starting|since)\s+({})",
        TIME
    ))
});
static BEFORE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"\b(?:before|by|until|till|up to)\s+({})", TIME))
});
static AT_REGEX: Lazy<Regex> = Lazy::new(|| compile(&format!(r"(?:\bat|@)\s*({})", TIME)));
static STANDALONE_TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(\d{1,2}(?::\d{2})?\s*(?:am|pm)|\d{1,2}:\d{2})\b"));
static EARLIER_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\bearlier\b"));
static LATER_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\blater\b"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DaySpan {
    first: NaiveDate,
    last: NaiveDate,
    /// A single named day: the working week does not apply to it.
    single: bool,
}

impl DaySpan {
    fn day(date: NaiveDate) -> Self {
        Self {
            first: date,
            last: date,
            single: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Earlier,
    Later,
}

/// Everything recognised in one utterance.
#[derive(Debug, Default)]
struct Parsed {
    action: Option<Action>,
    days: Option<DaySpan>,
    part: Option<(NaiveTime, NaiveTime)>,
    at: Option<NaiveTime>,
    after: Option<NaiveTime>,
    before: Option<NaiveTime>,
    not_at: Vec<NaiveTime>,
    duration: Option<Duration>,
    excluded: Vec<Weekday>,
    shift: Option<Shift>,
    title_noun: Option<String>,
    title_name: Option<String>,
    reschedule_hint: Option<String>,
    /// A number the user gave that no calendar can satisfy.
    out_of_range: Option<SchedulingError>,
}

impl Parsed {
    fn narrows(&self) -> bool {
        self.part.is_some()
            || self.at.is_some()
            || self.after.is_some()
            || self.before.is_some()
            || self.duration.is_some()
            || self.shift.is_some()
            || !self.not_at.is_empty()
            || !self.excluded.is_empty()
    }

    fn title(&self, default: &str) -> Option<String> {
        match (&self.title_noun, &self.title_name) {
            (Some(noun), Some(name)) => Some(format!("{} with {}", noun, name)),
            (Some(noun), None) => Some(noun.clone()),
            (None, Some(name)) => Some(format!("{} with {}", default, name)),
            (None, None) => None,
        }
    }
}

/// Captures of every match, after which the matched text is blanked out so later
/// patterns cannot read the same words twice.
fn take(re: &Regex, text: &mut String) -> Vec<Vec<Option<String>>> {
    let found: Vec<Vec<Option<String>>> = re
        .captures_iter(text)
        .map(|caps| {
            caps.iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect()
        })
        .collect();
    if !found.is_empty() {
        let replaced = re.replace_all(text, " ").into_owned();
        *text = replaced;
    }
    found
}

fn group(caps: &[Option<String>], index: usize) -> Option<&str> {
    caps.get(index).and_then(|g| g.as_deref())
}

fn first_time(re: &Regex, text: &mut String) -> Option<NaiveTime> {
    take(re, text)
        .iter()
        .find_map(|caps| group(caps, 1).and_then(|t| parse_time(t, None)))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn month_number(word: &str) -> Option<u32> {
    let month = match word.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// A month and day without a year means the next such date, today included.
fn upcoming_date(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    }
}

fn next_monday(today: NaiveDate) -> NaiveDate {
    today + Duration::days(7 - today.weekday().num_days_from_monday() as i64)
}

fn weekday_date(today: NaiveDate, target: Weekday, qualifier: Option<&str>) -> NaiveDate {
    match qualifier {
        // Always the week after this one
        Some("next") => next_monday(today) + Duration::days(target.num_days_from_monday() as i64),
        _ => {
            let ahead = (target.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64)
                .rem_euclid(7);
            today + Duration::days(ahead)
        }
    }
}

fn part_of_day(word: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (start, end) = match word {
        "morning" => (9, 12),
        "afternoon" => (12, 17),
        "evening" => (17, 21),
        _ => return None,
    };
    Some((
        NaiveTime::from_hms_opt(start, 0, 0)?,
        NaiveTime::from_hms_opt(end, 0, 0)?,
    ))
}

fn parse_day_anchor(text: &mut String, today: NaiveDate, parsed: &mut Parsed) {
    if let Some(caps) = take(&ISO_DATE_REGEX, text).first() {
        let ymd = (
            group(caps, 1).and_then(|y| y.parse::<i32>().ok()),
            group(caps, 2).and_then(|m| m.parse::<u32>().ok()),
            group(caps, 3).and_then(|d| d.parse::<u32>().ok()),
        );
        if let (Some(y), Some(m), Some(d)) = ymd {
            parsed.days = NaiveDate::from_ymd_opt(y, m, d).map(DaySpan::day);
        }
    }
    if parsed.days.is_none() {
        if let Some(caps) = take(&MONTH_DAY_REGEX, text).first() {
            let month = group(caps, 1).and_then(month_number);
            let day = group(caps, 2).and_then(|d| d.parse::<u32>().ok());
            if let (Some(m), Some(d)) = (month, day) {
                parsed.days = upcoming_date(today, m, d).map(DaySpan::day);
            }
        }
    }
    if parsed.days.is_none() {
        if let Some(caps) = take(&DAY_MONTH_REGEX, text).first() {
            let day = group(caps, 1).and_then(|d| d.parse::<u32>().ok());
            let month = group(caps, 2).and_then(month_number);
            if let (Some(m), Some(d)) = (month, day) {
                parsed.days = upcoming_date(today, m, d).map(DaySpan::day);
            }
        }
    }
    if parsed.days.is_some() {
        return;
    }

    if !take(&DAY_AFTER_TOMORROW_REGEX, text).is_empty() {
        parsed.days = Some(DaySpan::day(today + Duration::days(2)));
    } else if !take(&TOMORROW_REGEX, text).is_empty() {
        parsed.days = Some(DaySpan::day(today + Duration::days(1)));
    } else if !take(&TONIGHT_REGEX, text).is_empty() {
        parsed.days = Some(DaySpan::day(today));
        parsed.part = part_of_day("evening");
    } else if let Some(caps) = take(&TODAY_REGEX, text).first() {
        parsed.days = Some(DaySpan::day(today));
        if let Some(part) = group(caps, 1) {
            parsed.part = part_of_day(part);
        }
    } else if let Some(caps) = take(&IN_DAYS_REGEX, text).first() {
        if let Some(n) = group(caps, 1).and_then(count_word) {
            let unit = if group(caps, 2).is_some_and(|u| u.starts_with("week")) {
                7
            } else {
                1
            };
            let day = n
                .checked_mul(unit)
                .filter(|days| *days <= MAX_DAYS_AHEAD)
                .and_then(Duration::try_days)
                .and_then(|offset| today.checked_add_signed(offset));
            match day {
                Some(day) => parsed.days = Some(DaySpan::day(day)),
                None => {
                    parsed.out_of_range = Some(SchedulingError::InvalidWindow(
                        "that is too far ahead to plan".to_string(),
                    ))
                }
            }
        }
    } else if !take(&NEXT_WEEK_REGEX, text).is_empty() {
        let monday = next_monday(today);
        parsed.days = Some(DaySpan {
            first: monday,
            last: monday + Duration::days(4),
            single: false,
        });
    } else if !take(&THIS_WEEK_REGEX, text).is_empty() {
        let offset = today.weekday().num_days_from_monday() as i64;
        let friday = today + Duration::days(4 - offset);
        let last = if friday >= today {
            friday
        } else {
            today + Duration::days(6 - offset)
        };
        parsed.days = Some(DaySpan {
            first: today,
            last,
            single: false,
        });
    } else if let Some(caps) = take(&WEEKDAY_ANCHOR_REGEX, text).first() {
        if let Some(target) = group(caps, 2).and_then(weekday_from_word) {
            parsed.days = Some(DaySpan::day(weekday_date(today, target, group(caps, 1))));
        }
    }
}

fn parse_duration(text: &mut String) -> Result<Option<Duration>, SchedulingError> {
    let mut minutes: Option<i64> = None;
    let mut add = |m: i64| minutes = Some(minutes.unwrap_or(0).saturating_add(m));

    if !take(&HALF_HOUR_REGEX, text).is_empty() {
        add(30);
    }
    for caps in take(&AN_HOUR_REGEX, text) {
        add(if group(&caps, 1).is_some() { 90 } else { 60 });
    }
    for caps in take(&HOURS_REGEX, text) {
        if let Some(hours) = group(&caps, 1).and_then(|h| h.parse::<f64>().ok()) {
            // Saturates for values beyond i64
            add((hours * 60.0).round() as i64);
        }
    }
    for caps in take(&MINUTES_REGEX, text) {
        if let Some(m) = group(&caps, 1) {
            add(m.parse::<i64>().unwrap_or(i64::MAX));
        }
    }

    match minutes {
        Some(m) if m > MAX_MEETING_MINUTES => Err(SchedulingError::AmbiguousIntent(
            "a meeting length of at most 24 hours".to_string(),
        )),
        Some(m) => Ok(Duration::try_minutes(m)),
        None => Ok(None),
    }
}

fn parse_clock_bounds(text: &mut String, parsed: &mut Parsed) {
    for caps in take(&NOT_AT_REGEX, text) {
        if let Some(t) = group(&caps, 1).and_then(|t| parse_time(t, None)) {
            parsed.not_at.push(t);
        }
    }

    let range = take(&RANGE_REGEX, text)
        .into_iter()
        .chain(take(&BARE_RANGE_REGEX, text))
        .find_map(|caps| match (group(&caps, 1), group(&caps, 2)) {
            (Some(a), Some(b)) => parse_time_range(a, b),
            _ => None,
        });
    if let Some((start, end)) = range {
        parsed.after = Some(start);
        parsed.before = Some(end);
    }

    if let Some(t) = first_time(&NOT_BEFORE_REGEX, text) {
        parsed.after = Some(t);
    }
    if let Some(t) = first_time(&NOT_AFTER_REGEX, text) {
        parsed.before = Some(t);
    }
    if let Some(t) = first_time(&AFTER_REGEX, text) {
        parsed.after = Some(t);
    }
    if let Some(t) = first_time(&BEFORE_REGEX, text) {
        parsed.before = Some(t);
    }
    parsed.at = first_time(&AT_REGEX, text).or_else(|| first_time(&STANDALONE_TIME_REGEX, text));
}

fn parse(utterance: &str, now: DateTime<Utc>, tz: Tz) -> Parsed {
    let lower = utterance.to_lowercase();
    let today = now.with_timezone(&tz).date_naive();
    let mut parsed = Parsed::default();

    parsed.action = if RESCHEDULE_REGEX.is_match(&lower) {
        Some(Action::Reschedule)
    } else if QUERY_REGEX.is_match(&lower) {
        Some(Action::Query)
    } else if CREATE_REGEX.is_match(&lower) {
        Some(Action::Create)
    } else {
        None
    };

    if parsed.action == Some(Action::Reschedule) {
        parsed.reschedule_hint = HINT_REGEX
            .captures(&lower)
            .and_then(|caps| caps.get(1))
            .map(|hint| clean_hint(hint.as_str()))
            .filter(|hint| !hint.is_empty());
    }
    parsed.title_noun = NOUN_REGEX
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .map(|noun| capitalize(noun.as_str()));
    parsed.title_name = NAME_REGEX
        .captures(utterance)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string());

    let mut text = lower;
    for caps in take(&EXCLUDE_REGEX, &mut text) {
        if let Some(list) = group(&caps, 1) {
            for word in WEEKDAY_WORD_REGEX.find_iter(list) {
                if let Some(day) = weekday_from_word(word.as_str()) {
                    if !parsed.excluded.contains(&day) {
                        parsed.excluded.push(day);
                    }
                }
            }
        }
    }

    // Dates first, so "2025-05-06" is never read as a clock range
    parse_day_anchor(&mut text, today, &mut parsed);
    match parse_duration(&mut text) {
        Ok(duration) => parsed.duration = duration,
        Err(err) => parsed.out_of_range = Some(err),
    }
    if let Some(caps) = take(&PART_REGEX, &mut text).first() {
        parsed.part = group(caps, 1).and_then(part_of_day);
    }
    parse_clock_bounds(&mut text, &mut parsed);

    if !take(&EARLIER_REGEX, &mut text).is_empty() {
        parsed.shift = Some(Shift::Earlier);
    } else if !take(&LATER_REGEX, &mut text).is_empty() {
        parsed.shift = Some(Shift::Later);
    }

    debug!("Parsed utterance: {:?}", parsed);
    parsed
}

fn clean_hint(raw: &str) -> String {
    const SKIP: [&str; 9] = ["my", "the", "our", "this", "that", "a", "an", "it", "one"];
    raw.split_whitespace()
        .filter(|w| !SKIP.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn add_clock(time: NaiveTime, duration: Duration) -> Option<NaiveTime> {
    let (end, wrapped) = time.overflowing_add_signed(duration);
    (wrapped == 0).then_some(end)
}

fn midpoint(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Option<NaiveTime> {
    let from = start.map_or(0, |t| t.num_seconds_from_midnight());
    let to = end.map_or(86_400, |t| t.num_seconds_from_midnight());
    NaiveTime::from_num_seconds_from_midnight_opt((from + to) / 2, 0)
}


/// Daily bounds from the parsed phrases layered over `base` (or the working hours).
fn daily_bounds(
    parsed: &Parsed,
    base: Option<&Constraints>,
    settings: &AssistantSettings,
    duration: Duration,
) -> Result<(Option<NaiveTime>, Option<NaiveTime>), SchedulingError> {
    let (mut start, mut end) = match (parsed.part, base) {
        (Some((s, e)), _) => (Some(s), Some(e)),
        (None, Some(c)) => (c.daily_start, c.daily_end),
        (None, None) => (Some(settings.work_start), Some(settings.work_end)),
    };

    if let Some(at) = parsed.at {
        start = Some(at);
        end = add_clock(at, duration);
    } else {
        if let Some(after) = parsed.after {
            start = Some(after);
            if parsed.before.is_none() && end.is_some_and(|e| e <= after) {
                end = None;
            }
        }
        if let Some(before) = parsed.before {
            end = Some(before);
            if parsed.after.is_none() && start.is_some_and(|s| s >= before) {
                start = None;
            }
        }
    }

    match parsed.shift {
        Some(Shift::Earlier) => end = midpoint(start, end),
        Some(Shift::Later) => start = midpoint(start, end),
        None => {}
    }

    if let (Some(s), Some(e)) = (start, end) {
        if e <= s {
            return Err(SchedulingError::InvalidWindow(format!(
                "{} is not after {}",
                e.format("%H:%M"),
                s.format("%H:%M")
            )));
        }
    }
    Ok((start, end))
}

/// Builds the request for `span`, narrowing `base` when refining.
fn assemble(
    parsed: &Parsed,
    span: DaySpan,
    action: Action,
    duration: Duration,
    base: Option<&Constraints>,
    ctx: &IntentContext<'_>,
) -> Result<SchedulingRequest, SchedulingError> {
    if duration <= Duration::zero() {
        return Err(SchedulingError::AmbiguousIntent(
            "how long the meeting should be".to_string(),
        ));
    }
    let tz = ctx.time_zone;
    let (daily_start, daily_end) = daily_bounds(parsed, base, ctx.settings, duration)?;

    let mut constraints = base.cloned().unwrap_or_else(|| Constraints {
        excluded_weekdays: if span.single {
            Vec::new()
        } else {
            ctx.settings.non_working_days()
        },
        ..Constraints::default()
    });
    constraints.daily_start = daily_start;
    constraints.daily_end = daily_end;
    for day in &parsed.excluded {
        constraints.exclude_weekday(*day);
    }
    let mut day = span.first;
    while day <= span.last {
        for t in &parsed.not_at {
            if let Some(start) = local_to_utc(tz, day, *t) {
                constraints.exclude_interval(start, start + duration);
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    let earliest = local_to_utc(tz, span.first, daily_start.unwrap_or(NaiveTime::MIN));
    let latest = match daily_end {
        Some(end) => local_to_utc(tz, span.last, end),
        None => local_day_end(tz, span.last),
    };
    let (earliest, latest) = match (earliest, latest) {
        (Some(e), Some(l)) => (e, l),
        _ => {
            return Err(SchedulingError::InvalidWindow(
                "that day does not exist in the calendar".to_string(),
            ))
        }
    };

    SchedulingRequest::new(
        action,
        earliest,
        latest,
        tz,
        duration,
        constraints,
        ctx.settings.default_title.clone(),
    )
}

fn span_of(request: &SchedulingRequest) -> DaySpan {
    let (first, last) = request.local_days();
    DaySpan {
        first,
        last,
        single: first == last,
    }
}

impl IntentOracle for RuleBasedOracle {
    fn extract(
        &self,
        utterance: &str,
        ctx: &IntentContext<'_>,
    ) -> Result<SchedulingRequest, SchedulingError> {
        let parsed = parse(utterance, ctx.now, ctx.time_zone);
        if let Some(err) = parsed.out_of_range.clone() {
            return Err(err);
        }

        let (span, base) = match (parsed.days, ctx.pending) {
            (Some(span), _) => (span, None),
            (None, Some(pending)) => (span_of(pending), Some(pending.constraints())),
            (None, None) => {
                return Err(SchedulingError::AmbiguousIntent(
                    "which day you have in mind".to_string(),
                ))
            }
        };
        let action = parsed
            .action
            .or(ctx.pending.map(|p| p.action()))
            .unwrap_or(Action::Create);
        let duration = parsed
            .duration
            .or(ctx.pending.map(|p| p.duration()))
            .unwrap_or(ctx.settings.default_duration);

        let request = assemble(&parsed, span, action, duration, base, ctx)?;
        let title = parsed
            .title(&ctx.settings.default_title)
            .or_else(|| ctx.pending.map(|p| p.title().to_string()))
            .unwrap_or_else(|| ctx.settings.default_title.clone());
        let hint = if action == Action::Reschedule {
            parsed.reschedule_hint.clone()
        } else {
            None
        };
        Ok(request.with_title(title).with_reschedule_target(hint))
    }

    fn refine(
        &self,
        utterance: &str,
        pending: &SchedulingRequest,
        ctx: &IntentContext<'_>,
    ) -> Result<Refinement, SchedulingError> {
        let parsed = parse(utterance, ctx.now, ctx.time_zone);
        if let Some(err) = parsed.out_of_range.clone() {
            return Err(err);
        }
        if parsed.days.is_some() {
            return Ok(Refinement::StartOver);
        }
        if !parsed.narrows() {
            return Ok(Refinement::Unchanged);
        }

        let duration = parsed.duration.unwrap_or(pending.duration());
        let narrowed = assemble(
            &parsed,
            span_of(pending),
            pending.action(),
            duration,
            Some(pending.constraints()),
            ctx,
        )?;
        Ok(Refinement::Narrowed(
            narrowed
                .with_title(pending.title())
                .with_reschedule_target(pending.reschedule_target().map(str::to_string))
                .with_ignored_event(pending.ignored_event_id().map(str::to_string)),
        ))
    }
}

/// Picks the event a reschedule hint refers to: most hint words in the title, then the
/// earliest. Transparent events are never candidates.
pub fn match_event<'a>(hint: &str, events: &'a [CalendarEvent]) -> Option<&'a CalendarEvent> {
    let words: Vec<String> = hint
        .split_whitespace()
        .filter(|w| w.len() >= 3 && *w != "with" && *w != "and")
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return None;
    }

    events
        .iter()
        .filter(|e| e.busy)
        .map(|e| {
            let title = e.title.to_lowercase();
            let score = words.iter().filter(|w| title.contains(w.as_str())).count();
            (score, e)
        })
        .filter(|(score, _)| *score > 0)
        .max_by(|(a, ea), (b, eb)| a.cmp(b).then(eb.start.cmp(&ea.start)))
        .map(|(_, e)| e)
}
