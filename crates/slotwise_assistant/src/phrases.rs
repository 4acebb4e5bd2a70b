// --- File: crates/slotwise_assistant/src/phrases.rs ---
//! Shared vocabulary for reading times and days out of free text.

use chrono::{NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

/// Full weekday names as a regex alternation.
pub(crate) const WEEKDAY: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

/// A clock phrase: "3", "3pm", "3:30 pm", "15:00", "noon", "midnight".
pub(crate) const TIME: &str = r"\d{1,2}(?::\d{2})?\s*(?:am|pm|a\.m\.|p\.m\.)?|noon|midnight";

static CLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?$")
        .expect("CLOCK_REGEX should compile - this is a bug")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Meridiem {
    Am,
    Pm,
}

pub(crate) fn weekday_from_word(word: &str) -> Option<Weekday> {
    match word.trim_end_matches('s') {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Meridiem written on a clock phrase, if any.
pub(crate) fn meridiem_of(phrase: &str) -> Option<Meridiem> {
    let phrase = phrase.trim();
    if phrase.ends_with("pm") || phrase.ends_with("p.m.") || phrase == "noon" {
        Some(Meridiem::Pm)
    } else if phrase.ends_with("am") || phrase.ends_with("a.m.") || phrase == "midnight" {
        Some(Meridiem::Am)
    } else {
        None
    }
}

/// Reads a clock phrase as a local time of day.
///
/// A bare hour takes `fallback` when given; otherwise 1 through 7 read as afternoon hours.
pub(crate) fn parse_time(phrase: &str, fallback: Option<Meridiem>) -> Option<NaiveTime> {
    let phrase = phrase.trim();
    match phrase {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }
    let caps = CLOCK_REGEX.captures(phrase)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let meridiem = caps.get(3).and_then(|m| meridiem_of(m.as_str()));

    let hour = match meridiem.or(if hour <= 12 { fallback } else { None }) {
        Some(_) if hour == 0 || hour > 12 => return None,
        Some(Meridiem::Am) => hour % 12,
        Some(Meridiem::Pm) => hour % 12 + 12,
        None if (1..=7).contains(&hour) => hour + 12,
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Reads "3-5pm" style pairs, letting the second meridiem carry over to the first.
pub(crate) fn parse_time_range(first: &str, second: &str) -> Option<(NaiveTime, NaiveTime)> {
    let end = parse_time(second, None)?;
    let carried = meridiem_of(first).or_else(|| meridiem_of(second));
    let mut start = parse_time(first, carried)?;
    if start >= end && meridiem_of(first).is_none() {
        // "11-1pm": the first hour belongs to the morning
        start = parse_time(first, Some(Meridiem::Am))?;
    }
    Some((start, end))
}

/// "1st".."10th" and "first".."tenth" as a 1-based position.
pub(crate) fn ordinal(word: &str) -> Option<usize> {
    let position = match word {
        "first" | "1st" => 1,
        "second" | "2nd" => 2,
        "third" | "3rd" => 3,
        "fourth" | "4th" => 4,
        "fifth" | "5th" => 5,
        "sixth" | "6th" => 6,
        "seventh" | "7th" => 7,
        "eighth" | "8th" => 8,
        "ninth" | "9th" => 9,
        "tenth" | "10th" => 10,
        _ => return None,
    };
    Some(position)
}

/// Small counting words used in "in three days".
pub(crate) fn count_word(word: &str) -> Option<i64> {
    match word {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "ten" => Some(10),
        other => other.parse().ok(),
    }
}
