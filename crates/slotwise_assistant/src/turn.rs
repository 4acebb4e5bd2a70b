// --- File: crates/slotwise_assistant/src/turn.rs ---
//! Classifies a follow-up utterance during negotiation.

use chrono::{NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::phrases::{ordinal, parse_time, weekday_from_word, WEEKDAY};

/// How the user pointed at an offered slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChoice {
    /// 1-based position in the offer list.
    Index(usize),
    Last,
    Time {
        weekday: Option<Weekday>,
        time: NaiveTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnIntent {
    Cancel,
    Affirm,
    /// "No", optionally naming a different slot in the same breath.
    Reject(Option<SlotChoice>),
    Select(SlotChoice),
    /// Anything else; may still be a refinement.
    Other,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("turn pattern should compile - this is a bug")
}

static CANCEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:cancel|never\s?mind|forget (?:it|about it)|stop|quit|abort)\b")
});
static REJECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"^\s*(?:no|nope|nah|neither|none)\b|\b(?:not that|doesn'?t work|does not work|won'?t work|can'?t make|cannot make|not good)\b")
});
static NEGATED_CHOICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\bnot\s+(?:the\s+|at\s+|option\s+)?(?:\d|first|second|third|fourth|fifth|last)")
});
static AFFIRM_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:yes|yeah|yep|yup|sure|ok|okay|confirm|confirmed|sounds good|perfect|great|book it|do it|go ahead|that works|works for me|please do)\b")
});
static INDEX_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:option|number|no\.|slot|choice|#)\s*(\d{1,2})\b|^\s*#?(\d{1,2})\s*[.!)]?\s*(?:please)?\s*[.!]?\s*$")
});
static ORDINAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|1st|2nd|3rd|[4-9]th|10th|last)\b")
});
static TIME_CHOICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(\d{1,2}:\d{2}\s*(?:am|pm)?|\d{1,2}\s*(?:am|pm))(?:\s|$|\b)|\bat\s+(\d{1,2})\b")
});
static WEEKDAY_REGEX: Lazy<Regex> = Lazy::new(|| compile(&format!(r"\b({})\b", WEEKDAY)));
// Clock times used as bounds ("before 10am", "between 3 and 5pm") narrow the window
static CLOCK_BOUND_REGEX: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:after|before|by|until|till|since|from|between|than|up to|starting(?:\s+at)?)\s+\d|\d\s*(?:am|pm)?\s*(?:-|and|to|until|till)\s*\d")
});

fn time_choice(text: &str) -> Option<SlotChoice> {
    if CLOCK_BOUND_REGEX.is_match(text) {
        return None;
    }
    let caps = TIME_CHOICE_REGEX.captures(text)?;
    let phrase = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let time = parse_time(phrase, None)?;
    let weekday = WEEKDAY_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| weekday_from_word(m.as_str()));
    Some(SlotChoice::Time { weekday, time })
}

fn slot_choice(text: &str) -> Option<SlotChoice> {
    if let Some(choice) = time_choice(text) {
        return Some(choice);
    }
    if let Some(caps) = INDEX_REGEX.captures(text) {
        let digits = caps.get(1).or_else(|| caps.get(2));
        if let Some(n) = digits.and_then(|m| m.as_str().parse::<usize>().ok()) {
            return Some(SlotChoice::Index(n));
        }
    }
    let word = ORDINAL_REGEX.captures(text)?.get(1)?.as_str();
    if word == "last" {
        return Some(SlotChoice::Last);
    }
    ordinal(word).map(SlotChoice::Index)
}

/// Reads one negotiation turn. Cancellation wins over everything; a rejection that names
/// another slot carries it along.
pub fn classify(utterance: &str) -> TurnIntent {
    let text = utterance.trim().to_lowercase();
    if CANCEL_REGEX.is_match(&text) {
        return TurnIntent::Cancel;
    }
    if NEGATED_CHOICE_REGEX.is_match(&text) {
        return TurnIntent::Reject(None);
    }
    let choice = slot_choice(&text);
    if REJECT_REGEX.is_match(&text) {
        return TurnIntent::Reject(choice);
    }
    if let Some(choice) = choice {
        return TurnIntent::Select(choice);
    }
    if AFFIRM_REGEX.is_match(&text) {
        return TurnIntent::Affirm;
    }
    TurnIntent::Other
}
