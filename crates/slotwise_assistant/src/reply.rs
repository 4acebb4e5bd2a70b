// --- File: crates/slotwise_assistant/src/reply.rs ---
//! User-facing wording for each dialogue phase.

use chrono_tz::Tz;

use crate::error::SchedulingError;
use crate::model::{Action, CandidateSlot};
use crate::negotiator::{AbandonReason, DialogueState, Phase};

pub fn offer_list(slots: &[CandidateSlot], tz: Tz) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| format!("{}. {}", i + 1, slot.label(tz)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn describe(state: &DialogueState) -> String {
    let request = &state.pending_request;
    let tz = request.time_zone();
    let title = request.title();
    let minutes = request.duration().num_minutes();

    match &state.phase {
        Phase::AwaitingSelection if state.offered_slots.is_empty() => format!(
            "I couldn't find a free {}-minute slot then. Try another day, a different time of day, or a shorter meeting.",
            minutes
        ),
        Phase::AwaitingSelection => {
            let (intro, outro) = match request.action() {
                Action::Query => (
                    format!("Here's when you're free for {} minutes:", minutes),
                    "Want me to book one? Reply with its number.",
                ),
                Action::Reschedule => (
                    format!("I can move \"{}\" to one of these:", title),
                    "Reply with a number to pick one.",
                ),
                Action::Create => (
                    format!("Here are some {}-minute slots for \"{}\":", minutes, title),
                    "Reply with a number to pick one.",
                ),
            };
            format!(
                "{}\n{}\n{}",
                intro,
                offer_list(&state.offered_slots, tz),
                outro
            )
        }
        Phase::AwaitingConfirmation { chosen, .. } => {
            let verb = match request.action() {
                Action::Reschedule => "move",
                _ => "book",
            };
            format!(
                "Shall I {} \"{}\" for {}? Reply yes to confirm.",
                verb,
                title,
                chosen.label(tz)
            )
        }
        Phase::Booked { slot, .. } => match request.action() {
            Action::Reschedule => format!("Done! \"{}\" now takes place {}.", title, slot.label(tz)),
            _ => format!("Done! \"{}\" is booked for {}.", title, slot.label(tz)),
        },
        Phase::Abandoned { reason } => match reason {
            AbandonReason::Cancelled => {
                "Okay, I've dropped this request. Nothing was booked.".to_string()
            }
            AbandonReason::TurnLimit => "We've gone back and forth a lot, so I've stopped here. Nothing was booked; start a new request whenever you're ready.".to_string(),
            AbandonReason::IdleTimeout => SchedulingError::SessionExpired.reply(),
        },
    }
}

/// A clarification, followed by the current options when there are any.
pub fn clarify(state: &DialogueState, message: &str) -> String {
    match &state.phase {
        Phase::AwaitingSelection if !state.offered_slots.is_empty() => format!(
            "{}\n{}",
            message,
            offer_list(&state.offered_slots, state.pending_request.time_zone())
        ),
        _ => message.to_string(),
    }
}
