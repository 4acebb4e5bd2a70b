// --- File: crates/slotwise_assistant/src/negotiator.rs ---
//! Booking negotiation as a tagged-state machine.
//!
//! Every function here is a pure transition: it takes the current [`DialogueState`] and
//! returns the next one, plus a [`Directive`] when the async driver has work to do
//! (re-resolve, restart, write to the calendar). Nothing here touches the calendar.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::intent::Refinement;
use crate::model::{CandidateSlot, SchedulingRequest};
use crate::turn::{SlotChoice, TurnIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    Cancelled,
    IdleTimeout,
    TurnLimit,
}

impl AbandonReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbandonReason::Cancelled => "cancelled",
            AbandonReason::IdleTimeout => "idle_timeout",
            AbandonReason::TurnLimit => "turn_limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    AwaitingSelection,
    /// A slot is chosen; `booking_ref` doubles as the event id the write will use.
    AwaitingConfirmation {
        chosen: CandidateSlot,
        booking_ref: String,
    },
    Booked {
        event_id: String,
        slot: CandidateSlot,
    },
    Abandoned {
        reason: AbandonReason,
    },
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Booked { .. } | Phase::Abandoned { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingSelection => "awaiting_selection",
            Phase::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Phase::Booked { .. } => "booked",
            Phase::Abandoned { .. } => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueState {
    pub pending_request: SchedulingRequest,
    pub offered_slots: Vec<CandidateSlot>,
    pub turn_count: u32,
    pub phase: Phase,
    pub last_activity: DateTime<Utc>,
    /// Event being moved when the request is a reschedule.
    pub reschedule_event_id: Option<String>,
}

/// Work the driver has to do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Describe the new phase to the user.
    Present,
    /// The turn was not understood; ask again with this message.
    Clarify(String),
    /// Re-run availability for this narrowed request, then [`reoffer`].
    Resolve(SchedulingRequest),
    /// The turn names a new day: extract it as a fresh request, then [`restart`].
    Restart,
    /// Write the confirmed slot, then [`complete_booking`] or [`recover_conflict`].
    Write {
        slot: CandidateSlot,
        booking_ref: String,
    },
}

/// One user turn, already interpreted.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub intent: TurnIntent,
    pub refinement: Refinement,
    /// Used if this turn picks a new tentative slot.
    pub fresh_booking_ref: String,
}

/// Starts a dialogue. The opening utterance counts as the first turn.
pub fn open(
    request: SchedulingRequest,
    slots: Vec<CandidateSlot>,
    now: DateTime<Utc>,
    reschedule_event_id: Option<String>,
) -> DialogueState {
    DialogueState {
        pending_request: request,
        offered_slots: slots,
        turn_count: 1,
        phase: Phase::AwaitingSelection,
        last_activity: now,
        reschedule_event_id,
    }
}

pub fn is_idle(state: &DialogueState, now: DateTime<Utc>, timeout: Duration) -> bool {
    now - state.last_activity >= timeout
}

/// Ends any non-terminal dialogue that has used up its turns.
pub fn enforce_turn_limit(mut state: DialogueState, max_turns: u32) -> DialogueState {
    if !state.phase.is_terminal() && state.turn_count >= max_turns {
        state.phase = Phase::Abandoned {
            reason: AbandonReason::TurnLimit,
        };
    }
    state
}

fn pick(state: &DialogueState, choice: SlotChoice) -> Option<CandidateSlot> {
    let slots = &state.offered_slots;
    match choice {
        SlotChoice::Index(n) if n >= 1 => slots.get(n - 1).copied(),
        SlotChoice::Index(_) => None,
        SlotChoice::Last => slots.last().copied(),
        SlotChoice::Time { weekday, time } => {
            let tz = state.pending_request.time_zone();
            let matches = |slot: &CandidateSlot, hour: u32| {
                let local = slot.start.with_timezone(&tz);
                local.hour() == hour
                    && local.minute() == time.minute()
                    && weekday.map_or(true, |d| local.weekday() == d)
            };
            // "at 9" may mean 21:00 or 09:00; the offer list decides
            let alternate = (time.hour() + 12) % 24;
            slots
                .iter()
                .find(|s| matches(s, time.hour()))
                .or_else(|| slots.iter().find(|s| matches(s, alternate)))
                .copied()
        }
    }
}

fn fallback(refinement: Refinement, stay: Phase, message: &str) -> (Phase, Directive) {
    match refinement {
        Refinement::Narrowed(request) => (Phase::AwaitingSelection, Directive::Resolve(request)),
        Refinement::StartOver => (Phase::AwaitingSelection, Directive::Restart),
        Refinement::Unchanged => (stay, Directive::Clarify(message.to_string())),
    }
}

fn confirm(slot: CandidateSlot, booking_ref: String) -> Phase {
    Phase::AwaitingConfirmation {
        chosen: slot,
        booking_ref,
    }
}

fn selection_turn(state: &DialogueState, input: TurnInput) -> (Phase, Directive) {
    let TurnInput {
        intent,
        refinement,
        fresh_booking_ref,
    } = input;
    let unmatched = "I couldn't match that to one of the options. Reply with a number, or tell me a different time.";

    match intent {
        TurnIntent::Select(choice) | TurnIntent::Reject(Some(choice)) => match pick(state, choice) {
            Some(slot) => (confirm(slot, fresh_booking_ref), Directive::Present),
            None => fallback(refinement, Phase::AwaitingSelection, unmatched),
        },
        TurnIntent::Affirm => match state.offered_slots.as_slice() {
            [only] => (confirm(*only, fresh_booking_ref), Directive::Present),
            [] => fallback(
                refinement,
                Phase::AwaitingSelection,
                "There's nothing to confirm yet. Try another day or time.",
            ),
            _ => (
                Phase::AwaitingSelection,
                Directive::Clarify("Which one works for you? Reply with the option number.".to_string()),
            ),
        },
        TurnIntent::Reject(None) | TurnIntent::Other | TurnIntent::Cancel => {
            fallback(refinement, Phase::AwaitingSelection, unmatched)
        }
    }
}

fn confirmation_turn(
    state: &DialogueState,
    chosen: CandidateSlot,
    booking_ref: String,
    input: TurnInput,
) -> (Phase, Directive) {
    let TurnInput {
        intent,
        refinement,
        fresh_booking_ref,
    } = input;
    let holding = confirm(chosen, booking_ref.clone());

    match intent {
        TurnIntent::Affirm => (
            holding,
            Directive::Write {
                slot: chosen,
                booking_ref,
            },
        ),
        TurnIntent::Select(choice) => match pick(state, choice) {
            Some(slot) if slot == chosen => (holding, Directive::Present),
            Some(slot) => (confirm(slot, fresh_booking_ref), Directive::Present),
            None => fallback(
                refinement,
                holding,
                "That isn't one of the options. Reply yes to book the current one, or pick another.",
            ),
        },
        TurnIntent::Reject(Some(choice)) => match pick(state, choice) {
            Some(slot) if slot != chosen => (confirm(slot, fresh_booking_ref), Directive::Present),
            _ => fallback_to_selection(refinement),
        },
        TurnIntent::Reject(None) => fallback_to_selection(refinement),
        TurnIntent::Other | TurnIntent::Cancel => fallback(
            refinement,
            holding,
            "Reply yes to book it, or pick another option.",
        ),
    }
}

fn fallback_to_selection(refinement: Refinement) -> (Phase, Directive) {
    match refinement {
        Refinement::Unchanged => (Phase::AwaitingSelection, Directive::Present),
        other => fallback(other, Phase::AwaitingSelection, ""),
    }
}

/// Applies one user turn. Terminal states are returned untouched.
pub fn apply_turn(
    mut state: DialogueState,
    input: TurnInput,
    now: DateTime<Utc>,
    max_turns: u32,
) -> (DialogueState, Directive) {
    if state.phase.is_terminal() {
        return (state, Directive::Present);
    }
    state.turn_count += 1;
    state.last_activity = now;

    if input.intent == TurnIntent::Cancel {
        state.phase = Phase::Abandoned {
            reason: AbandonReason::Cancelled,
        };
        return (state, Directive::Present);
    }

    let (phase, directive) = match state.phase.clone() {
        Phase::AwaitingSelection => selection_turn(&state, input),
        Phase::AwaitingConfirmation {
            chosen,
            booking_ref,
        } => confirmation_turn(&state, chosen, booking_ref, input),
        terminal => (terminal, Directive::Present),
    };
    state.phase = phase;

    match directive {
        // These finish in the follow-up transition, which applies the limit itself
        Directive::Write { .. } | Directive::Resolve(_) | Directive::Restart => (state, directive),
        other => (enforce_turn_limit(state, max_turns), other),
    }
}

/// New offers for a narrowed request.
pub fn reoffer(
    mut state: DialogueState,
    request: SchedulingRequest,
    slots: Vec<CandidateSlot>,
    max_turns: u32,
) -> DialogueState {
    state.pending_request = request;
    state.offered_slots = slots;
    state.phase = Phase::AwaitingSelection;
    enforce_turn_limit(state, max_turns)
}

/// Replaces the pending request with a freshly extracted one.
pub fn restart(
    mut state: DialogueState,
    request: SchedulingRequest,
    slots: Vec<CandidateSlot>,
    reschedule_event_id: Option<String>,
    max_turns: u32,
) -> DialogueState {
    state.reschedule_event_id = reschedule_event_id;
    reoffer(state, request, slots, max_turns)
}

pub fn complete_booking(
    mut state: DialogueState,
    event_id: String,
    slot: CandidateSlot,
) -> DialogueState {
    state.phase = Phase::Booked { event_id, slot };
    state
}

/// The chosen slot was taken. It is excluded from the request and from `fresh_slots`,
/// and the user is back to choosing.
pub fn recover_conflict(
    state: DialogueState,
    taken: CandidateSlot,
    fresh_slots: Vec<CandidateSlot>,
    max_turns: u32,
) -> DialogueState {
    let mut constraints = state.pending_request.constraints().clone();
    constraints.exclude_interval(taken.start, taken.end);
    let request = state.pending_request.clone().with_constraints(constraints);
    let slots = fresh_slots
        .into_iter()
        .filter(|slot| !slot.overlaps(&taken))
        .collect();
    reoffer(state, request, slots, max_turns)
}

/// Idle timeout.
pub fn expire(mut state: DialogueState) -> DialogueState {
    if !state.phase.is_terminal() {
        state.phase = Phase::Abandoned {
            reason: AbandonReason::IdleTimeout,
        };
    }
    state
}
