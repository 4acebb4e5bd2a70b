// --- File: crates/slotwise_assistant/src/logic.rs ---
//! The per-turn pipeline: extract or refine, resolve availability, negotiate, write.
//!
//! Turns within one session run one at a time (the session slot is locked for the whole
//! pipeline run). Calendar reads and writes are the only I/O.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use slotwise_common::{log_error, CalendarError, CalendarService, NewEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::availability::{check_window, resolve_slots};
use crate::error::SchedulingError;
use crate::intent::{match_event, IntentContext, IntentOracle, Refinement, RuleBasedOracle};
use crate::model::{Action, CandidateSlot, SchedulingRequest};
use crate::negotiator::{
    apply_turn, complete_booking, enforce_turn_limit, is_idle, open, recover_conflict, reoffer,
    restart, Directive, DialogueState, TurnInput,
};
use crate::reply::{clarify, describe, offer_list};
use crate::session::{is_expired_tombstone, SessionStore};
use crate::settings::AssistantSettings;
use crate::turn::{classify, TurnIntent};

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply_text: String,
    /// State after the turn. Terminal states are reported here once and then discarded.
    pub state: Option<DialogueState>,
    pub error: Option<SchedulingError>,
    pub time_zone: Tz,
}

struct Step {
    state: Option<DialogueState>,
    reply: String,
    error: Option<SchedulingError>,
}

impl Step {
    fn show(state: DialogueState) -> Self {
        Self {
            reply: describe(&state),
            state: Some(state),
            error: None,
        }
    }

    fn failed(state: Option<DialogueState>, error: SchedulingError) -> Self {
        Self {
            state,
            reply: error.reply(),
            error: Some(error),
        }
    }
}

/// Request prepared for negotiation: the resolved target (for a reschedule) and its offers.
struct Prepared {
    request: SchedulingRequest,
    reschedule_event_id: Option<String>,
    slots: Vec<CandidateSlot>,
}

pub struct SchedulingAssistant {
    calendar: Arc<dyn CalendarService>,
    oracle: Arc<dyn IntentOracle>,
    settings: AssistantSettings,
    sessions: SessionStore,
}

pub fn new_booking_ref() -> String {
    Uuid::new_v4().simple().to_string()
}

impl SchedulingAssistant {
    /// Assistant with the rule-based oracle.
    pub fn new(calendar: Arc<dyn CalendarService>, settings: AssistantSettings) -> Self {
        Self::with_oracle(calendar, Arc::new(RuleBasedOracle::new()), settings)
    }

    pub fn with_oracle(
        calendar: Arc<dyn CalendarService>,
        oracle: Arc<dyn IntentOracle>,
        settings: AssistantSettings,
    ) -> Self {
        let sessions = SessionStore::new(settings.idle_timeout);
        Self {
            calendar,
            oracle,
            settings,
            sessions,
        }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Runs one user turn for `session_id` at the caller-supplied `now`.
    ///
    /// `time_zone` overrides the configured zone for a new request; an ongoing dialogue
    /// keeps the zone it started with.
    pub async fn handle_message(
        &self,
        session_id: &str,
        utterance: &str,
        now: DateTime<Utc>,
        time_zone: Option<Tz>,
    ) -> TurnOutcome {
        let slot = self.sessions.checkout(session_id);
        if self.sessions.purge_expired(now) > 0 {
            debug!("{} session(s) remain after purge", self.sessions.len());
        }

        let mut guard = slot.lock().await;
        let step = match guard.take() {
            None => {
                let tz = time_zone.unwrap_or(self.settings.time_zone);
                self.start(utterance, now, tz).await
            }
            Some(state)
                if is_expired_tombstone(&state)
                    || is_idle(&state, now, self.settings.idle_timeout) =>
            {
                info!(
                    "Session {} expired (last activity {})",
                    session_id, state.last_activity
                );
                Step::failed(None, SchedulingError::SessionExpired)
            }
            Some(state) => self.continue_dialogue(state, utterance, now).await,
        };

        match (&step.state, &step.error) {
            (Some(state), _) => debug!(
                "Session {} -> {} (turn {})",
                session_id,
                state.phase.name(),
                state.turn_count
            ),
            (None, Some(err)) => debug!("Session {} has no dialogue: {}", session_id, err.code()),
            (None, None) => {}
        }

        // Terminal dialogues are reported once, then dropped
        *guard = step
            .state
            .clone()
            .filter(|state| !state.phase.is_terminal());
        drop(guard);

        let time_zone = step
            .state
            .as_ref()
            .map(|s| s.pending_request.time_zone())
            .or(time_zone)
            .unwrap_or(self.settings.time_zone);

        TurnOutcome {
            session_id: session_id.to_string(),
            reply_text: step.reply,
            state: step.state,
            error: step.error,
            time_zone,
        }
    }

    fn context<'a>(
        &'a self,
        now: DateTime<Utc>,
        time_zone: Tz,
        pending: Option<&'a SchedulingRequest>,
    ) -> IntentContext<'a> {
        IntentContext {
            now,
            time_zone,
            settings: &self.settings,
            pending,
        }
    }

    async fn start(&self, utterance: &str, now: DateTime<Utc>, tz: Tz) -> Step {
        let request = match self.oracle.extract(utterance, &self.context(now, tz, None)) {
            Ok(request) => request,
            Err(err) => {
                debug!("Extraction failed: {}", err);
                return Step::failed(None, err);
            }
        };
        info!(
            "New {} request: {} minutes between {} and {}",
            request.action().as_str(),
            request.duration().num_minutes(),
            request.earliest(),
            request.latest()
        );

        match self.prepare(request, now).await {
            Ok(prepared) => {
                let state = open(
                    prepared.request,
                    prepared.slots,
                    now,
                    prepared.reschedule_event_id,
                );
                Step::show(enforce_turn_limit(state, self.settings.max_turns))
            }
            Err(err) => Step::failed(None, err),
        }
    }

    async fn continue_dialogue(
        &self,
        state: DialogueState,
        utterance: &str,
        now: DateTime<Utc>,
    ) -> Step {
        let max_turns = self.settings.max_turns;
        let tz = state.pending_request.time_zone();
        let intent = classify(utterance);

        let (refinement, refine_error) = if intent == TurnIntent::Cancel {
            (Refinement::Unchanged, None)
        } else {
            let ctx = self.context(now, tz, Some(&state.pending_request));
            match self.oracle.refine(utterance, &state.pending_request, &ctx) {
                Ok(refinement) => (refinement, None),
                Err(err) => (Refinement::Unchanged, Some(err)),
            }
        };
        debug!("Turn classified as {:?}, refinement {:?}", intent, refinement);

        let input = TurnInput {
            intent,
            refinement,
            fresh_booking_ref: new_booking_ref(),
        };
        let (state, directive) = apply_turn(state, input, now, max_turns);
        if state.phase.is_terminal() {
            return Step::show(state);
        }

        match directive {
            Directive::Present => Step::show(state),
            Directive::Clarify(message) => match refine_error {
                Some(err) => Step {
                    reply: clarify(&state, &err.reply()),
                    state: Some(state),
                    error: Some(err),
                },
                None => Step {
                    reply: clarify(&state, &message),
                    state: Some(state),
                    error: None,
                },
            },
            Directive::Resolve(request) => match self.resolve(&request, now).await {
                Ok(slots) => Step::show(reoffer(state, request, slots, max_turns)),
                Err(err) => Step::failed(Some(enforce_turn_limit(state, max_turns)), err),
            },
            Directive::Restart => self.restart(state, utterance, now).await,
            Directive::Write { slot, booking_ref } => {
                self.write(state, slot, booking_ref, now).await
            }
        }
    }

    async fn restart(&self, state: DialogueState, utterance: &str, now: DateTime<Utc>) -> Step {
        let max_turns = self.settings.max_turns;
        let tz = state.pending_request.time_zone();
        let extracted = self
            .oracle
            .extract(utterance, &self.context(now, tz, Some(&state.pending_request)));
        let request = match extracted {
            Ok(request) => carry_target(&state, request),
            Err(err) => return Step::failed(Some(enforce_turn_limit(state, max_turns)), err),
        };
        info!(
            "Restarting negotiation between {} and {}",
            request.earliest(),
            request.latest()
        );

        let known_target = match request.ignored_event_id() {
            Some(id) if state.reschedule_event_id.as_deref() == Some(id) => Some(id.to_string()),
            _ => None,
        };
        let prepared = match known_target {
            // The event being moved was already located
            Some(id) => self.resolve(&request, now).await.map(|slots| Prepared {
                request,
                reschedule_event_id: Some(id),
                slots,
            }),
            None => self.prepare(request, now).await,
        };

        match prepared {
            Ok(prepared) => Step::show(restart(
                state,
                prepared.request,
                prepared.slots,
                prepared.reschedule_event_id,
                max_turns,
            )),
            Err(err) => Step::failed(Some(enforce_turn_limit(state, max_turns)), err),
        }
    }

    /// Locates the reschedule target, if any, and resolves offers.
    async fn prepare(
        &self,
        request: SchedulingRequest,
        now: DateTime<Utc>,
    ) -> Result<Prepared, SchedulingError> {
        check_window(&request, now)?;
        let (request, reschedule_event_id) = match request.action() {
            Action::Reschedule => self.locate_target(request, now).await?,
            _ => (request, None),
        };
        let slots = self.resolve(&request, now).await?;
        Ok(Prepared {
            request,
            reschedule_event_id,
            slots,
        })
    }

    async fn locate_target(
        &self,
        request: SchedulingRequest,
        now: DateTime<Utc>,
    ) -> Result<(SchedulingRequest, Option<String>), SchedulingError> {
        let hint = request.reschedule_target().ok_or_else(|| {
            SchedulingError::AmbiguousIntent("which event you'd like to move".to_string())
        })?;
        let horizon = now + self.settings.reschedule_lookahead;
        let events = self
            .calendar
            .list_events(&self.settings.calendar_id, now, horizon)
            .await
            .map_err(|e| calendar_failure(e, "Failed to list events for reschedule"))?;

        let event = match_event(hint, &events).ok_or_else(|| {
            SchedulingError::AmbiguousIntent(format!(
                "which event \"{}\" refers to, I couldn't find it on your calendar",
                hint
            ))
        })?;
        info!("Reschedule target is {} ({})", event.id, event.title);

        let event_id = event.id.clone();
        let request = request
            .with_duration(event.end - event.start)?
            .with_title(event.title.clone())
            .with_ignored_event(Some(event_id.clone()));
        Ok((request, Some(event_id)))
    }

    async fn resolve(
        &self,
        request: &SchedulingRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateSlot>, SchedulingError> {
        let (from, to) = check_window(request, now)?;
        let events = self
            .calendar
            .list_events(&self.settings.calendar_id, from, to)
            .await
            .map_err(|e| calendar_failure(e, "Failed to list events"))?;
        resolve_slots(request, &events, now, &self.settings.resolver_options())
    }

    /// True when an event with `event_id` already sits exactly on `slot`.
    async fn has_landed(
        &self,
        slot: &CandidateSlot,
        event_id: &str,
    ) -> Result<bool, SchedulingError> {
        let events = self
            .calendar
            .list_events(&self.settings.calendar_id, slot.start, slot.end)
            .await
            .map_err(|e| calendar_failure(e, "Failed to verify booking"))?;
        Ok(events
            .iter()
            .any(|e| e.id == event_id && e.start == slot.start && e.end == slot.end))
    }

    async fn write(
        &self,
        state: DialogueState,
        slot: CandidateSlot,
        booking_ref: String,
        now: DateTime<Utc>,
    ) -> Step {
        let max_turns = self.settings.max_turns;
        let target = state.reschedule_event_id.clone();
        let expected_id = target.clone().unwrap_or_else(|| booking_ref.clone());

        // A previous attempt may have landed without us hearing back
        match self.has_landed(&slot, &expected_id).await {
            Ok(true) => {
                info!("Booking {} was already on the calendar", expected_id);
                return Step::show(complete_booking(state, expected_id, slot));
            }
            Ok(false) => {}
            Err(err) => return Step::failed(Some(enforce_turn_limit(state, max_turns)), err),
        }

        let event = NewEvent {
            event_id: target.is_none().then(|| booking_ref.clone()),
            start: slot.start,
            end: slot.end,
            summary: state.pending_request.title().to_string(),
            description: Some(format!("Scheduled by Slotwise (ref {})", booking_ref)),
        };
        let calendar_id = &self.settings.calendar_id;
        let result = match &target {
            Some(event_id) => self.calendar.update_event(calendar_id, event_id, event).await,
            None => self.calendar.create_event(calendar_id, event).await,
        };

        match result {
            Ok(written) => {
                let event_id = written.event_id.unwrap_or(expected_id);
                info!("Booked {} at {}", event_id, slot.start);
                Step::show(complete_booking(state, event_id, slot))
            }
            Err(CalendarError::AlreadyExists(_)) => {
                info!("Booking {} already existed", expected_id);
                Step::show(complete_booking(state, expected_id, slot))
            }
            Err(CalendarError::Conflict) => self.recover(state, slot, now).await,
            Err(CalendarError::Ambiguous(message)) => {
                warn!("Write outcome unknown for {}: {}", expected_id, message);
                match self.has_landed(&slot, &expected_id).await {
                    Ok(true) => Step::show(complete_booking(state, expected_id, slot)),
                    _ => Step::failed(
                        Some(enforce_turn_limit(state, max_turns)),
                        SchedulingError::ExternalCalendar(message),
                    ),
                }
            }
            Err(other) => Step::failed(
                Some(enforce_turn_limit(state, max_turns)),
                calendar_failure(other, "Failed to write event"),
            ),
        }
    }

    async fn recover(&self, state: DialogueState, taken: CandidateSlot, now: DateTime<Utc>) -> Step {
        warn!("Slot {} was taken before the write", taken.start);
        let max_turns = self.settings.max_turns;
        let fresh = match self.resolve(&state.pending_request, now).await {
            Ok(slots) => slots,
            Err(err) => {
                // No offers survive that were not re-checked against the calendar
                warn!("Could not refresh offers after conflict: {}", err);
                let state = recover_conflict(state, taken, Vec::new(), max_turns);
                let reply = if state.phase.is_terminal() {
                    describe(&state)
                } else {
                    format!("Sorry, that slot was just taken. {}", err.reply())
                };
                return Step {
                    state: Some(state),
                    reply,
                    error: Some(err),
                };
            }
        };
        let state = recover_conflict(state, taken, fresh, max_turns);
        let error = SchedulingError::BookingConflict;

        let reply = if state.phase.is_terminal() {
            describe(&state)
        } else if state.offered_slots.is_empty() {
            format!("{} {}", error.reply(), describe(&state))
        } else {
            format!(
                "{}\n{}",
                error.reply(),
                offer_list(&state.offered_slots, state.pending_request.time_zone())
            )
        };
        Step {
            state: Some(state),
            reply,
            error: Some(error),
        }
    }
}

/// A restarted reschedule keeps moving the event already located.
fn carry_target(state: &DialogueState, request: SchedulingRequest) -> SchedulingRequest {
    let previous = &state.pending_request;
    match (&state.reschedule_event_id, request.action()) {
        (Some(id), Action::Reschedule) => {
            let duration = previous.duration();
            let carried = request
                .with_title(previous.title().to_string())
                .with_ignored_event(Some(id.clone()));
            carried.clone().with_duration(duration).unwrap_or(carried)
        }
        _ => request,
    }
}

fn calendar_failure(err: CalendarError, context: &str) -> SchedulingError {
    log_error(&err, context);
    SchedulingError::from(err)
}
