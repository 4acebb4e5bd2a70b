// --- File: crates/slotwise_assistant/src/handlers.rs ---
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use slotwise_common::{validation_error, SlotwiseError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::logic::{SchedulingAssistant, TurnOutcome};
use crate::model::CandidateSlot;
use crate::negotiator::{DialogueState, Phase};

#[derive(Clone)]
pub struct AssistantState {
    pub assistant: Arc<SchedulingAssistant>,
}

#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MessageRequest {
    pub session_id: String,
    pub utterance: String,
    /// RFC 3339 timestamp the turn is evaluated at.
    pub current_time: String,
    /// IANA zone; the configured zone is used when absent.
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SlotView {
    pub index: usize,
    pub start: String,
    pub end: String,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PendingRequestView {
    pub action: String,
    pub earliest: String,
    pub latest: String,
    pub duration_minutes: i64,
    pub title: String,
    pub time_zone: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StateSnapshot {
    pub session_id: String,
    /// `idle` when the session holds no dialogue.
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abandon_reason: Option<String>,
    pub offered_slots: Vec<SlotView>,
    pub chosen_slot: Option<SlotView>,
    pub turn_count: u32,
    pub pending_request: Option<PendingRequestView>,
    pub event_id: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MessageReply {
    pub reply_text: String,
    pub state_snapshot: StateSnapshot,
    /// Error code when the turn hit one, e.g. `booking_conflict`.
    pub error: Option<String>,
}

fn slot_view(index: usize, slot: &CandidateSlot, tz: Tz) -> SlotView {
    SlotView {
        index,
        start: slot.start.with_timezone(&tz).to_rfc3339(),
        end: slot.end.with_timezone(&tz).to_rfc3339(),
        label: slot.label(tz),
    }
}

fn snapshot(session_id: &str, state: Option<&DialogueState>, tz: Tz) -> StateSnapshot {
    let Some(state) = state else {
        return StateSnapshot {
            session_id: session_id.to_string(),
            phase: "idle".to_string(),
            abandon_reason: None,
            offered_slots: Vec::new(),
            chosen_slot: None,
            turn_count: 0,
            pending_request: None,
            event_id: None,
        };
    };

    let request = &state.pending_request;
    let offered_slots = state
        .offered_slots
        .iter()
        .enumerate()
        .map(|(i, slot)| slot_view(i + 1, slot, tz))
        .collect::<Vec<_>>();
    let position = |slot: &CandidateSlot| {
        state
            .offered_slots
            .iter()
            .position(|s| s == slot)
            .map_or(0, |i| i + 1)
    };

    let (chosen_slot, event_id, abandon_reason) = match &state.phase {
        Phase::AwaitingConfirmation { chosen, .. } => {
            (Some(slot_view(position(chosen), chosen, tz)), None, None)
        }
        Phase::Booked { event_id, slot } => (
            Some(slot_view(position(slot), slot, tz)),
            Some(event_id.clone()),
            None,
        ),
        Phase::Abandoned { reason } => (None, None, Some(reason.as_str().to_string())),
        Phase::AwaitingSelection => (None, None, None),
    };

    StateSnapshot {
        session_id: session_id.to_string(),
        phase: state.phase.name().to_string(),
        abandon_reason,
        offered_slots,
        chosen_slot,
        turn_count: state.turn_count,
        pending_request: Some(PendingRequestView {
            action: request.action().as_str().to_string(),
            earliest: request.earliest().with_timezone(&tz).to_rfc3339(),
            latest: request.latest().with_timezone(&tz).to_rfc3339(),
            duration_minutes: request.duration().num_minutes(),
            title: request.title().to_string(),
            time_zone: tz.name().to_string(),
        }),
        event_id,
    }
}

impl From<TurnOutcome> for MessageReply {
    fn from(outcome: TurnOutcome) -> Self {
        MessageReply {
            state_snapshot: snapshot(
                &outcome.session_id,
                outcome.state.as_ref(),
                outcome.time_zone,
            ),
            reply_text: outcome.reply_text,
            error: outcome.error.map(|e| e.code().to_string()),
        }
    }
}

/// Handler for one conversational turn.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages",
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Assistant reply and dialogue state", body = MessageReply),
        (status = 400, description = "Malformed request (empty session id, bad current_time or time_zone)")
    ),
    tag = "Assistant"
))]
pub async fn post_message_handler(
    State(state): State<Arc<AssistantState>>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<MessageReply>, SlotwiseError> {
    let session_id = payload.session_id.trim();
    if session_id.is_empty() {
        return Err(validation_error("session_id must not be empty"));
    }
    let now = DateTime::parse_from_rfc3339(&payload.current_time)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| validation_error(format!("current_time is not RFC 3339: {}", e)))?;
    let time_zone = match payload.time_zone.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(
            Tz::from_str(name)
                .map_err(|_| validation_error(format!("unknown time zone: {}", name)))?,
        ),
    };

    info!("Message for session {}", session_id);
    let outcome = state
        .assistant
        .handle_message(session_id, &payload.utterance, now, time_zone)
        .await;
    Ok(Json(MessageReply::from(outcome)))
}
