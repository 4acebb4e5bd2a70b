// --- File: crates/slotwise_assistant/src/error.rs ---
use slotwise_common::{external_service_error, validation_error, CalendarError, SlotwiseError};
use thiserror::Error;

/// Failures a scheduling turn can hit. None of them end the process; each one is reported
/// back to the user with a next step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// The utterance did not carry enough to act on. The payload names what is missing.
    #[error("Ambiguous request: {0}")]
    AmbiguousIntent(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    /// The slot was taken between offer and confirmation.
    #[error("Booking conflict: the slot is no longer free")]
    BookingConflict,

    #[error("Calendar provider error: {0}")]
    ExternalCalendar(String),

    #[error("Session expired")]
    SessionExpired,
}

impl SchedulingError {
    /// Stable machine-readable code, returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulingError::AmbiguousIntent(_) => "ambiguous_intent",
            SchedulingError::InvalidWindow(_) => "invalid_window",
            SchedulingError::BookingConflict => "booking_conflict",
            SchedulingError::ExternalCalendar(_) => "external_calendar_error",
            SchedulingError::SessionExpired => "session_expired",
        }
    }

    /// Natural-language reply with an actionable next step.
    pub fn reply(&self) -> String {
        match self {
            SchedulingError::AmbiguousIntent(missing) => format!(
                "I'm not sure what you'd like to schedule: {}. Try something like \"book 30 minutes tomorrow afternoon\".",
                missing
            ),
            SchedulingError::InvalidWindow(reason) => format!(
                "That time doesn't work: {}. Please pick a time in the future.",
                reason
            ),
            SchedulingError::BookingConflict => {
                "Sorry, that slot was just taken. Here are the times that are still free."
                    .to_string()
            }
            SchedulingError::ExternalCalendar(_) => {
                "I couldn't reach your calendar right now. Please try again in a moment."
                    .to_string()
            }
            SchedulingError::SessionExpired => {
                "This conversation timed out, so I've cleared it. Tell me what you'd like to schedule and we'll start again."
                    .to_string()
            }
        }
    }
}

impl From<CalendarError> for SchedulingError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::Conflict => SchedulingError::BookingConflict,
            other => SchedulingError::ExternalCalendar(other.to_string()),
        }
    }
}

impl From<SchedulingError> for SlotwiseError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::AmbiguousIntent(msg) | SchedulingError::InvalidWindow(msg) => {
                validation_error(msg)
            }
            SchedulingError::BookingConflict => {
                SlotwiseError::ConflictError("slot is no longer free".to_string())
            }
            SchedulingError::ExternalCalendar(msg) => external_service_error("calendar", msg),
            SchedulingError::SessionExpired => SlotwiseError::NotFoundError("session".to_string()),
        }
    }
}
