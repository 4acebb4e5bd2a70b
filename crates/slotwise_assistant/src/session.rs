// --- File: crates/slotwise_assistant/src/session.rs ---
//! Per-session dialogue storage.
//!
//! The outer map is behind a short-lived `std::sync::Mutex`. Each session has its own
//! `tokio::sync::Mutex`, held by a request for the whole pipeline run, so turns within a
//! session serialize while different sessions run concurrently.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::negotiator::{expire, is_idle, AbandonReason, DialogueState, Phase};

/// `None` until the first scheduling utterance lands.
pub type SessionSlot = Arc<AsyncMutex<Option<DialogueState>>>;

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionSlot>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// The slot for `session_id`, created empty if unknown.
    pub fn checkout(&self, session_id: &str) -> SessionSlot {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session map lock was poisoned; recovering");
                poisoned.into_inner()
            }
        };
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Lazy expiry, driven by the caller's clock.
    ///
    /// Idle dialogues are marked `Abandoned(IdleTimeout)` and kept for one more timeout so
    /// a returning user can be told their session expired; after that they are dropped.
    /// Empty slots and slots someone else holds or has checked out are left alone.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let timeout = self.idle_timeout;
        let before = sessions.len();

        sessions.retain(|session_id, slot| {
            // Another request has this slot checked out
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let Ok(mut guard) = slot.try_lock() else {
                return true;
            };
            match guard.take() {
                None => false,
                Some(state) if is_expired_tombstone(&state) => {
                    let keep = !is_idle(&state, now, timeout + timeout);
                    if keep {
                        *guard = Some(state);
                    }
                    keep
                }
                Some(state) if state.phase.is_terminal() => false,
                Some(state) if is_idle(&state, now, timeout) => {
                    debug!("Session {} idle since {}, expiring", session_id, state.last_activity);
                    *guard = Some(expire(state));
                    true
                }
                Some(state) => {
                    *guard = Some(state);
                    true
                }
            }
        });

        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Purged {} expired session(s)", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn is_expired_tombstone(state: &DialogueState) -> bool {
    matches!(
        state.phase,
        Phase::Abandoned {
            reason: AbandonReason::IdleTimeout
        }
    )
}
