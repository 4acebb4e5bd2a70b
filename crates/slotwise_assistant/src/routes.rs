// --- File: crates/slotwise_assistant/src/routes.rs ---

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::handlers::{post_message_handler, AssistantState};
use crate::logic::SchedulingAssistant;

/// Routes for the conversational assistant, to be nested under `/api`.
pub fn routes(assistant: Arc<SchedulingAssistant>) -> Router {
    let state = Arc::new(AssistantState { assistant });

    Router::new()
        .route("/messages", post(post_message_handler))
        .with_state(state)
}
