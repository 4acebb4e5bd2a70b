// --- File: crates/slotwise_assistant/src/doc.rs ---

#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::handlers::{MessageReply, MessageRequest, PendingRequestView, SlotView, StateSnapshot};

#[derive(OpenApi)]
#[openapi(
    paths(crate::handlers::post_message_handler),
    components(schemas(
        MessageRequest,
        MessageReply,
        StateSnapshot,
        SlotView,
        PendingRequestView
    )),
    tags(
        (name = "Assistant", description = "Conversational scheduling")
    ),
    servers(
        (url = "/api", description = "Slotwise API server")
    )
)]
pub struct AssistantApiDoc;
