// --- File: crates/slotwise_common/src/routes.rs ---

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

/// Liveness probe. No side effects, no dependency checks.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Creates a router containing common routes that can be used across the application.
pub fn routes() -> Router {
    Router::new()
        .route("/", get(|| async { "Welcome to the Slotwise scheduling API!" }))
        .route("/health", get(health_handler))
}
