// --- File: crates/services/slotwise_backend/src/service_factory.rs ---
//! Picks the calendar provider the assistant talks to.

use slotwise_common::{is_gcal_enabled, log_result, CalendarService};
use slotwise_config::AppConfig;
use slotwise_gcal::{auth::create_calendar_hub, GoogleCalendarService, MemoryCalendarService};
use std::sync::Arc;
use tracing::{info, warn};

/// Google Calendar when it is enabled and configured, the in-memory store otherwise.
///
/// A hub that fails to authenticate falls back to memory so the server still starts;
/// bookings made then only live until restart.
pub async fn calendar_service(config: &AppConfig) -> Arc<dyn CalendarService> {
    if let (true, Some(gcal)) = (is_gcal_enabled(config), config.gcal.as_ref()) {
        info!("Initializing Google Calendar service...");
        let hub = log_result(
            create_calendar_hub(gcal).await,
            "Google Calendar hub created",
            "Failed to create Google Calendar hub",
        );
        if let Ok(hub) = hub {
            return Arc::new(GoogleCalendarService::new(Arc::new(hub)));
        }
        warn!("Falling back to the in-memory calendar");
    } else {
        warn!("Google Calendar disabled via runtime config; using the in-memory calendar");
    }
    Arc::new(MemoryCalendarService::new())
}
