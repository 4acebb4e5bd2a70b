// --- File: crates/slotwise_common/src/lib.rs ---

pub mod error; // Error handling
#[cfg(test)]
mod error_test;
pub mod features; // Feature flag handling
pub mod http; // HTTP utilities
pub mod logging; // Logging utilities
pub mod routes; // Route definitions
pub mod services; // Service abstractions

// Re-export the routes function to be used by the main backend service
pub use routes::routes;

pub use error::{
    config_error, conflict, external_service_error, validation_error,
    HttpStatusCode, SlotwiseError,
};

pub use http::IntoHttpResponse;

pub use logging::{init, init_with_level, log_error, log_result};

pub use features::{is_feature_enabled, is_gcal_enabled};

pub use services::{
    BoxFuture, CalendarError, CalendarEvent, CalendarEventResult, CalendarService, NewEvent,
};
