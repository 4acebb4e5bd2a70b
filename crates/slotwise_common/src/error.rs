// --- File: crates/slotwise_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

use crate::services::CalendarError;

/// The base error type for all Slotwise errors.
///
/// Each crate can extend this by implementing From<SpecificError> for SlotwiseError.
#[derive(Error, Debug)]
pub enum SlotwiseError {
    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a conflict (e.g., resource already exists)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to rate limiting
    #[error("Rate limited: {0}")]
    RateLimitError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for SlotwiseError {
    fn status_code(&self) -> u16 {
        match self {
            SlotwiseError::ConfigError(_) => 500,
            SlotwiseError::AuthError(_) => 401,
            SlotwiseError::ValidationError(_) => 400,
            SlotwiseError::ExternalServiceError { .. } => 502,
            SlotwiseError::ConflictError(_) => 409,
            SlotwiseError::NotFoundError(_) => 404,
            SlotwiseError::RateLimitError(_) => 429,
        }
    }
}

impl From<CalendarError> for SlotwiseError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::RateLimited(msg) => SlotwiseError::RateLimitError(msg),
            CalendarError::AuthExpired(msg) => SlotwiseError::AuthError(msg),
            CalendarError::Conflict => conflict("requested slot is already taken"),
            CalendarError::AlreadyExists(id) => conflict(format!("event {id} already exists")),
            CalendarError::NotFound(id) => SlotwiseError::NotFoundError(id),
            CalendarError::InvalidEvent(msg) => SlotwiseError::ValidationError(msg),
            CalendarError::Ambiguous(msg) | CalendarError::Unavailable(msg) => {
                external_service_error("calendar", msg)
            }
        }
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> SlotwiseError {
    SlotwiseError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> SlotwiseError {
    SlotwiseError::ValidationError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> SlotwiseError {
    SlotwiseError::ConflictError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> SlotwiseError {
    SlotwiseError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}
