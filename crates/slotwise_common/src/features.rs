//! Runtime feature checks.
//!
//! Compile-time flags (`#[cfg(feature = "gcal")]`) decide what is built; these helpers
//! decide what is switched on by configuration.

use slotwise_config::AppConfig;

/// A feature is on when its flag is set and its configuration section is present.
pub fn is_feature_enabled<T>(use_feature: bool, feature_config: Option<&T>) -> bool {
    use_feature && feature_config.is_some()
}

/// Check if the Google Calendar provider should be used.
pub fn is_gcal_enabled(config: &AppConfig) -> bool {
    is_feature_enabled(config.use_gcal, config.gcal.as_ref())
}
