// --- File: crates/slotwise_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Google Calendar Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GcalConfig {
    pub key_path: Option<String>,    // Service account JSON, may be "secret_from_env"
    pub calendar_id: Option<String>, // Defaults to "primary"
}

// --- Assistant Config ---
// Everything the scheduling conversation needs besides the calendar itself.
// Times are "HH:MM" in `time_zone`; days are "Mon".."Sun".
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_work_start")]
    pub work_start_time: String,
    #[serde(default = "default_work_end")]
    pub work_end_time: String,
    #[serde(default = "default_working_days")]
    pub working_days: Vec<String>,
    #[serde(default = "default_duration")]
    pub default_duration_minutes: i64,
    #[serde(default = "default_step")]
    pub slot_step_minutes: i64, // 0 disables enumeration of discrete starts
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
    #[serde(default = "default_idle_timeout")]
    pub session_idle_timeout_minutes: i64,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_title")]
    pub default_title: String,
    #[serde(default = "default_lookahead")]
    pub reschedule_lookahead_days: i64,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}
fn default_work_start() -> String {
    "09:00".to_string()
}
fn default_work_end() -> String {
    "17:00".to_string()
}
fn default_working_days() -> Vec<String> {
    ["Mon", "Tue", "Wed", "Thu", "Fri"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}
fn default_duration() -> i64 {
    60
}
fn default_step() -> i64 {
    30
}
fn default_display_limit() -> usize {
    5
}
fn default_idle_timeout() -> i64 {
    30
}
fn default_max_turns() -> u32 {
    12
}
fn default_title() -> String {
    "Meeting".to_string()
}
fn default_lookahead() -> i64 {
    30
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            work_start_time: default_work_start(),
            work_end_time: default_work_end(),
            working_days: default_working_days(),
            default_duration_minutes: default_duration(),
            slot_step_minutes: default_step(),
            display_limit: default_display_limit(),
            session_idle_timeout_minutes: default_idle_timeout(),
            max_turns: default_max_turns(),
            default_title: default_title(),
            reschedule_lookahead_days: default_lookahead(),
        }
    }
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_gcal: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub gcal: Option<GcalConfig>,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Calendar to read from and write to, whichever provider is active.
    pub fn calendar_id(&self) -> &str {
        self.gcal
            .as_ref()
            .and_then(|g| g.calendar_id.as_deref())
            .unwrap_or("primary")
    }
}
