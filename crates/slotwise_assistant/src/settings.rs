// --- File: crates/slotwise_assistant/src/settings.rs ---
//! Typed view of the `[assistant]` config section.

use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;
use slotwise_common::{config_error, SlotwiseError};
use slotwise_config::{AppConfig, AssistantConfig};
use std::str::FromStr;

use crate::availability::ResolverOptions;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub time_zone: Tz,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub working_days: Vec<Weekday>,
    pub default_duration: Duration,
    /// `None` offers whole free segments instead of discrete starts.
    pub step: Option<Duration>,
    pub display_limit: usize,
    pub idle_timeout: Duration,
    pub max_turns: u32,
    pub default_title: String,
    pub reschedule_lookahead: Duration,
    pub calendar_id: String,
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, SlotwiseError> {
        Self::from_assistant_config(&config.assistant, config.calendar_id())
    }

    pub fn from_assistant_config(
        config: &AssistantConfig,
        calendar_id: &str,
    ) -> Result<Self, SlotwiseError> {
        let time_zone = Tz::from_str(&config.time_zone)
            .map_err(|e| config_error(format!("assistant.time_zone: {}", e)))?;
        let work_start = parse_clock(&config.work_start_time, "assistant.work_start_time")?;
        let work_end = parse_clock(&config.work_end_time, "assistant.work_end_time")?;
        if work_end <= work_start {
            return Err(config_error(
                "assistant.work_end_time must be after work_start_time",
            ));
        }

        let working_days = config
            .working_days
            .iter()
            .map(|d| {
                Weekday::from_str(d)
                    .map_err(|_| config_error(format!("assistant.working_days: unknown day {}", d)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if config.default_duration_minutes <= 0 {
            return Err(config_error(
                "assistant.default_duration_minutes must be positive",
            ));
        }
        if config.max_turns == 0 {
            return Err(config_error("assistant.max_turns must be at least 1"));
        }

        Ok(Self {
            time_zone,
            work_start,
            work_end,
            working_days,
            default_duration: Duration::minutes(config.default_duration_minutes),
            step: (config.slot_step_minutes > 0).then(|| Duration::minutes(config.slot_step_minutes)),
            display_limit: config.display_limit,
            idle_timeout: Duration::minutes(config.session_idle_timeout_minutes.max(1)),
            max_turns: config.max_turns,
            default_title: config.default_title.clone(),
            reschedule_lookahead: Duration::days(config.reschedule_lookahead_days.max(1)),
            calendar_id: calendar_id.to_string(),
        })
    }

    /// Days outside the working week, skipped for multi-day requests.
    pub fn non_working_days(&self) -> Vec<Weekday> {
        ALL_WEEKDAYS
            .iter()
            .copied()
            .filter(|d| !self.working_days.contains(d))
            .collect()
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            step: self.step,
            display_limit: Some(self.display_limit),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            time_zone: Tz::UTC,
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            working_days: ALL_WEEKDAYS[..5].to_vec(),
            default_duration: Duration::minutes(60),
            step: Some(Duration::minutes(30)),
            display_limit: 5,
            idle_timeout: Duration::minutes(30),
            max_turns: 12,
            default_title: "Meeting".to_string(),
            reschedule_lookahead: Duration::days(30),
            calendar_id: "primary".to_string(),
        }
    }
}

fn parse_clock(value: &str, field: &str) -> Result<NaiveTime, SlotwiseError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| config_error(format!("{}: expected HH:MM, got {} ({})", field, value, e)))
}
