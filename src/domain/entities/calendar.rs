//! Calendar configuration entities module
//!
//! Shift schedules, public holidays, and the working-hours window are
//! configuration rows read once per scheduling call.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shift definition for one weekday (0 = Sunday .. 6 = Saturday)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftSchedule {
    pub day_of_week: u8,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub is_working_day: bool,
    pub is_active: bool,
}

/// A public holiday; active holidays override the shift schedule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicHoliday {
    pub date: NaiveDate,
    pub description: Option<String>,
    pub is_active: bool,
}

/// The working window applied to every working day
///
/// Hours are local wall-clock in the configured timezone. A busy-period
/// override replaces the normal window while active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingHoursConfig {
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub work_end_minute: u32,
    /// IANA timezone name all wall-clock comparisons run in
    pub timezone: String,
    /// Working days added to a tentative completion as an SLA buffer
    pub sla_buffer_working_days: i64,
}

impl Default for WorkingHoursConfig {
    fn default() -> Self {
        Self {
            work_start_hour: 8,
            work_end_hour: 16,
            work_end_minute: 30,
            timezone: "Africa/Johannesburg".to_string(),
            sla_buffer_working_days: 1,
        }
    }
}

impl WorkingHoursConfig {
    /// Length of the working window in minutes
    pub fn daily_working_minutes(&self) -> i64 {
        (self.work_end_hour as i64 - self.work_start_hour as i64) * 60
            + self.work_end_minute as i64
    }

    /// Builds the config from `app_settings` key/value rows
    ///
    /// Unknown or malformed values fall back to the defaults. When
    /// `busy_period_active` is set, the busy window keys replace the
    /// normal window.
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_u32(settings, "work_start_hour", 24) {
            config.work_start_hour = v;
        }
        if let Some(v) = parse_u32(settings, "work_end_hour", 24) {
            config.work_end_hour = v;
        }
        if let Some(v) = parse_u32(settings, "work_end_minute", 60) {
            config.work_end_minute = v;
        }

        let busy_active = settings
            .get("busy_period_active")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        if busy_active {
            if let Some(v) = parse_u32(settings, "busy_start_hour", 24) {
                config.work_start_hour = v;
            }
            if let Some(v) = parse_u32(settings, "busy_end_hour", 24) {
                config.work_end_hour = v;
            }
            if let Some(v) = parse_u32(settings, "busy_end_minute", 60) {
                config.work_end_minute = v;
            }
        }

        if let Some(tz) = settings.get("timezone") {
            if !tz.is_empty() {
                config.timezone = tz.clone();
            }
        }
        if let Some(v) = settings
            .get("sla_buffer_working_days")
            .and_then(|v| v.parse::<i64>().ok())
        {
            if v >= 0 {
                config.sla_buffer_working_days = v;
            }
        }

        config
    }
}

fn parse_u32(settings: &HashMap<String, String>, key: &str, limit: u32) -> Option<u32> {
    settings
        .get(key)
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v < limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let config = WorkingHoursConfig::default();
        assert_eq!(config.daily_working_minutes(), 510);
    }

    #[test]
    fn test_from_settings_overrides() {
        let mut settings = HashMap::new();
        settings.insert("work_start_hour".to_string(), "7".to_string());
        settings.insert("work_end_hour".to_string(), "15".to_string());
        settings.insert("work_end_minute".to_string(), "0".to_string());
        settings.insert("sla_buffer_working_days".to_string(), "2".to_string());

        let config = WorkingHoursConfig::from_settings(&settings);
        assert_eq!(config.work_start_hour, 7);
        assert_eq!(config.daily_working_minutes(), 480);
        assert_eq!(config.sla_buffer_working_days, 2);
    }

    #[test]
    fn test_busy_period_replaces_window() {
        let mut settings = HashMap::new();
        settings.insert("busy_period_active".to_string(), "true".to_string());
        settings.insert("busy_start_hour".to_string(), "6".to_string());
        settings.insert("busy_end_hour".to_string(), "18".to_string());
        settings.insert("busy_end_minute".to_string(), "0".to_string());

        let config = WorkingHoursConfig::from_settings(&settings);
        assert_eq!(config.work_start_hour, 6);
        assert_eq!(config.work_end_hour, 18);
        assert_eq!(config.daily_working_minutes(), 720);
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let mut settings = HashMap::new();
        settings.insert("work_start_hour".to_string(), "not-a-number".to_string());
        settings.insert("work_end_hour".to_string(), "25".to_string());

        let config = WorkingHoursConfig::from_settings(&settings);
        assert_eq!(config.work_start_hour, 8);
        assert_eq!(config.work_end_hour, 16);
    }
}
