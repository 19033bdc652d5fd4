use chrono::Weekday;
use pulse_common::error::{PulseError, PulseResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub admin_api_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> PulseResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", "8080")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Knobs for the scoring engine and its recurring jobs. All hours are UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSettings {
    pub week_start: Weekday,
    pub daily_hour: u32,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub cleanup_weekday: Weekday,
    pub cleanup_hour: u32,
    pub insight_retention_days: i64,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            daily_hour: 2,
            business_start_hour: 8,
            business_end_hour: 20,
            cleanup_weekday: Weekday::Sun,
            cleanup_hour: 0,
            insight_retention_days: 30,
        }
    }
}

impl ProgressSettings {
    pub fn from_env() -> PulseResult<Self> {
        let _ = dotenvy::dotenv();

        let settings = Self {
            week_start: parse_weekday("PROGRESS_WEEK_START", "sunday")?,
            daily_hour: parse_var("SCHEDULER_DAILY_HOUR", "2")?,
            business_start_hour: parse_var("SCHEDULER_BUSINESS_START_HOUR", "8")?,
            business_end_hour: parse_var("SCHEDULER_BUSINESS_END_HOUR", "20")?,
            cleanup_weekday: parse_weekday("SCHEDULER_CLEANUP_WEEKDAY", "sunday")?,
            cleanup_hour: parse_var("SCHEDULER_CLEANUP_HOUR", "0")?,
            insight_retention_days: parse_var("INSIGHT_RETENTION_DAYS", "30")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> PulseResult<()> {
        for (name, hour) in [
            ("SCHEDULER_DAILY_HOUR", self.daily_hour),
            ("SCHEDULER_BUSINESS_START_HOUR", self.business_start_hour),
            ("SCHEDULER_BUSINESS_END_HOUR", self.business_end_hour),
            ("SCHEDULER_CLEANUP_HOUR", self.cleanup_hour),
        ] {
            if hour > 23 {
                return Err(PulseError::Config(format!(
                    "{name} must be between 0 and 23, got {hour}"
                )));
            }
        }
        if self.business_start_hour > self.business_end_hour {
            return Err(PulseError::Config(format!(
                "business hours window is inverted: {} > {}",
                self.business_start_hour, self.business_end_hour
            )));
        }
        if self.insight_retention_days < 0 {
            return Err(PulseError::Config(
                "INSIGHT_RETENTION_DAYS must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_var(key: &str) -> PulseResult<String> {
    env::var(key).map_err(|_| PulseError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var<T>(key: &str, default: &str) -> PulseResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_var_or(key, default)
        .trim()
        .parse()
        .map_err(|e| PulseError::Config(format!("invalid {key}: {e}")))
}

fn parse_weekday(key: &str, default: &str) -> PulseResult<Weekday> {
    let raw = get_var_or(key, default);
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| PulseError::Config(format!("invalid {key}: {raw}")))
}
