use crate::dates::{DayBoundary, DEFAULT_DAY_END_HOUR};
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite://immersion.db";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Five minutes past the day-end hour, every day.
fn default_refresh_schedule(day_end_hour: u32) -> String {
    format!("0 5 {} * * *", day_end_hour)
}

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub day_end_hour: u32,
    pub timezone: Tz,
    pub streak_refresh_schedule: Schedule,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset and blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .ok_or_else(|| anyhow!("DISCORD_TOKEN environment variable is required"))?;

        let day_end_hour = match get("DAY_END_HOUR") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|hour| *hour < 24)
                .ok_or_else(|| anyhow!("DAY_END_HOUR must be an hour between 0 and 23, got '{}'", raw))?,
            None => DEFAULT_DAY_END_HOUR,
        };

        let timezone_name = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| anyhow!("TIMEZONE '{}' is not a known IANA timezone", timezone_name))?;

        let schedule_expr =
            get("STREAK_REFRESH_SCHEDULE").unwrap_or_else(|| default_refresh_schedule(day_end_hour));
        let streak_refresh_schedule = Schedule::from_str(&schedule_expr)
            .with_context(|| format!("STREAK_REFRESH_SCHEDULE '{}' is not a valid cron expression", schedule_expr))?;

        Ok(Config {
            discord_token,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            day_end_hour,
            timezone,
            streak_refresh_schedule,
        })
    }

    pub fn day_boundary(&self) -> DayBoundary {
        DayBoundary::new(self.day_end_hour, self.timezone)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("day_end_hour", &self.day_end_hour)
            .field("timezone", &self.timezone)
            .field("streak_refresh_schedule", &self.streak_refresh_schedule.to_string())
            .finish()
    }
}
