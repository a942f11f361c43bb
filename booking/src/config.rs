use std::time::Duration;

use crate::calendar::Calendar;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the booking REST API, without a trailing slash.
    pub api_base_url: String,

    /// Per-request timeout for remote calls.
    ///
    /// A request that outlives it fails as a retryable network error; it is
    /// never treated as success.
    pub request_timeout: Duration,

    /// Connection string of the local key-value cache.
    pub database_url: String,

    /// Timezone used to turn a calendar day into `[startOfDay, endOfDay]`.
    ///
    /// Host local time unless `BOOKING_UTC_OFFSET_MINUTES` pins a fixed offset.
    pub calendar: Calendar,

    /// Emit JSON logs instead of the pretty human format.
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let api_base_url = lookup("BOOKING_API_URL")
            .unwrap_or_else(|| "http://localhost:5005/api".to_string())
            .trim_end_matches('/')
            .to_string();

        let timeout_ms = match lookup("BOOKING_API_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                AppError::Config(format!("BOOKING_API_TIMEOUT_MS is not a number: {raw}"))
            })?,
            None => 5_000,
        };

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://venue_booking.db?mode=rwc".to_string());

        let calendar = match lookup("BOOKING_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(Calendar::from_offset_minutes)
                .ok_or_else(|| {
                    AppError::Config(format!("BOOKING_UTC_OFFSET_MINUTES is invalid: {raw}"))
                })?,
            None => Calendar::Local,
        };

        let json_logs = lookup("APP_ENV").is_some_and(|v| v == "production");

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_millis(timeout_ms),
            database_url,
            calendar,
            json_logs,
        })
    }
}
