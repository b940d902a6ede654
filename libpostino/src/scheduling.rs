//! Timezone boundary conversion and schedule parsing.
//!
//! Everything persistent works in UTC Unix timestamps. The operator's named
//! timezone (Europe/Rome by default) exists only here, at the input/output
//! edge: local wall-clock input is converted to UTC exactly once on the way
//! in, and back exactly once for display.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ConfigError, PostinoError, Result};

/// Wall-clock input format accepted from the operator, e.g. "2025-03-10 09:00".
pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Resolve a named timezone such as "Europe/Rome".
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()).into())
}

/// Convert a local wall-clock time in `tz` to a UTC instant.
///
/// An ambiguous local time (the repeated hour when DST ends) resolves to the
/// earlier instant. A local time that does not exist (the skipped hour when
/// DST starts) is rejected.
pub fn to_utc(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => Err(PostinoError::InvalidInput(format!(
            "Local time {} does not exist in {}",
            local, tz
        ))),
    }
}

/// Convert a UTC instant to the operator's local time for display.
pub fn to_local(instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    instant.with_timezone(&tz)
}

/// Parse a schedule string into a UTC Unix timestamp.
///
/// Accepts either an absolute local wall-clock time ("2025-03-10 09:00",
/// interpreted in `tz`) or a relative duration from now ("30m", "2h", "1d").
pub fn parse_schedule(input: &str, tz: Tz) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PostinoError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Ok(local) = NaiveDateTime::parse_from_str(input, LOCAL_FORMAT) {
        return Ok(to_utc(local, tz)?.timestamp());
    }

    // "+2h" and "2h" both mean two hours from now
    let relative = input.strip_prefix('+').unwrap_or(input);
    if let Ok(std_duration) = humantime::parse_duration(relative) {
        let when = i64::try_from(std_duration.as_secs())
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| Utc::now().checked_add_signed(d))
            .ok_or_else(|| PostinoError::InvalidInput("Duration out of range".to_string()))?;
        return Ok(when.timestamp());
    }

    Err(PostinoError::InvalidInput(format!(
        "Could not parse schedule: '{}'. Use '{}' or a duration like '2h'",
        input, LOCAL_FORMAT
    )))
}

/// Render a UTC timestamp as local wall-clock text for listings.
pub fn format_local(timestamp: i64, tz: Tz) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(instant) => to_local(instant, tz).format(LOCAL_FORMAT).to_string(),
        None => format!("invalid timestamp {}", timestamp),
    }
}

/// Render a UTC timestamp as an ISO-8601 UTC string for the wire.
pub fn format_utc_iso(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
