//! Iteration timestamps: epoch milliseconds on disk, `yyyy-MM-dd-HH:mm` (UTC) in logs.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::Timestamp;

const HUMAN_FORMAT: &str = "%Y-%m-%d-%H:%M";

/// Current time as epoch milliseconds.
pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Minute-granularity human form of `timestamp`. Out-of-range values fall back to the raw number.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|dt| dt.format(HUMAN_FORMAT).to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Inverse of [`format_timestamp`]; seconds are always zero.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(s.trim(), HUMAN_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
