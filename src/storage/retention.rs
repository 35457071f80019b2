//! Retention rule for versioned outputs.

use crate::Timestamp;
use crate::utils::config::MILLIS_PER_DAY;

/// Retention value meaning "keep forever".
pub const KEEP_FOREVER: i32 = -1;

/// Age in whole days of a version written at `version` relative to `now`. Negative when the
/// version is newer than `now`.
pub fn age_in_days(now: Timestamp, version: Timestamp) -> i64 {
    (now - version) / MILLIS_PER_DAY
}

/// True if a version written at `version` should be purged at `now`.
///
/// - `retention_days <= -1`: never.
/// - `retention_days == 0`: every version not newer than `now`.
/// - otherwise: versions older than `retention_days` whole days.
pub fn is_expired(now: Timestamp, version: Timestamp, retention_days: i32) -> bool {
    if retention_days <= KEEP_FOREVER || version > now {
        return false;
    }
    retention_days == 0 || age_in_days(now, version) > i64::from(retention_days)
}
