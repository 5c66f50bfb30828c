/// Site staleness detection.
///
/// Field units report on a fixed cadence. A unit that falls silent during a
/// storm is dangerous: its last alert keeps showing on the dashboard as if it
/// were current. The staleness check lets the pipeline flag those sites.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so staleness is deterministic in tests.

use chrono::{DateTime, Utc};

/// Seconds between `last_reading` and `now` (negative if in the future).
pub fn age_secs(last_reading: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_reading).num_seconds()
}

/// Returns `true` if `last_reading` is older than `max_age_secs` at `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_secs  →  stale
///   age == max_age_secs →  not stale
pub fn is_stale_at(last_reading: DateTime<Utc>, max_age_secs: i64, now: DateTime<Utc>) -> bool {
    age_secs(last_reading, now) > max_age_secs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
