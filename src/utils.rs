//! General utilities.

use chrono::{DateTime, Utc};

/// Current time.
///
/// When `WTPORT_TEST_EPOCH` is set (by tests), returns that Unix timestamp
/// instead of the wall clock. All code that stores or displays timestamps
/// should go through this function rather than `Utc::now()`.
pub fn now() -> DateTime<Utc> {
    std::env::var("WTPORT_TEST_EPOCH")
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Compact, sortable UTC stamp used as the prefix of snapshot ids.
pub fn compact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S-%3f").to_string()
}

/// Human-readable age such as "5m ago" or "3d ago".
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 0 {
        return "in the future".to_string();
    }
    match secs {
        0..60 => "just now".to_string(),
        60..3600 => format!("{}m ago", secs / 60),
        3600..86_400 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
