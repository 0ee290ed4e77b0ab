//! Shared utility functions used across multiple modules.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

/// Longest lifetime accepted for any token or cookie (ten years).
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Source of the current time, injectable so expiry logic can be tested.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clock backed by the system time.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Convert a configured number of seconds into a `TimeDelta`, clamped to
/// [`MAX_LIFETIME_SECS`].
pub fn lifetime(secs: u64) -> TimeDelta {
    let clamped = secs.min(MAX_LIFETIME_SECS);
    TimeDelta::seconds(i64::try_from(clamped).unwrap_or(i64::MAX))
}
