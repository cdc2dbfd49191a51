use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch.
///
/// A clock set before the epoch reads as zero, which makes every session look expired rather
/// than valid forever.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Adds a duration to a millisecond timestamp, saturating at `u64::MAX`.
pub fn add_millis(timestamp: u64, duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    timestamp.saturating_add(millis)
}

/// Truncates a bearer value for logs. Only the first 10 characters are kept.
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(10).collect();
    format!("{prefix}...")
}
