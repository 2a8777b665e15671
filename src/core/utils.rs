//! Shared helpers

/// Milliseconds since the Unix epoch.
///
/// Used to stamp change-feed entries and sync packets. Falls back to 0 if
/// the system clock is before the epoch.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
