use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) fn sleep_ms(duration: u64) {
    std::thread::sleep(Duration::from_millis(duration));
}

/// Milliseconds since the Unix epoch.
pub(crate) fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
