//! Wire timestamps.
//!
//! All timestamps on the wire are milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
