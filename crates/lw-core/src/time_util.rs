//! Wall-clock timestamps.
//!
//! Ticks and fill records carry **milliseconds since Unix epoch**.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since Unix epoch. A clock set before the
/// epoch reads as zero.
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}
