//! Per-instrument tick ordering.
//!
//! Ticks for one instrument are expected in order, but a reconnecting or
//! redundant feed can replay an older price. [`TickSequencer`] keeps the
//! last accepted timestamp per instrument and rejects anything older, so a
//! stale price can never arm or fill an order.

use ahash::AHashMap;
use lw_core::types::{InstrumentToken, Tick};

/// Last-timestamp filter keyed by instrument token.
///
/// Equal timestamps are accepted: feeds with millisecond resolution emit
/// several prices within the same millisecond.
///
/// # Thread safety
///
/// Not thread-safe. The engine loop owns its own instance.
pub struct TickSequencer {
    last_ts: AHashMap<InstrumentToken, u64>,
}

impl TickSequencer {
    pub fn new() -> Self {
        Self { last_ts: AHashMap::new() }
    }

    /// Returns `true` if `tick` is not older than the last accepted tick for
    /// its instrument, recording it as the new high-water mark.
    #[inline]
    pub fn check_and_update(&mut self, tick: &Tick) -> bool {
        let entry = self.last_ts.entry(tick.instrument_token).or_insert(0);
        if tick.timestamp_ms >= *entry {
            *entry = tick.timestamp_ms;
            true
        } else {
            false
        }
    }

    /// Returns the last accepted timestamp for an instrument, or `None`.
    pub fn last_ts(&self, token: InstrumentToken) -> Option<u64> {
        self.last_ts.get(&token).copied()
    }

    /// Drop state for an instrument that is no longer watched.
    pub fn forget(&mut self, token: InstrumentToken) {
        self.last_ts.remove(&token);
    }
}

impl Default for TickSequencer {
    fn default() -> Self {
        Self::new()
    }
}
