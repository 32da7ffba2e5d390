//! Market data carried into the engine.

use serde::{Deserialize, Serialize};

/// Numeric instrument identifier used by the price feed.
pub type InstrumentToken = u64;

/// A last-traded-price update for one instrument.
///
/// Ticks are ephemeral: the engine never persists them, it only copies the
/// price of the tick that caused a fill into the trade record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument_token: InstrumentToken,
    pub price: f64,
    /// Milliseconds since Unix epoch.
    pub timestamp_ms: u64,
}

impl Tick {
    pub fn new(instrument_token: InstrumentToken, price: f64, timestamp_ms: u64) -> Self {
        Self { instrument_token, price, timestamp_ms }
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tick({} ltp={:.2} ts={})", self.instrument_token, self.price, self.timestamp_ms)
    }
}
