//! Trade records produced by the engine.

use serde::{Deserialize, Serialize};

use super::enums::{Side, TradeStatus};
use super::market_data::InstrumentToken;

/// A trade created by the fill transaction.
///
/// `order_id` is a back-reference only; the order owns its `trade_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub order_id: String,
    pub account_id: String,
    pub instrument_token: InstrumentToken,
    pub side: Side,
    pub quantity: u64,
    /// Always the price of the tick that caused the fill.
    pub fill_price: f64,
    pub status: TradeStatus,
    /// Milliseconds since Unix epoch.
    pub created_at: u64,
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade({} order={} {} {}x{} @ {:.2})",
            self.id, self.order_id, self.side, self.instrument_token, self.quantity, self.fill_price
        )
    }
}
