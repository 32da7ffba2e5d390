//! Enumerations used throughout limitwatch.
//!
//! Wire spellings are `SCREAMING_SNAKE_CASE`, matching what the order store
//! persists. Parsing from store text is case-insensitive and tolerates the
//! spelling variants seen in older documents.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse a side from store text (`"BUY"`, `"b"`, `"Sell"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Some(Self::Buy),
            "SELL" | "S" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// Order status as persisted in the order store.
///
/// `Filled` is written only by the engine; `Cancelled` and `Rejected` only by
/// external flows. The rest form the open set the engine watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Pending,
    Placed,
    Scheduled,
    ToExecute,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Statuses under which an order is still waiting for execution.
    pub const OPEN_SET: [OrderStatus; 5] = [
        OrderStatus::Open,
        OrderStatus::Pending,
        OrderStatus::Placed,
        OrderStatus::Scheduled,
        OrderStatus::ToExecute,
    ];

    #[inline]
    pub fn is_open(&self) -> bool {
        Self::OPEN_SET.contains(self)
    }

    /// Parse a status from store text. Separators and case are ignored, and
    /// the US spelling `CANCELED` is accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match compact.as_str() {
            "OPEN" => Some(Self::Open),
            "PENDING" => Some(Self::Pending),
            "PLACED" => Some(Self::Placed),
            "SCHEDULED" => Some(Self::Scheduled),
            "TOEXECUTE" => Some(Self::ToExecute),
            "FILLED" | "EXECUTED" | "COMPLETE" => Some(Self::Filled),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Pending => "PENDING",
            Self::Placed => "PLACED",
            Self::Scheduled => "SCHEDULED",
            Self::ToExecute => "TO_EXECUTE",
            Self::Filled => "FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order class
// ---------------------------------------------------------------------------

/// Order family recognized from the free-form type fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderClass {
    /// Plain limit order.
    Limit,
    /// Stop-loss market (SL-M): trigger only, fills unconditionally once armed.
    StopMarket,
    /// Stop-loss limit (SL-L / STOP_LIMIT): trigger arms, limit governs fill.
    StopLimit,
}

impl OrderClass {
    #[inline]
    pub fn is_stop(&self) -> bool {
        !matches!(self, Self::Limit)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::StopMarket => "SL-M",
            Self::StopLimit => "SL-L",
        }
    }
}

// ---------------------------------------------------------------------------
// Trade status
// ---------------------------------------------------------------------------

/// Status of a trade record. The engine only ever creates `Active` trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Active,
}
