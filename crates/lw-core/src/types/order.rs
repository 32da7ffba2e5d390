//! Order representations.
//!
//! Two layers:
//!
//! - [`OrderDoc`]: the raw, loosely-typed document as the order store holds
//!   it. Field names drifted over time, so nothing here assumes a schema.
//! - [`Order`]: the typed view produced once by the
//!   [normalizer](crate::normalize). Evaluation only ever sees this type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::enums::{OrderClass, OrderStatus, Side};
use super::market_data::InstrumentToken;

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

/// An order document as stored, keyed by its document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDoc {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl OrderDoc {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), fields }
    }

    /// Build a document from a JSON object carrying its own `"id"` field.
    ///
    /// Returns `None` if `value` is not an object or has no string/number id.
    pub fn from_json(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let id = match fields.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self { id, fields })
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ---------------------------------------------------------------------------
// Typed order
// ---------------------------------------------------------------------------

/// Execution parameters of an order, fixed at normalization time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Plain limit order.
    Limit { limit: f64 },
    /// Stop-loss limit: `trigger` arms, `limit` governs the fill.
    StopLimit { trigger: f64, limit: f64 },
    /// Stop-loss market: fills at any price once armed, unless an explicit
    /// limit was recorded on the document.
    StopMarket { trigger: f64, limit: Option<f64> },
}

impl OrderKind {
    pub fn class(&self) -> OrderClass {
        match self {
            Self::Limit { .. } => OrderClass::Limit,
            Self::StopLimit { .. } => OrderClass::StopLimit,
            Self::StopMarket { .. } => OrderClass::StopMarket,
        }
    }

    #[inline]
    pub fn is_stop(&self) -> bool {
        self.class().is_stop()
    }

    pub fn trigger(&self) -> Option<f64> {
        match *self {
            Self::Limit { .. } => None,
            Self::StopLimit { trigger, .. } | Self::StopMarket { trigger, .. } => Some(trigger),
        }
    }

    pub fn limit(&self) -> Option<f64> {
        match *self {
            Self::Limit { limit } | Self::StopLimit { limit, .. } => Some(limit),
            Self::StopMarket { limit, .. } => limit,
        }
    }
}

/// A normalized order the engine can evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub instrument_token: InstrumentToken,
    pub side: Side,
    pub quantity: u64,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// Stop orders only: set once the trigger has been crossed and persisted.
    pub triggered: bool,
    pub trade_id: Option<String>,
}

impl Order {
    /// Whether the engine should still be looking at this order at all.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.status.is_open() && self.trade_id.is_none()
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order({} {} {} x{} {}",
            self.id,
            self.kind.class().label(),
            self.side,
            self.quantity,
            self.instrument_token
        )?;
        if let Some(t) = self.kind.trigger() {
            write!(f, " trg={t:.2}")?;
        }
        if let Some(l) = self.kind.limit() {
            write!(f, " lmt={l:.2}")?;
        }
        write!(f, " {}{})", self.status, if self.triggered { " armed" } else { "" })
    }
}
