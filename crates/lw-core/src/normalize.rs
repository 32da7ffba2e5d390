//! Order field normalizer.
//!
//! Turns a raw [`OrderDoc`] into a typed [`Order`]. Documents written by
//! different client generations name the same value differently, so every
//! logical field is resolved from an ordered list of candidate keys.
//!
//! # Rules
//!
//! 1. **Class**: each order-type, price-type and kind value is upper-cased,
//!    stripped of separators and matched as a whole word. `SLM` (or a stop
//!    word in one field and `MARKET` in another) means SL-M; `SL` / `SL-L` /
//!    `STOP...` means SL-L; `GTT` and bare `MARKET` orders are not handled
//!    here; everything else is a plain limit.
//! 2. **Trigger**: first positive candidate in [`TRIGGER_FIELDS`]. Only SL-M
//!    may fall back to `price` (its trigger *is* its reference price).
//! 3. **Limit**: first positive candidate in [`LIMIT_FIELDS`]. SL-L and
//!    plain limits fall back to `price`; SL-M never does.
//!
//! A value that cannot be resolved yields a [`NormalizeError`] and the order
//! is left out of evaluation. No threshold is ever guessed.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::NormalizeError;
use crate::fields::{any_true, first_positive, first_str, first_u64, parse_str_f64};
use crate::types::{Order, OrderClass, OrderDoc, OrderKind, OrderStatus, Side};

// ---------------------------------------------------------------------------
// Candidate field names, in priority order
// ---------------------------------------------------------------------------

pub const ORDER_TYPE_FIELDS: &[&str] = &["order_type", "orderType"];
pub const PRICE_TYPE_FIELDS: &[&str] = &["price_type", "priceType"];
pub const KIND_FIELDS: &[&str] = &["kind"];

pub const TRIGGER_FIELDS: &[&str] = &[
    "trigger_price",
    "triggerPrice",
    "stop_price",
    "stopPrice",
    "sl_trigger",
    "slTrigger",
    "sl_trigger_price",
    "slTriggerPrice",
    "trigger",
];

pub const LIMIT_FIELDS: &[&str] = &[
    "limit_price",
    "limitPrice",
    "sl_limit",
    "slLimit",
    "sl_limit_price",
    "slLimitPrice",
    "limit",
];

/// Reference price field shared by every order type.
pub const PRICE_FIELD: &str = "price";

pub const TOKEN_FIELDS: &[&str] = &["instrument_token", "instrumentToken", "token", "instrument_id"];
pub const SIDE_FIELDS: &[&str] = &["side", "transaction_type", "transactionType", "action"];
pub const QUANTITY_FIELDS: &[&str] = &["quantity", "qty"];
pub const STATUS_FIELDS: &[&str] = &["status", "order_status", "orderStatus"];
pub const TRIGGERED_FIELDS: &[&str] = &["triggered", "is_triggered", "isTriggered", "sl_triggered"];
pub const TRADE_ID_FIELDS: &[&str] = &["trade_id", "tradeId"];

// ---------------------------------------------------------------------------
// Canonical keys the engine writes
// ---------------------------------------------------------------------------

pub const STATUS_KEY: &str = "status";
pub const TRIGGERED_KEY: &str = "triggered";
pub const TRADE_ID_KEY: &str = "trade_id";
pub const FILL_PRICE_KEY: &str = "fill_price";
pub const FILLED_AT_KEY: &str = "filled_at";

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

/// What one type field says about the order family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeWord {
    StopMarket,
    StopLimit,
    Market,
    Gtt,
    Other,
}

const STOP_MARKET_WORDS: &[&str] = &["SLM", "SLMARKET", "STOPMARKET", "STOPLOSSMARKET"];
const STOP_LIMIT_WORDS: &[&str] = &["SL", "SLL", "SLLIMIT", "STOP", "STOPLOSS", "STOPLIMIT", "STOPLOSSLIMIT"];
const MARKET_WORDS: &[&str] = &["MARKET", "MKT"];

/// Classify a single field value. Separators inside the value are ignored
/// (`SL-M`, `sl limit`, `STOP_MARKET`) but the whole value must match a
/// known word; nothing is matched across field boundaries.
fn type_word(raw: &str) -> TypeWord {
    let word: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if word.starts_with("GTT") {
        TypeWord::Gtt
    } else if STOP_MARKET_WORDS.contains(&word.as_str()) {
        TypeWord::StopMarket
    } else if STOP_LIMIT_WORDS.contains(&word.as_str()) {
        TypeWord::StopLimit
    } else if MARKET_WORDS.contains(&word.as_str()) {
        TypeWord::Market
    } else {
        TypeWord::Other
    }
}

/// Classify the order family from its free-form type fields.
///
/// Each of the order-type, price-type and kind fields is read on its own.
/// A stop word paired with a market word in another field (`SL` + `MARKET`)
/// is SL-M.
pub fn classify(fields: &Map<String, Value>) -> Result<OrderClass, NormalizeError> {
    let texts: Vec<String> = [ORDER_TYPE_FIELDS, PRICE_TYPE_FIELDS, KIND_FIELDS]
        .iter()
        .filter_map(|candidates| first_str(fields, candidates))
        .collect();
    let words: Vec<TypeWord> = texts.iter().map(|t| type_word(t)).collect();
    let has = |w: TypeWord| words.contains(&w);

    if has(TypeWord::Gtt) {
        return Err(NormalizeError::UnsupportedKind(texts.join("/")));
    }
    if has(TypeWord::StopMarket) || (has(TypeWord::StopLimit) && has(TypeWord::Market)) {
        return Ok(OrderClass::StopMarket);
    }
    if has(TypeWord::StopLimit) {
        return Ok(OrderClass::StopLimit);
    }
    if has(TypeWord::Market) {
        return Err(NormalizeError::UnsupportedKind(texts.join("/")));
    }
    if has(TypeWord::Other) {
        trace!("[normalize] type {texts:?} read as plain limit");
    }
    Ok(OrderClass::Limit)
}

/// Resolve the trigger price for a stop order.
pub fn trigger_price(fields: &Map<String, Value>, class: OrderClass) -> Option<f64> {
    if !class.is_stop() {
        return None;
    }
    first_positive(fields, TRIGGER_FIELDS).or_else(|| match class {
        OrderClass::StopMarket => first_positive(fields, &[PRICE_FIELD]),
        _ => None,
    })
}

/// Resolve the limit price.
pub fn limit_price(fields: &Map<String, Value>, class: OrderClass) -> Option<f64> {
    let explicit = first_positive(fields, LIMIT_FIELDS);
    match class {
        OrderClass::StopMarket => explicit,
        OrderClass::StopLimit | OrderClass::Limit => {
            explicit.or_else(|| first_positive(fields, &[PRICE_FIELD]))
        }
    }
}

pub fn status(fields: &Map<String, Value>) -> Option<OrderStatus> {
    first_str(fields, STATUS_FIELDS).and_then(|s| OrderStatus::parse(&s))
}

/// Quantity as a positive integer. Fractional or non-positive values are
/// rejected rather than rounded.
pub fn quantity(fields: &Map<String, Value>) -> Option<u64> {
    let q = QUANTITY_FIELDS.iter().find_map(|key| parse_str_f64(fields.get(*key)))?;
    (q.is_finite() && q > 0.0 && q.fract() == 0.0 && q <= u64::MAX as f64).then_some(q as u64)
}

pub fn is_triggered(fields: &Map<String, Value>) -> bool {
    any_true(fields, TRIGGERED_FIELDS)
}

pub fn trade_id(fields: &Map<String, Value>) -> Option<String> {
    first_str(fields, TRADE_ID_FIELDS)
}

pub fn instrument_token(fields: &Map<String, Value>) -> Option<u64> {
    first_u64(fields, TOKEN_FIELDS)
}

pub fn side(fields: &Map<String, Value>) -> Option<Side> {
    first_str(fields, SIDE_FIELDS).and_then(|s| Side::parse(&s))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Normalize a raw order document into an evaluable [`Order`].
pub fn normalize(doc: &OrderDoc) -> Result<Order, NormalizeError> {
    let fields = &doc.fields;

    let status = status(fields).ok_or(NormalizeError::MissingStatus)?;
    let class = classify(fields)?;
    let instrument_token = instrument_token(fields).ok_or(NormalizeError::MissingToken)?;
    let side = side(fields).ok_or(NormalizeError::MissingSide)?;
    let quantity = quantity(fields).ok_or(NormalizeError::BadQuantity)?;

    let kind = match class {
        OrderClass::Limit => OrderKind::Limit {
            limit: limit_price(fields, class).ok_or(NormalizeError::MissingLimit)?,
        },
        OrderClass::StopLimit => OrderKind::StopLimit {
            trigger: trigger_price(fields, class).ok_or(NormalizeError::MissingTrigger)?,
            limit: limit_price(fields, class).ok_or(NormalizeError::MissingLimit)?,
        },
        OrderClass::StopMarket => OrderKind::StopMarket {
            trigger: trigger_price(fields, class).ok_or(NormalizeError::MissingTrigger)?,
            limit: limit_price(fields, class),
        },
    };

    Ok(Order {
        id: doc.id.clone(),
        instrument_token,
        side,
        quantity,
        kind,
        status,
        triggered: class.is_stop() && is_triggered(fields),
        trade_id: trade_id(fields),
    })
}
