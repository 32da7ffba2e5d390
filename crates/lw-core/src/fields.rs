//! Loosely-typed field extraction for order documents.
//!
//! Order documents written by different client versions encode numbers as
//! either JSON strings (`"101.5"`) or native numbers (`101.5`), and booleans
//! as `true` or `"true"`. These helpers hide that variance.

use serde_json::{Map, Value};

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a JSON value (bool, string, or 0/1 number) as `bool`.
#[inline]
pub fn parse_bool(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

/// First candidate field holding a positive, finite number.
///
/// Candidates are scanned in order; zero, negative, `NaN`, and unparsable
/// values are skipped, not treated as "found".
pub fn first_positive(fields: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|key| parse_str_f64(fields.get(*key)))
        .find(|v| v.is_finite() && *v > 0.0)
}

/// First candidate field holding a non-empty string (numbers are stringified).
pub fn first_str(fields: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|key| match fields.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First candidate field parseable as `u64`.
pub fn first_u64(fields: &Map<String, Value>, candidates: &[&str]) -> Option<u64> {
    candidates.iter().find_map(|key| parse_str_u64(fields.get(*key)))
}

/// `true` if any candidate field parses as `true`.
pub fn any_true(fields: &Map<String, Value>, candidates: &[&str]) -> bool {
    candidates.iter().any(|key| parse_bool(fields.get(*key)) == Some(true))
}
