//! JSON-lines tick parsing for replaying recorded price streams.
//!
//! One JSON object per line. Field names vary between recorders, so each
//! value is taken from the first present candidate:
//!
//! ```text
//! {"instrument_token": 738561, "price": "100.50", "timestamp": 1700000000000}
//! {"token": "738561", "ltp": 100.75}
//! ```
//!
//! A missing timestamp is stamped with the current wall-clock time. Blank
//! lines and lines starting with `#` are ignored.

use std::path::Path;

use anyhow::Result;
use lw_core::fields::{first_positive, first_u64};
use lw_core::time_util::now_ms;
use lw_core::types::Tick;
use serde_json::Value;
use tracing::warn;

const TOKEN_FIELDS: &[&str] = &["instrument_token", "instrumentToken", "token"];
const PRICE_FIELDS: &[&str] = &["price", "ltp", "last_price", "lastPrice"];
const TS_FIELDS: &[&str] = &["timestamp_ms", "timestamp", "ts"];

/// Parse one tick line. Returns `None` for malformed lines or lines without
/// a positive price.
pub fn parse_tick_line(line: &str) -> Option<Tick> {
    let Value::Object(fields) = serde_json::from_str::<Value>(line).ok()? else {
        return None;
    };
    let instrument_token = first_u64(&fields, TOKEN_FIELDS)?;
    let price = first_positive(&fields, PRICE_FIELDS)?;
    let timestamp_ms = first_u64(&fields, TS_FIELDS).unwrap_or_else(now_ms);
    Some(Tick { instrument_token, price, timestamp_ms })
}

/// Parse JSON-lines text into ticks, skipping and logging bad lines.
pub fn parse_ticks(content: &str) -> Vec<Tick> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .filter_map(|(idx, line)| {
            let tick = parse_tick_line(line.trim());
            if tick.is_none() {
                warn!("[replay] skipping malformed tick on line {}", idx + 1);
            }
            tick
        })
        .collect()
}

/// Load a JSON-lines tick file.
pub fn load_ticks(path: &Path) -> Result<Vec<Tick>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_ticks(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_variants() {
        let a = parse_tick_line(r#"{"instrument_token": 5, "price": "100.50", "timestamp": 7}"#)
            .unwrap();
        assert_eq!(a, Tick::new(5, 100.5, 7));

        let b = parse_tick_line(r#"{"token": "5", "ltp": 99, "ts": 8}"#).unwrap();
        assert_eq!(b, Tick::new(5, 99.0, 8));
    }

    #[test]
    fn missing_timestamp_uses_now() {
        let before = now_ms();
        let t = parse_tick_line(r#"{"token": 1, "price": 2}"#).unwrap();
        assert!(t.timestamp_ms >= before);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse_tick_line("not json").is_none());
        assert!(parse_tick_line(r#"{"token": 1}"#).is_none());
        assert!(parse_tick_line(r#"{"token": 1, "price": 0}"#).is_none());
        assert!(parse_tick_line(r#"[1, 2]"#).is_none());
    }

    #[test]
    fn parse_ticks_skips_comments_and_garbage() {
        let text = "# header\n{\"token\":1,\"price\":10,\"ts\":1}\n\nbroken\n{\"token\":1,\"price\":11,\"ts\":2}\n";
        let ticks = parse_ticks(text);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].price, 11.0);
    }
}
