//! # lw-runner
//!
//! Replays a recorded price stream through the execution engine against an
//! in-memory order store and prints the resulting trades.
//!
//! # Usage
//!
//! ```bash
//! lw-runner config.json --log-level info
//! lw-runner config.json --orders orders.json --ticks ticks.jsonl --account acct-42
//! ```
//!
//! Trades are written to stdout as JSON lines, followed by one line with the
//! engine counters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lw_core::error::LwError;
use lw_core::types::OrderDoc;
use lw_exec::watch_list::WatchList;
use lw_exec::{ExecutionEngine, MemoryStore};
use lw_feed::local::LocalFeed;
use serde_json::Value;
use tracing::{info, warn};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Limit/stop order execution replay runner.
#[derive(Parser)]
#[command(name = "lw-runner", about = "Limit/stop order execution replay runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Orders file, overrides `replay.orders_path`.
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Ticks file, overrides `replay.ticks_path`.
    #[arg(long)]
    ticks: Option<PathBuf>,

    /// Account id, overrides `engine.account_id`.
    #[arg(long)]
    account: Option<String>,
}

/// Parse an orders file: either one JSON array of order objects or one
/// object per line. Each object carries its own `"id"`.
fn parse_orders(content: &str) -> Result<Vec<OrderDoc>> {
    let trimmed = content.trim_start();
    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| LwError::Parse(format!("orders array: {e}")))?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LwError::Parse(format!("orders json-lines: {e}")))?
    };

    let mut docs = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match OrderDoc::from_json(value) {
            Some(doc) => docs.push(doc),
            None => warn!("[runner] order #{idx} has no usable id, skipped"),
        }
    }
    Ok(docs)
}

fn load_orders(path: &Path) -> Result<Vec<OrderDoc>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_orders(&content)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut config = lw_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    lw_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());
    info!("lw-runner starting, config={}, log_level={}", cli.config.display(), cli.log_level);

    if let Some(account) = cli.account.clone() {
        config.engine.account_id = Some(account);
    }
    let account_id = config.engine.require_account()?.to_string();

    let replay = config.replay.clone();
    let orders_path = cli
        .orders
        .clone()
        .or_else(|| replay.as_ref().and_then(|r| r.orders_path.clone()).map(PathBuf::from))
        .context("no orders file (replay.orders_path or --orders)")?;
    let ticks_path = cli
        .ticks
        .clone()
        .or_else(|| replay.as_ref().and_then(|r| r.ticks_path.clone()).map(PathBuf::from))
        .context("no ticks file (replay.ticks_path or --ticks)")?;
    let interval = Duration::from_millis(replay.as_ref().map_or(0, |r| r.effective_tick_interval_ms()));

    // 3. Seed the store
    let docs = load_orders(&orders_path)?;
    let ticks = lw_feed::replay::load_ticks(&ticks_path)
        .with_context(|| format!("reading {}", ticks_path.display()))?;
    info!("[runner] {} order(s), {} tick(s), account={account_id}", docs.len(), ticks.len());

    let mut expected = WatchList::new();
    expected.rebuild(&docs);
    let expected_tokens = expected.tokens();

    let store = Arc::new(MemoryStore::new());
    for doc in docs {
        store.insert_order(&account_id, doc);
    }

    // 4. Start the engine
    let (feed, rx) = LocalFeed::new("replay");
    let feed = Arc::new(feed);
    let mut engine = ExecutionEngine::new(config.engine.clone(), store.clone(), feed.clone(), rx);
    engine.start(&account_id).await?;

    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    while !expected_tokens.iter().all(|t| feed.is_subscribed(*t)) {
        if tokio::time::Instant::now() >= deadline {
            warn!("[runner] not every token subscribed, replaying anyway");
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // 5. Replay ticks
    let mut forwarded = 0u64;
    for tick in ticks {
        if feed.publish(tick) {
            forwarded += 1;
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
    if !engine.settle(forwarded, SETTLE_TIMEOUT).await {
        warn!("[runner] engine did not settle within {SETTLE_TIMEOUT:?}");
    }

    // 6. Report
    let trades = store.trades(&account_id);
    for trade in &trades {
        println!("{}", serde_json::to_string(trade)?);
    }
    let stats = engine.stats();
    println!("{}", serde_json::to_string(&stats)?);
    info!("[runner] {} trade(s), {stats}", trades.len());

    engine.stop().await?;
    info!("lw-runner done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_and_lines() {
        let arr = parse_orders(r#"[{"id": "a", "status": "OPEN"}, {"id": 7}]"#).unwrap();
        assert_eq!(arr.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["a", "7"]);

        let lines = parse_orders("{\"id\": \"a\"}\n\n# comment\n{\"id\": \"b\"}\n").unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn skips_orders_without_id() {
        let docs = parse_orders(r#"[{"status": "OPEN"}, {"id": "x"}]"#).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "x");
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_orders("[{").is_err());
        assert!(parse_orders("{\"id\": 1}\nnot json").is_err());
    }
}
