//! Configuration parsing for limitwatch.
//!
//! Everything is read from a single JSON file. Every field is optional; the
//! `effective_*` accessors apply defaults.
//!
//! # Example config
//!
//! ```json
//! {
//!   "module": { "module_name": "lw-runner", "log_path": "/tmp/log" },
//!   "engine": {
//!     "account_id": "acct-42",
//!     "same_tick_fill": true,
//!     "max_concurrent_evaluations": 64,
//!     "price_decimals": 2
//!   },
//!   "replay": { "orders_path": "orders.json", "ticks_path": "ticks.jsonl" }
//! }
//! ```

use serde::Deserialize;

use crate::error::LwError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    pub module: Option<ModuleMeta>,

    /// Execution engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Replay input files for the runner.
    pub replay: Option<ReplayConfig>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"limitwatch"`.
    pub fn module_name(&self) -> String {
        self.module
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "limitwatch".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.module.as_ref().and_then(|m| m.log_path.clone())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Execution engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Account whose orders the engine watches.
    #[serde(alias = "account")]
    pub account_id: Option<String>,

    /// Allow a stop order to arm and fill on the same tick (default: true).
    /// The arm write still commits before the fill transaction starts.
    pub same_tick_fill: Option<bool>,

    /// Upper bound on concurrently running order evaluations (default: 64).
    pub max_concurrent_evaluations: Option<usize>,

    /// Decimal places prices are rounded to before comparison (default: 2).
    pub price_decimals: Option<u32>,

    /// Evaluate newly watched orders against the last known price when the
    /// order collection changes (default: true).
    pub reevaluate_on_order_change: Option<bool>,
}

impl EngineConfig {
    pub fn effective_same_tick_fill(&self) -> bool {
        self.same_tick_fill.unwrap_or(true)
    }

    pub fn effective_max_concurrent(&self) -> usize {
        self.max_concurrent_evaluations.unwrap_or(64).max(1)
    }

    pub fn effective_price_decimals(&self) -> u32 {
        self.price_decimals.unwrap_or(2).min(8)
    }

    pub fn effective_reevaluate_on_order_change(&self) -> bool {
        self.reevaluate_on_order_change.unwrap_or(true)
    }

    /// Returns the configured account, or a config error if none is set.
    pub fn require_account(&self) -> Result<&str, LwError> {
        self.account_id
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| LwError::Config("engine.account_id is required".to_string()))
    }
}

/// Replay inputs for the runner binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// JSON array (or JSON-lines) of order documents to seed the store with.
    pub orders_path: Option<String>,
    /// JSON-lines file of ticks.
    pub ticks_path: Option<String>,
    /// Delay between replayed ticks in milliseconds (default: 0).
    pub tick_interval_ms: Option<u64>,
}

impl ReplayConfig {
    pub fn effective_tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.unwrap_or(0)
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse config JSON text.
pub fn parse_config(content: &str) -> anyhow::Result<AppConfig> {
    let config: AppConfig =
        serde_json::from_str(content).map_err(|e| LwError::Config(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let cfg = parse_config("{}").unwrap();
        assert_eq!(cfg.module_name(), "limitwatch");
        assert!(cfg.engine.effective_same_tick_fill());
        assert_eq!(cfg.engine.effective_max_concurrent(), 64);
        assert_eq!(cfg.engine.effective_price_decimals(), 2);
        assert!(cfg.engine.effective_reevaluate_on_order_change());
        assert!(cfg.engine.require_account().is_err());
        assert!(cfg.replay.is_none());
    }

    #[test]
    fn full_config() {
        let cfg = parse_config(
            r#"{
                "module": { "module_name": "lw-test", "log_path": "/tmp/lw" },
                "engine": {
                    "account": "acct-1",
                    "same_tick_fill": false,
                    "max_concurrent_evaluations": 0,
                    "price_decimals": 4
                },
                "replay": { "orders_path": "o.json", "ticks_path": "t.jsonl", "tick_interval_ms": 5 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.module_name(), "lw-test");
        assert_eq!(cfg.log_path().as_deref(), Some("/tmp/lw"));
        assert_eq!(cfg.engine.require_account().unwrap(), "acct-1");
        assert!(!cfg.engine.effective_same_tick_fill());
        // Zero would deadlock the worker pool; clamp to one.
        assert_eq!(cfg.engine.effective_max_concurrent(), 1);
        assert_eq!(cfg.engine.effective_price_decimals(), 4);
        let replay = cfg.replay.unwrap();
        assert_eq!(replay.effective_tick_interval_ms(), 5);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = parse_config("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("config error"));
    }
}
