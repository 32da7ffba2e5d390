//! # lw-core
//!
//! Core crate for the limitwatch order execution engine, providing:
//!
//! - **Types** (`types`): enums, raw order documents, normalized orders, trades, ticks
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `LwError` via thiserror
//! - **Field helpers** (`fields`): loosely-typed JSON field extraction
//! - **Normalizer** (`normalize`): raw order document → typed [`Order`]
//! - **Time utilities** (`time_util`): epoch timestamps
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod fields;
pub mod logging;
pub mod normalize;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
