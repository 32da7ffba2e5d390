//! Typed error definitions for limitwatch.
//!
//! [`LwError`] covers the collaborator boundaries (config, store, feed).
//! [`NormalizeError`] describes why a raw order document could not be turned
//! into an evaluable [`Order`](crate::Order); it is a diagnostic, never fatal.

use thiserror::Error;

/// Domain-specific errors for limitwatch.
#[derive(Debug, Error)]
pub enum LwError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Order/trade store read or write failure.
    #[error("store error: {0}")]
    Store(String),

    /// Price feed subscription or delivery error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Tick or order file parsing error.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Reasons a raw order document is excluded from evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("order type '{0}' is not handled by the engine")]
    UnsupportedKind(String),

    #[error("no instrument token")]
    MissingToken,

    #[error("no buy/sell side")]
    MissingSide,

    #[error("quantity missing or not a positive integer")]
    BadQuantity,

    #[error("unknown or missing status")]
    MissingStatus,

    #[error("stop order has no resolvable trigger price")]
    MissingTrigger,

    #[error("no resolvable limit price")]
    MissingLimit,
}
