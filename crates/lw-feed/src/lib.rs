//! # lw-feed
//!
//! Price feed boundary for the execution engine.
//!
//! The feed transport itself lives outside this workspace. What the engine
//! needs is a uniform way to say which instruments it cares about and a
//! channel of [`Tick`]s for those instruments:
//!
//! - [`PriceFeed`]: subscribe / unsubscribe by instrument token
//! - [`local`]: in-process feed hub (replay, tests, embedding)
//! - [`sequencer`]: drops out-of-order ticks per instrument
//! - [`replay`]: JSON-lines tick parsing

pub mod local;
pub mod replay;
pub mod sequencer;

use anyhow::Result;
use async_trait::async_trait;
use lw_core::types::{InstrumentToken, Tick};

/// Sender half of a tick channel.
pub type TickSender = tokio::sync::mpsc::UnboundedSender<Tick>;

/// Receiver half of a tick channel.
///
/// Handed to the engine at start; it only yields ticks for tokens that are
/// currently subscribed on the paired [`PriceFeed`].
pub type TickReceiver = tokio::sync::mpsc::UnboundedReceiver<Tick>;

/// Trait implemented by price feed adapters.
///
/// Subscriptions are set-like: subscribing an already subscribed token, or
/// unsubscribing an unknown one, is a no-op. Ticks for a single token are
/// expected in delivery order; no ordering holds across tokens.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Human-readable feed name.
    fn name(&self) -> &str;

    /// Start streaming ticks for `tokens`.
    async fn subscribe(&self, tokens: &[InstrumentToken]) -> Result<()>;

    /// Stop streaming ticks for `tokens`.
    async fn unsubscribe(&self, tokens: &[InstrumentToken]) -> Result<()>;
}
