//! Order store boundary.
//!
//! The authoritative order/trade collection lives outside the engine. The
//! engine needs exactly three capabilities from it:
//!
//! 1. a live query over an account's order documents ([`OrderStore::watch_orders`]),
//! 2. a conditional single-document update ([`OrderStore::update_order_if`]),
//! 3. an atomic read-then-write transaction ([`OrderStore::run_transaction`]).
//!
//! Every engine write goes through (2) or (3); there is no unconditional
//! write path.

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lw_core::types::{OrderDoc, Trade};
use serde_json::{Map, Value};

pub use memory::MemoryStore;

/// Immutable snapshot of an account's order documents.
pub type OrderSnapshot = Arc<Vec<OrderDoc>>;

/// Live query handle: yields a fresh [`OrderSnapshot`] after every change.
pub type OrderWatch = tokio::sync::watch::Receiver<OrderSnapshot>;

/// Field-level patch merged into an order document.
pub type OrderPatch = Map<String, Value>;

/// What a transaction body decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxVerdict {
    /// Apply every buffered write atomically.
    Commit,
    /// Discard every buffered write.
    Abort,
}

/// Read/write view handed to a transaction body.
///
/// Reads observe committed state; writes are buffered and only become
/// visible if the body returns [`TxVerdict::Commit`].
pub trait TxContext: Send {
    fn get_order(&mut self, order_id: &str) -> Option<OrderDoc>;
    fn create_trade(&mut self, trade: Trade);
    fn update_order(&mut self, order_id: &str, patch: OrderPatch);
}

/// Transaction body. May be invoked more than once if the store retries on
/// conflict, so it must derive everything from what it reads.
pub type TxBody<'a> = dyn FnMut(&mut dyn TxContext) -> TxVerdict + Send + 'a;

/// Precondition for a conditional update, evaluated against the current
/// document inside the store.
pub type Precondition<'a> = dyn Fn(&OrderDoc) -> bool + Send + Sync + 'a;

/// Trait implemented by order store backends.
///
/// All methods take `&self` so several engine instances, or several
/// evaluations of one engine, can use a store concurrently.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Subscribe to the account's order collection.
    async fn watch_orders(&self, account_id: &str) -> Result<OrderWatch>;

    /// Merge `patch` into the order iff `precondition` holds on the current
    /// document. Returns whether the update was applied.
    async fn update_order_if(
        &self,
        account_id: &str,
        order_id: &str,
        precondition: &Precondition<'_>,
        patch: OrderPatch,
    ) -> Result<bool>;

    /// Run `body` atomically. Returns `true` if it committed.
    async fn run_transaction(&self, account_id: &str, body: &mut TxBody<'_>) -> Result<bool>;
}
