//! In-memory order store.
//!
//! Holds every account's orders and trades behind one mutex. Transactions
//! and conditional updates run entirely under that lock, so they are
//! serializable and never conflict. Several engines sharing one
//! `Arc<MemoryStore>` behave like several devices sharing one backend.
//!
//! The placement and cancellation flows that the engine does not own are
//! modelled by [`MemoryStore::insert_order`] and [`MemoryStore::cancel_order`].

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use anyhow::Result;
use async_trait::async_trait;
use lw_core::error::LwError;
use lw_core::normalize::STATUS_KEY;
use lw_core::types::{OrderDoc, OrderStatus, Trade};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use super::{OrderPatch, OrderSnapshot, OrderStore, OrderWatch, Precondition, TxBody, TxContext, TxVerdict};

struct AccountState {
    orders: BTreeMap<String, OrderDoc>,
    trades: Vec<Trade>,
    watch: watch::Sender<OrderSnapshot>,
}

impl AccountState {
    fn new() -> Self {
        let (watch, _) = watch::channel(Arc::new(Vec::new()));
        Self { orders: BTreeMap::new(), trades: Vec::new(), watch }
    }

    fn publish(&self) {
        let snapshot: Vec<OrderDoc> = self.orders.values().cloned().collect();
        self.watch.send_replace(Arc::new(snapshot));
    }

    fn patch(&mut self, order_id: &str, patch: OrderPatch) -> bool {
        match self.orders.get_mut(order_id) {
            Some(doc) => {
                doc.fields.extend(patch);
                true
            }
            None => false,
        }
    }
}

/// Buffered transaction over one account.
struct MemTx<'a> {
    state: &'a AccountState,
    trades: Vec<Trade>,
    patches: Vec<(String, OrderPatch)>,
}

impl TxContext for MemTx<'_> {
    fn get_order(&mut self, order_id: &str) -> Option<OrderDoc> {
        self.state.orders.get(order_id).cloned()
    }

    fn create_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    fn update_order(&mut self, order_id: &str, patch: OrderPatch) {
        self.patches.push((order_id.to_string(), patch));
    }
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<AHashMap<String, AccountState>>,
    #[cfg(test)]
    failures: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_account<R>(&self, account_id: &str, f: impl FnOnce(&mut AccountState) -> R) -> R {
        let mut accounts = self.accounts.lock();
        let state = accounts.entry(account_id.to_string()).or_insert_with(AccountState::new);
        f(state)
    }

    /// Insert or replace an order document (placement flow).
    pub fn insert_order(&self, account_id: &str, doc: OrderDoc) {
        self.with_account(account_id, |state| {
            state.orders.insert(doc.id.clone(), doc);
            state.publish();
        });
    }

    /// Mark an order cancelled (user cancellation flow).
    ///
    /// Returns `false` if the order does not exist or is no longer open.
    pub fn cancel_order(&self, account_id: &str, order_id: &str) -> bool {
        self.with_account(account_id, |state| {
            let open = state
                .orders
                .get(order_id)
                .and_then(|doc| lw_core::normalize::status(&doc.fields))
                .is_some_and(|s| s.is_open());
            if !open {
                return false;
            }
            let mut patch = OrderPatch::new();
            patch.insert(STATUS_KEY.to_string(), Value::from(OrderStatus::Cancelled.as_str()));
            state.patch(order_id, patch);
            state.publish();
            true
        })
    }

    /// Current document for an order.
    pub fn order(&self, account_id: &str, order_id: &str) -> Option<OrderDoc> {
        self.with_account(account_id, |state| state.orders.get(order_id).cloned())
    }

    /// All orders of an account, ordered by id.
    pub fn orders(&self, account_id: &str) -> Vec<OrderDoc> {
        self.with_account(account_id, |state| state.orders.values().cloned().collect())
    }

    /// All trades created for an account, in creation order.
    pub fn trades(&self, account_id: &str) -> Vec<Trade> {
        self.with_account(account_id, |state| state.trades.clone())
    }

    /// Make the next `n` engine writes fail with a store error.
    #[cfg(test)]
    pub fn fail_next_writes(&self, n: usize) {
        self.failures.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn injected_failure(&self) -> Result<()> {
        use std::sync::atomic::Ordering;
        let took = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            return Err(LwError::Store("injected write failure".to_string()).into());
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[inline]
    fn injected_failure(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn watch_orders(&self, account_id: &str) -> Result<OrderWatch> {
        Ok(self.with_account(account_id, |state| {
            state.publish();
            state.watch.subscribe()
        }))
    }

    async fn update_order_if(
        &self,
        account_id: &str,
        order_id: &str,
        precondition: &Precondition<'_>,
        patch: OrderPatch,
    ) -> Result<bool> {
        self.injected_failure()?;
        Ok(self.with_account(account_id, |state| {
            let holds = state.orders.get(order_id).is_some_and(precondition);
            if holds {
                state.patch(order_id, patch);
                state.publish();
            }
            holds
        }))
    }

    async fn run_transaction(&self, account_id: &str, body: &mut TxBody<'_>) -> Result<bool> {
        self.injected_failure()?;
        self.with_account(account_id, |state| {
            let mut tx = MemTx { state: &*state, trades: Vec::new(), patches: Vec::new() };
            if body(&mut tx as &mut dyn TxContext) == TxVerdict::Abort {
                return Ok(false);
            }
            let MemTx { trades, patches, .. } = tx;

            if let Some((missing, _)) = patches.iter().find(|(id, _)| !state.orders.contains_key(id)) {
                return Err(LwError::Store(format!("transaction patches unknown order {missing}")).into());
            }
            for (order_id, patch) in patches {
                state.patch(&order_id, patch);
            }
            state.trades.extend(trades);
            state.publish();
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lw_core::types::{Side, TradeStatus};
    use serde_json::json;

    fn doc(id: &str, v: Value) -> OrderDoc {
        let Value::Object(fields) = v else { unreachable!() };
        OrderDoc::new(id, fields)
    }

    fn trade(id: &str, order_id: &str) -> Trade {
        Trade {
            id: id.to_string(),
            order_id: order_id.to_string(),
            account_id: "a".to_string(),
            instrument_token: 1,
            side: Side::Buy,
            quantity: 1,
            fill_price: 10.0,
            status: TradeStatus::Active,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn watch_sees_inserts_and_cancels() {
        let store = MemoryStore::new();
        let mut rx = store.watch_orders("a").await.unwrap();
        assert!(rx.borrow_and_update().is_empty());

        store.insert_order("a", doc("o1", json!({"status": "OPEN"})));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        assert!(store.cancel_order("a", "o1"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].get("status"), Some(&json!("CANCELLED")));

        // Already cancelled.
        assert!(!store.cancel_order("a", "o1"));
        assert!(!store.cancel_order("a", "nope"));
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let store = MemoryStore::new();
        store.insert_order("a", doc("o1", json!({"status": "OPEN"})));
        assert!(store.orders("b").is_empty());
        assert!(store.order("b", "o1").is_none());
    }

    #[tokio::test]
    async fn conditional_update_respects_precondition() {
        let store = MemoryStore::new();
        store.insert_order("a", doc("o1", json!({"status": "OPEN"})));

        let mut patch = OrderPatch::new();
        patch.insert("triggered".into(), json!(true));
        let applied = store
            .update_order_if("a", "o1", &|d: &OrderDoc| d.get("triggered").is_none(), patch.clone())
            .await
            .unwrap();
        assert!(applied);

        let applied = store
            .update_order_if("a", "o1", &|d: &OrderDoc| d.get("triggered").is_none(), patch.clone())
            .await
            .unwrap();
        assert!(!applied);

        let missing = store.update_order_if("a", "zz", &|_: &OrderDoc| true, patch).await.unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn aborted_transaction_writes_nothing() {
        let store = MemoryStore::new();
        store.insert_order("a", doc("o1", json!({"status": "OPEN"})));

        let committed = store
            .run_transaction("a", &mut |tx: &mut dyn TxContext| {
                tx.create_trade(trade("t1", "o1"));
                tx.update_order("o1", OrderPatch::from_iter([("status".to_string(), json!("FILLED"))]));
                TxVerdict::Abort
            })
            .await
            .unwrap();
        assert!(!committed);
        assert!(store.trades("a").is_empty());
        assert_eq!(store.order("a", "o1").unwrap().get("status"), Some(&json!("OPEN")));
    }

    #[tokio::test]
    async fn committed_transaction_applies_all_writes() {
        let store = MemoryStore::new();
        store.insert_order("a", doc("o1", json!({"status": "OPEN"})));

        let committed = store
            .run_transaction("a", &mut |tx: &mut dyn TxContext| {
                assert!(tx.get_order("o1").is_some());
                tx.create_trade(trade("t1", "o1"));
                tx.update_order("o1", OrderPatch::from_iter([("status".to_string(), json!("FILLED"))]));
                TxVerdict::Commit
            })
            .await
            .unwrap();
        assert!(committed);
        assert_eq!(store.trades("a").len(), 1);
        assert_eq!(store.order("a", "o1").unwrap().get("status"), Some(&json!("FILLED")));
    }

    #[tokio::test]
    async fn transaction_patching_unknown_order_fails_whole() {
        let store = MemoryStore::new();
        let res = store
            .run_transaction("a", &mut |tx: &mut dyn TxContext| {
                tx.create_trade(trade("t1", "ghost"));
                tx.update_order("ghost", OrderPatch::new());
                TxVerdict::Commit
            })
            .await;
        assert!(res.is_err());
        assert!(store.trades("a").is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.insert_order("a", doc("o1", json!({"status": "OPEN"})));
        store.fail_next_writes(1);
        let first = store.update_order_if("a", "o1", &|_: &OrderDoc| true, OrderPatch::new()).await;
        assert!(first.is_err());
        let second = store.update_order_if("a", "o1", &|_: &OrderDoc| true, OrderPatch::new()).await;
        assert!(second.unwrap());
    }
}
