//! Store writes issued by the engine.
//!
//! Two write paths, nothing else:
//!
//! - [`FillTransactor::arm`]: conditional single-document update setting
//!   `triggered` on a still-open, still-unarmed stop order.
//! - [`FillTransactor::fill`]: atomic transaction that re-reads the order,
//!   re-validates it, and then creates the trade and marks the order FILLED
//!   in one unit.
//!
//! The re-validation in [`check_fillable`] runs against the document read
//! *inside* the transaction. That check is what makes a fill happen at most
//! once: duplicate ticks, racing devices, and concurrent cancellation all end
//! in a [`SkipReason`] instead of a second trade.

use std::sync::Arc;

use anyhow::Result;
use lw_core::error::{LwError, NormalizeError};
use lw_core::normalize::{
    self, FILL_PRICE_KEY, FILLED_AT_KEY, STATUS_KEY, TRADE_ID_KEY, TRIGGERED_KEY,
};
use lw_core::time_util::now_ms;
use lw_core::types::{InstrumentToken, OrderDoc, OrderStatus, Side, Tick, Trade, TradeStatus};
use serde_json::Value;

use crate::store::{OrderPatch, OrderStore, TxContext, TxVerdict};

/// Why a fill transaction aborted without writing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The order document no longer exists.
    Missing,
    /// Status left the open set (cancelled, rejected, filled elsewhere).
    NotOpen(Option<OrderStatus>),
    /// A trade id is already recorded.
    AlreadyFilled,
    /// Stop order whose trigger has not been persisted yet.
    NotArmed,
    BadQuantity,
    /// The document lost a field the trade needs.
    Malformed(NormalizeError),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "order missing"),
            Self::NotOpen(Some(s)) => write!(f, "status {s}"),
            Self::NotOpen(None) => write!(f, "status unknown"),
            Self::AlreadyFilled => write!(f, "already filled"),
            Self::NotArmed => write!(f, "stop not armed"),
            Self::BadQuantity => write!(f, "bad quantity"),
            Self::Malformed(e) => write!(f, "malformed: {e}"),
        }
    }
}

/// Result of a fill attempt that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Filled(Trade),
    Skipped(SkipReason),
}

/// Values a fill copies from the freshly read document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillTerms {
    pub instrument_token: InstrumentToken,
    pub side: Side,
    pub quantity: u64,
}

/// Validate a freshly read document for filling.
pub fn check_fillable(doc: &OrderDoc) -> Result<FillTerms, SkipReason> {
    let fields = &doc.fields;

    let status = normalize::status(fields);
    if !status.is_some_and(|s| s.is_open()) {
        return Err(SkipReason::NotOpen(status));
    }
    if normalize::trade_id(fields).is_some() {
        return Err(SkipReason::AlreadyFilled);
    }
    let class = normalize::classify(fields).map_err(SkipReason::Malformed)?;
    if class.is_stop() && !normalize::is_triggered(fields) {
        return Err(SkipReason::NotArmed);
    }
    let quantity = normalize::quantity(fields).ok_or(SkipReason::BadQuantity)?;
    let instrument_token = normalize::instrument_token(fields)
        .ok_or(SkipReason::Malformed(NormalizeError::MissingToken))?;
    let side = normalize::side(fields).ok_or(SkipReason::Malformed(NormalizeError::MissingSide))?;

    Ok(FillTerms { instrument_token, side, quantity })
}

/// Precondition for arming: open, unfilled, a stop order, not yet armed.
pub fn can_arm(doc: &OrderDoc) -> bool {
    let fields = &doc.fields;
    normalize::status(fields).is_some_and(|s| s.is_open())
        && normalize::trade_id(fields).is_none()
        && normalize::classify(fields).is_ok_and(|c| c.is_stop())
        && !normalize::is_triggered(fields)
}

pub struct FillTransactor {
    store: Arc<dyn OrderStore>,
}

impl FillTransactor {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Persist `triggered = true`. Returns `false` if the precondition no
    /// longer held (already armed, cancelled, gone).
    pub async fn arm(&self, account_id: &str, order_id: &str) -> Result<bool> {
        let mut patch = OrderPatch::new();
        patch.insert(TRIGGERED_KEY.to_string(), Value::Bool(true));
        self.store.update_order_if(account_id, order_id, &can_arm, patch).await
    }

    /// Fill `order_id` at the price of `tick`, atomically.
    pub async fn fill(&self, account_id: &str, order_id: &str, tick: &Tick) -> Result<FillOutcome> {
        let mut outcome = FillOutcome::Skipped(SkipReason::Missing);

        let committed = self
            .store
            .run_transaction(account_id, &mut |tx: &mut dyn TxContext| {
                let Some(doc) = tx.get_order(order_id) else {
                    outcome = FillOutcome::Skipped(SkipReason::Missing);
                    return TxVerdict::Abort;
                };
                let terms = match check_fillable(&doc) {
                    Ok(terms) => terms,
                    Err(reason) => {
                        outcome = FillOutcome::Skipped(reason);
                        return TxVerdict::Abort;
                    }
                };

                let filled_at = now_ms();
                let trade = Trade {
                    id: uuid::Uuid::new_v4().to_string(),
                    order_id: order_id.to_string(),
                    account_id: account_id.to_string(),
                    instrument_token: terms.instrument_token,
                    side: terms.side,
                    quantity: terms.quantity,
                    fill_price: tick.price,
                    status: TradeStatus::Active,
                    created_at: filled_at,
                };

                let mut patch = OrderPatch::new();
                patch.insert(STATUS_KEY.to_string(), Value::from(OrderStatus::Filled.as_str()));
                patch.insert(TRADE_ID_KEY.to_string(), Value::from(trade.id.clone()));
                patch.insert(FILL_PRICE_KEY.to_string(), Value::from(tick.price));
                patch.insert(FILLED_AT_KEY.to_string(), Value::from(filled_at));

                tx.create_trade(trade.clone());
                tx.update_order(order_id, patch);
                outcome = FillOutcome::Filled(trade);
                TxVerdict::Commit
            })
            .await?;

        if !committed && matches!(outcome, FillOutcome::Filled(_)) {
            return Err(LwError::Store(format!("fill of {order_id} did not commit")).into());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, OrderWatch, Precondition, TxBody};
    use async_trait::async_trait;
    use serde_json::json;

    const ACCT: &str = "acct";

    fn doc(id: &str, v: Value) -> OrderDoc {
        let Value::Object(fields) = v else { unreachable!() };
        OrderDoc::new(id, fields)
    }

    fn open_limit(id: &str) -> OrderDoc {
        doc(id, json!({"status": "OPEN", "order_type": "LIMIT", "token": 9, "side": "SELL", "quantity": 4, "price": 95}))
    }

    fn stop_limit(id: &str, triggered: bool) -> OrderDoc {
        doc(id, json!({"status": "OPEN", "order_type": "SL", "token": 9, "side": "BUY", "quantity": 2,
                       "trigger_price": 100, "price": 101, "triggered": triggered}))
    }

    fn setup(docs: Vec<OrderDoc>) -> (Arc<MemoryStore>, FillTransactor) {
        let store = Arc::new(MemoryStore::new());
        for d in docs {
            store.insert_order(ACCT, d);
        }
        let tx = FillTransactor::new(store.clone());
        (store, tx)
    }

    #[tokio::test]
    async fn fills_and_links_trade() {
        let (store, tx) = setup(vec![open_limit("o1")]);
        let outcome = tx.fill(ACCT, "o1", &Tick::new(9, 95.0, 1)).await.unwrap();

        let FillOutcome::Filled(trade) = outcome else { panic!("expected fill, got {outcome:?}") };
        assert_eq!(trade.fill_price, 95.0);
        assert_eq!(trade.quantity, 4);
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.status, TradeStatus::Active);
        assert_eq!(store.trades(ACCT), vec![trade.clone()]);

        let order = store.order(ACCT, "o1").unwrap();
        assert_eq!(order.get("status"), Some(&json!("FILLED")));
        assert_eq!(order.get("trade_id"), Some(&json!(trade.id)));
        assert_eq!(order.get("fill_price"), Some(&json!(95.0)));
    }

    #[tokio::test]
    async fn fill_price_is_the_tick_price_unrounded() {
        let (store, tx) = setup(vec![open_limit("o1")]);
        tx.fill(ACCT, "o1", &Tick::new(9, 95.004, 1)).await.unwrap();
        assert_eq!(store.trades(ACCT)[0].fill_price, 95.004);
    }

    #[tokio::test]
    async fn second_fill_is_a_no_op() {
        let (store, tx) = setup(vec![open_limit("o1")]);
        tx.fill(ACCT, "o1", &Tick::new(9, 95.0, 1)).await.unwrap();
        let again = tx.fill(ACCT, "o1", &Tick::new(9, 96.0, 2)).await.unwrap();
        assert_eq!(again, FillOutcome::Skipped(SkipReason::NotOpen(Some(OrderStatus::Filled))));
        assert_eq!(store.trades(ACCT).len(), 1);
    }

    #[tokio::test]
    async fn unarmed_stop_is_never_filled() {
        let (store, tx) = setup(vec![stop_limit("s1", false)]);
        let outcome = tx.fill(ACCT, "s1", &Tick::new(9, 100.5, 1)).await.unwrap();
        assert_eq!(outcome, FillOutcome::Skipped(SkipReason::NotArmed));
        assert!(store.trades(ACCT).is_empty());

        assert!(tx.arm(ACCT, "s1").await.unwrap());
        let outcome = tx.fill(ACCT, "s1", &Tick::new(9, 100.5, 2)).await.unwrap();
        assert!(matches!(outcome, FillOutcome::Filled(ref t) if t.fill_price == 100.5));
    }

    #[tokio::test]
    async fn skip_reasons() {
        let (store, tx) = setup(vec![
            doc("tid", json!({"status": "OPEN", "token": 9, "side": "BUY", "quantity": 1, "price": 5, "tradeId": "t-0"})),
            doc("qty", json!({"status": "OPEN", "token": 9, "side": "BUY", "quantity": 0, "price": 5})),
            doc("rej", json!({"status": "REJECTED", "token": 9, "side": "BUY", "quantity": 1, "price": 5})),
            doc("noside", json!({"status": "OPEN", "token": 9, "quantity": 1, "price": 5})),
        ]);
        let tick = Tick::new(9, 5.0, 1);
        assert_eq!(tx.fill(ACCT, "tid", &tick).await.unwrap(), FillOutcome::Skipped(SkipReason::AlreadyFilled));
        assert_eq!(tx.fill(ACCT, "qty", &tick).await.unwrap(), FillOutcome::Skipped(SkipReason::BadQuantity));
        assert_eq!(
            tx.fill(ACCT, "rej", &tick).await.unwrap(),
            FillOutcome::Skipped(SkipReason::NotOpen(Some(OrderStatus::Rejected)))
        );
        assert_eq!(
            tx.fill(ACCT, "noside", &tick).await.unwrap(),
            FillOutcome::Skipped(SkipReason::Malformed(NormalizeError::MissingSide))
        );
        assert_eq!(tx.fill(ACCT, "ghost", &tick).await.unwrap(), FillOutcome::Skipped(SkipReason::Missing));
        assert!(store.trades(ACCT).is_empty());
    }

    #[tokio::test]
    async fn arm_is_conditional() {
        let (store, tx) = setup(vec![stop_limit("s1", false), open_limit("l1")]);
        assert!(tx.arm(ACCT, "s1").await.unwrap());
        assert!(!tx.arm(ACCT, "s1").await.unwrap(), "already armed");
        assert!(!tx.arm(ACCT, "l1").await.unwrap(), "limit orders have no stop");

        store.insert_order(ACCT, stop_limit("s2", false));
        store.cancel_order(ACCT, "s2");
        assert!(!tx.arm(ACCT, "s2").await.unwrap(), "cancelled");
        assert!(!tx.arm(ACCT, "ghost").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_fills_create_exactly_one_trade() {
        let (store, tx) = setup(vec![open_limit("o1")]);
        let tx = Arc::new(tx);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let tx = Arc::clone(&tx);
                tokio::spawn(async move { tx.fill(ACCT, "o1", &Tick::new(9, 95.0 + i as f64, i)).await })
            })
            .collect();

        let mut filled = 0;
        for h in handles {
            if let FillOutcome::Filled(_) = h.await.unwrap().unwrap() {
                filled += 1;
            }
        }
        assert_eq!(filled, 1);
        assert_eq!(store.trades(ACCT).len(), 1);
        let trade_id = store.order(ACCT, "o1").unwrap().get("trade_id").cloned();
        assert_eq!(trade_id, Some(json!(store.trades(ACCT)[0].id)));
    }

    #[tokio::test]
    async fn write_failure_leaves_order_open() {
        let (store, tx) = setup(vec![open_limit("o1")]);
        store.fail_next_writes(1);
        assert!(tx.fill(ACCT, "o1", &Tick::new(9, 95.0, 1)).await.is_err());
        assert_eq!(store.order(ACCT, "o1").unwrap().get("status"), Some(&json!("OPEN")));
        assert!(store.trades(ACCT).is_empty());

        // The next attempt goes through.
        let outcome = tx.fill(ACCT, "o1", &Tick::new(9, 95.0, 2)).await.unwrap();
        assert!(matches!(outcome, FillOutcome::Filled(_)));
    }

    /// Cancels the order right before the transaction body reads it, the way
    /// a user on another device would while a fill is in flight.
    struct CancelDuringFill {
        inner: Arc<MemoryStore>,
        order_id: String,
    }

    #[async_trait]
    impl OrderStore for CancelDuringFill {
        async fn watch_orders(&self, account_id: &str) -> Result<OrderWatch> {
            self.inner.watch_orders(account_id).await
        }

        async fn update_order_if(
            &self,
            account_id: &str,
            order_id: &str,
            precondition: &Precondition<'_>,
            patch: OrderPatch,
        ) -> Result<bool> {
            self.inner.update_order_if(account_id, order_id, precondition, patch).await
        }

        async fn run_transaction(&self, account_id: &str, body: &mut TxBody<'_>) -> Result<bool> {
            self.inner.cancel_order(account_id, &self.order_id);
            self.inner.run_transaction(account_id, body).await
        }
    }

    #[tokio::test]
    async fn cancellation_race_produces_no_trade() {
        let (store, _) = setup(vec![open_limit("o1")]);
        let racing = Arc::new(CancelDuringFill { inner: store.clone(), order_id: "o1".into() });
        let tx = FillTransactor::new(racing);

        let outcome = tx.fill(ACCT, "o1", &Tick::new(9, 95.0, 1)).await.unwrap();
        assert_eq!(outcome, FillOutcome::Skipped(SkipReason::NotOpen(Some(OrderStatus::Cancelled))));
        assert!(store.trades(ACCT).is_empty());
        assert!(store.order(ACCT, "o1").unwrap().get("trade_id").is_none());
    }
}
