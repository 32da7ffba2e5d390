//! Order watch list.
//!
//! Derived, read-only view of an account's order collection: the normalized
//! orders the engine can act on, indexed by instrument token so that a tick
//! only touches the orders that reference its instrument.
//!
//! [`WatchList::rebuild`] is called with every new collection snapshot and
//! reports which tokens to subscribe/unsubscribe and which orders were not
//! watched before. Orders already watched are replaced in place.

use ahash::{AHashMap, AHashSet};
use lw_core::error::NormalizeError;
use lw_core::normalize;
use lw_core::types::{InstrumentToken, Order, OrderDoc};
use tracing::{debug, trace};

/// Result of applying a new snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchDiff {
    /// Tokens referenced now that were not referenced before, sorted.
    pub subscribe: Vec<InstrumentToken>,
    /// Tokens no longer referenced by any watched order, sorted.
    pub unsubscribe: Vec<InstrumentToken>,
    /// Ids of orders that were not watched before this snapshot, sorted.
    pub added: Vec<String>,
    /// Open orders left out because a required value could not be resolved.
    pub misses: usize,
}

#[derive(Debug, Default)]
pub struct WatchList {
    orders: AHashMap<String, Order>,
    by_token: AHashMap<InstrumentToken, Vec<String>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the watched set with the evaluable orders of `docs`.
    pub fn rebuild(&mut self, docs: &[OrderDoc]) -> WatchDiff {
        let mut diff = WatchDiff::default();
        let mut orders = AHashMap::with_capacity(docs.len());

        for doc in docs {
            let open = normalize::status(&doc.fields).is_some_and(|s| s.is_open());
            if !open || normalize::trade_id(&doc.fields).is_some() {
                continue;
            }
            match normalize::normalize(doc) {
                Ok(order) => {
                    if !self.orders.contains_key(&order.id) {
                        diff.added.push(order.id.clone());
                    }
                    orders.insert(order.id.clone(), order);
                }
                Err(NormalizeError::UnsupportedKind(kind)) => {
                    trace!("[watch] order {} kind '{kind}' not handled", doc.id);
                }
                Err(e) => {
                    debug!("[watch] order {} skipped: {e}", doc.id);
                    diff.misses += 1;
                }
            }
        }

        let mut by_token: AHashMap<InstrumentToken, Vec<String>> = AHashMap::new();
        for order in orders.values() {
            by_token.entry(order.instrument_token).or_default().push(order.id.clone());
        }
        for ids in by_token.values_mut() {
            ids.sort_unstable();
        }

        let before: AHashSet<InstrumentToken> = self.by_token.keys().copied().collect();
        let after: AHashSet<InstrumentToken> = by_token.keys().copied().collect();
        diff.subscribe = after.difference(&before).copied().collect();
        diff.unsubscribe = before.difference(&after).copied().collect();
        diff.subscribe.sort_unstable();
        diff.unsubscribe.sort_unstable();
        diff.added.sort_unstable();

        self.orders = orders;
        self.by_token = by_token;
        diff
    }

    /// Orders referencing `token`, in id order.
    pub fn orders_for(&self, token: InstrumentToken) -> impl Iterator<Item = &Order> {
        self.by_token
            .get(&token)
            .into_iter()
            .flatten()
            .filter_map(|id| self.orders.get(id))
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn watches(&self, token: InstrumentToken) -> bool {
        self.by_token.contains_key(&token)
    }

    /// Every watched token, sorted.
    pub fn tokens(&self) -> Vec<InstrumentToken> {
        let mut tokens: Vec<_> = self.by_token.keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(id: &str, v: Value) -> OrderDoc {
        let Value::Object(fields) = v else { unreachable!() };
        OrderDoc::new(id, fields)
    }

    fn limit(id: &str, token: u64, status: &str) -> OrderDoc {
        doc(id, json!({"status": status, "order_type": "LIMIT", "token": token, "side": "BUY", "quantity": 1, "price": 10}))
    }

    #[test]
    fn derives_tokens_from_open_orders_only() {
        let mut wl = WatchList::new();
        let diff = wl.rebuild(&[
            limit("a", 1, "OPEN"),
            limit("b", 2, "TO_EXECUTE"),
            limit("c", 3, "FILLED"),
            limit("d", 4, "CANCELLED"),
            limit("e", 1, "PENDING"),
        ]);
        assert_eq!(diff.subscribe, vec![1, 2]);
        assert!(diff.unsubscribe.is_empty());
        assert_eq!(diff.added, vec!["a", "b", "e"]);
        assert_eq!(wl.tokens(), vec![1, 2]);
        let ids: Vec<_> = wl.orders_for(1).map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "e"]);
    }

    #[test]
    fn excludes_market_gtt_filled_and_misses() {
        let mut wl = WatchList::new();
        let diff = wl.rebuild(&[
            doc("m", json!({"status": "OPEN", "order_type": "MARKET", "token": 1, "side": "BUY", "quantity": 1})),
            doc("g", json!({"status": "OPEN", "order_type": "GTT", "token": 2, "side": "BUY", "quantity": 1, "price": 5})),
            doc("t", json!({"status": "OPEN", "token": 3, "side": "BUY", "quantity": 1, "price": 5, "trade_id": "x"})),
            doc("s", json!({"status": "OPEN", "order_type": "SL", "token": 4, "side": "BUY", "quantity": 1, "price": 5})),
        ]);
        assert!(wl.is_empty());
        assert!(diff.subscribe.is_empty());
        // Only the SL-L without trigger counts as a normalization miss.
        assert_eq!(diff.misses, 1);
    }

    #[test]
    fn incremental_diffs() {
        let mut wl = WatchList::new();
        wl.rebuild(&[limit("a", 1, "OPEN"), limit("b", 2, "OPEN")]);

        // Unchanged snapshot: no diff at all.
        let same = wl.rebuild(&[limit("a", 1, "OPEN"), limit("b", 2, "OPEN")]);
        assert_eq!(same, WatchDiff::default());

        // b cancelled, c added on a new token.
        let diff = wl.rebuild(&[limit("a", 1, "OPEN"), limit("b", 2, "CANCELLED"), limit("c", 5, "OPEN")]);
        assert_eq!(diff.subscribe, vec![5]);
        assert_eq!(diff.unsubscribe, vec![2]);
        assert_eq!(diff.added, vec!["c"]);
        assert!(wl.get("b").is_none());
        assert!(!wl.watches(2));
        assert_eq!(wl.len(), 2);
    }

    #[test]
    fn arming_replaces_in_place() {
        let mut wl = WatchList::new();
        let sl = |triggered: bool| {
            doc("s", json!({"status": "OPEN", "order_type": "SL", "token": 1, "side": "BUY",
                            "quantity": 1, "trigger_price": 100, "price": 101, "triggered": triggered}))
        };
        wl.rebuild(&[sl(false)]);
        let diff = wl.rebuild(&[sl(true)]);
        assert_eq!(diff, WatchDiff::default());
        assert!(wl.get("s").unwrap().triggered);
    }
}
