//! Execution guard.
//!
//! Ticks can arrive faster than an evaluation's store round-trips complete,
//! and order-collection changes re-fire evaluation too. The guard makes sure
//! at most one evaluation per order runs at a time: [`ExecutionGuard::try_acquire`]
//! hands out an [`EvalLease`] and refuses a second one for the same order
//! until the first is dropped.
//!
//! The guard is an optimization. Exactly-once filling is enforced by the
//! fill transaction, not here.

use std::sync::Arc;

use dashmap::DashSet;

#[derive(Clone, Default)]
pub struct ExecutionGuard {
    in_flight: Arc<DashSet<String>>,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `order_id`, or `None` if an evaluation of that
    /// order is already running.
    pub fn try_acquire(&self, order_id: &str) -> Option<EvalLease> {
        if !self.in_flight.insert(order_id.to_string()) {
            return None;
        }
        Some(EvalLease { in_flight: Arc::clone(&self.in_flight), order_id: order_id.to_string() })
    }

    pub fn is_in_flight(&self, order_id: &str) -> bool {
        self.in_flight.contains(order_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Exclusive right to evaluate one order. Released on drop, including when
/// the evaluating task panics or is aborted.
pub struct EvalLease {
    in_flight: Arc<DashSet<String>>,
    order_id: String,
}

impl EvalLease {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }
}

impl Drop for EvalLease {
    fn drop(&mut self) {
        self.in_flight.remove(&self.order_id);
    }
}
