//! # lw-exec
//!
//! Client-side limit/stop order execution.
//!
//! Watches an account's open orders, listens to prices for the instruments
//! they reference, and when a condition is met writes the result back to the
//! order store: arming a stop with a conditional update, or filling an order
//! with one atomic transaction that creates the trade and marks the order
//! FILLED.
//!
//! - [`store`]: `OrderStore` trait and the in-memory implementation
//! - [`watch_list`]: open orders indexed by instrument token
//! - [`evaluator`]: pure arm / fill decision
//! - [`guard`]: one evaluation per order at a time
//! - [`transactor`]: arm and fill writes
//! - [`engine`]: session loop tying it together

pub mod engine;
pub mod evaluator;
pub mod guard;
pub mod stats;
pub mod store;
pub mod transactor;
pub mod watch_list;

pub use engine::ExecutionEngine;
pub use stats::StatsSnapshot;
pub use store::{MemoryStore, OrderStore};
