//! Execution engine.
//!
//! One session per account:
//!
//! ```text
//!   OrderStore::watch_orders ──► WatchList::rebuild ──► PriceFeed::(un)subscribe
//!                                      │
//!   TickReceiver ──► TickSequencer ──► orders_for(token)
//!                                      │
//!                                      ▼
//!                       ExecutionGuard lease + Semaphore permit
//!                                      │
//!                        Evaluator ──► FillTransactor (arm / fill)
//! ```
//!
//! The session loop owns every piece of mutable state (watch list, sequencer,
//! last prices). Evaluations run as independent tasks and only share the
//! guard, the counters and the store.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use anyhow::Result;
use lw_core::config::EngineConfig;
use lw_core::error::LwError;
use lw_core::types::{InstrumentToken, Order, OrderDoc, Tick};
use lw_feed::sequencer::TickSequencer;
use lw_feed::{PriceFeed, TickReceiver};
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::evaluator::{Decision, Evaluator};
use crate::guard::ExecutionGuard;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::store::{OrderSnapshot, OrderStore, OrderWatch};
use crate::transactor::{FillOutcome, FillTransactor};
use crate::watch_list::WatchList;

/// State shared by the session loop and its evaluation tasks.
struct Shared {
    account_id: String,
    evaluator: Evaluator,
    transactor: FillTransactor,
    guard: ExecutionGuard,
    stats: Arc<EngineStats>,
    permits: Semaphore,
}

impl Shared {
    /// Lease the order and spawn its evaluation. Skipped while a previous
    /// evaluation of the same order is still running.
    fn dispatch(self: &Arc<Self>, order: &Order, tick: Tick) {
        let Some(lease) = self.guard.try_acquire(&order.id) else {
            EngineStats::incr(&self.stats.guard_skips);
            trace!("[engine] {} busy, skipping {tick}", order.id);
            return;
        };
        let shared = Arc::clone(self);
        let order = order.clone();
        tokio::spawn(async move {
            let _lease = lease;
            let Ok(_permit) = shared.permits.acquire().await else {
                return;
            };
            shared.evaluate(&order, &tick).await;
        });
    }

    async fn evaluate(&self, order: &Order, tick: &Tick) {
        EngineStats::incr(&self.stats.evaluations);
        match self.evaluator.evaluate(order, tick.price) {
            Decision::Hold => {}
            Decision::Arm => {
                self.arm(order, tick).await;
            }
            Decision::Fill => self.fill(order, tick).await,
            Decision::ArmAndFill => {
                // Fill only runs once the arm write has committed (or was
                // already in place).
                if self.arm(order, tick).await.is_some() {
                    self.fill(order, tick).await;
                }
            }
        }
    }

    /// `None` if the write failed.
    async fn arm(&self, order: &Order, tick: &Tick) -> Option<bool> {
        match self.transactor.arm(&self.account_id, &order.id).await {
            Ok(true) => {
                EngineStats::incr(&self.stats.arms);
                info!("[engine] armed {order} at {:.2}", tick.price);
                Some(true)
            }
            Ok(false) => {
                debug!("[engine] {} no longer armable", order.id);
                Some(false)
            }
            Err(e) => {
                EngineStats::incr(&self.stats.write_failures);
                warn!("[engine] arm of {} failed: {e:#}", order.id);
                None
            }
        }
    }

    async fn fill(&self, order: &Order, tick: &Tick) {
        match self.transactor.fill(&self.account_id, &order.id, tick).await {
            Ok(FillOutcome::Filled(trade)) => {
                EngineStats::incr(&self.stats.fills);
                info!("[engine] filled {order} -> {trade}");
            }
            Ok(FillOutcome::Skipped(reason)) => {
                EngineStats::incr(&self.stats.stale_aborts);
                debug!("[engine] fill of {} aborted: {reason}", order.id);
            }
            Err(e) => {
                EngineStats::incr(&self.stats.write_failures);
                warn!("[engine] fill of {} failed: {e:#}", order.id);
            }
        }
    }
}

/// Mutable state owned by one running session.
struct SessionLoop {
    shared: Arc<Shared>,
    feed: Arc<dyn PriceFeed>,
    watch_list: WatchList,
    sequencer: TickSequencer,
    ltp: AHashMap<InstrumentToken, Tick>,
    reevaluate: bool,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut orders: OrderWatch,
        mut ticks: TickReceiver,
        mut shutdown: oneshot::Receiver<()>,
    ) -> TickReceiver {
        let label = self.shared.account_id.clone();
        let initial = orders.borrow_and_update().clone();
        self.on_orders(&initial).await;
        info!("[engine:{label}] watching {} order(s) on {} token(s)", self.watch_list.len(), self.watch_list.tokens().len());

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                changed = orders.changed() => {
                    if changed.is_err() {
                        error!("[engine:{label}] order watch closed");
                        break;
                    }
                    let snapshot = orders.borrow_and_update().clone();
                    self.on_orders(&snapshot).await;
                }
                tick = ticks.recv() => match tick {
                    Some(tick) => self.on_tick(tick),
                    None => {
                        error!("[engine:{label}] tick stream ended");
                        break;
                    }
                },
            }
        }

        let tokens = self.watch_list.tokens();
        if !tokens.is_empty() {
            if let Err(e) = self.feed.unsubscribe(&tokens).await {
                warn!("[engine:{label}] unsubscribe on stop failed: {e:#}");
            }
        }
        info!("[engine:{label}] session ended");
        ticks
    }

    async fn on_orders(&mut self, snapshot: &OrderSnapshot) {
        let docs: &[OrderDoc] = snapshot;
        let diff = self.watch_list.rebuild(docs);
        EngineStats::add(&self.shared.stats.normalize_misses, diff.misses as u64);

        if !diff.subscribe.is_empty() {
            match self.feed.subscribe(&diff.subscribe).await {
                Ok(()) => debug!("[engine] subscribed {:?} on {}", diff.subscribe, self.feed.name()),
                Err(e) => warn!("[engine] subscribe {:?} failed: {e:#}", diff.subscribe),
            }
        }
        if !diff.unsubscribe.is_empty() {
            if let Err(e) = self.feed.unsubscribe(&diff.unsubscribe).await {
                warn!("[engine] unsubscribe {:?} failed: {e:#}", diff.unsubscribe);
            }
            for token in &diff.unsubscribe {
                self.sequencer.forget(*token);
                self.ltp.remove(token);
            }
        }

        if !self.reevaluate {
            return;
        }
        for id in &diff.added {
            let Some(order) = self.watch_list.get(id) else {
                continue;
            };
            if let Some(tick) = self.ltp.get(&order.instrument_token) {
                trace!("[engine] re-evaluating new order {id} against {tick}");
                self.shared.dispatch(order, *tick);
            }
        }
    }

    fn on_tick(&mut self, tick: Tick) {
        let token = tick.instrument_token;
        if self.watch_list.watches(token) {
            if self.sequencer.check_and_update(&tick) {
                self.ltp.insert(token, tick);
                for order in self.watch_list.orders_for(token) {
                    self.shared.dispatch(order, tick);
                }
            } else {
                EngineStats::incr(&self.shared.stats.stale_ticks);
                trace!("[engine] stale {tick} dropped");
            }
        }
        // Counted last so that a caller waiting on the counter sees every
        // lease this tick took.
        EngineStats::incr(&self.shared.stats.ticks);
    }
}

struct Session {
    account_id: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<TickReceiver>,
}

/// Client-driven limit/stop execution engine for one account at a time.
pub struct ExecutionEngine {
    config: EngineConfig,
    store: Arc<dyn OrderStore>,
    feed: Arc<dyn PriceFeed>,
    ticks: Option<TickReceiver>,
    guard: ExecutionGuard,
    stats: Arc<EngineStats>,
    session: Option<Session>,
}

impl ExecutionEngine {
    /// `ticks` must be the receiver paired with `feed`.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn OrderStore>,
        feed: Arc<dyn PriceFeed>,
        ticks: TickReceiver,
    ) -> Self {
        Self {
            config,
            store,
            feed,
            ticks: Some(ticks),
            guard: ExecutionGuard::new(),
            stats: Arc::new(EngineStats::default()),
            session: None,
        }
    }

    /// Start watching `account_id`. A running session is stopped first.
    pub async fn start(&mut self, account_id: &str) -> Result<()> {
        if self.session.is_some() {
            self.stop().await?;
        }
        let orders = self.store.watch_orders(account_id).await?;
        let ticks = self
            .ticks
            .take()
            .ok_or_else(|| LwError::Feed("tick receiver lost by a previous session".to_string()))?;

        let shared = Arc::new(Shared {
            account_id: account_id.to_string(),
            evaluator: Evaluator::new(
                self.config.effective_price_decimals(),
                self.config.effective_same_tick_fill(),
            ),
            transactor: FillTransactor::new(Arc::clone(&self.store)),
            guard: self.guard.clone(),
            stats: Arc::clone(&self.stats),
            permits: Semaphore::new(self.config.effective_max_concurrent()),
        });
        let session_loop = SessionLoop {
            shared,
            feed: Arc::clone(&self.feed),
            watch_list: WatchList::new(),
            sequencer: TickSequencer::new(),
            ltp: AHashMap::new(),
            reevaluate: self.config.effective_reevaluate_on_order_change(),
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(session_loop.run(orders, ticks, shutdown_rx));
        self.session = Some(Session { account_id: account_id.to_string(), shutdown, task });

        info!(
            "[engine] started account={account_id} feed={} same_tick_fill={} max_concurrent={}",
            self.feed.name(),
            self.config.effective_same_tick_fill(),
            self.config.effective_max_concurrent(),
        );
        Ok(())
    }

    /// Stop the current session and unsubscribe its tokens. Evaluations
    /// already in flight run to completion.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let _ = session.shutdown.send(());
        match session.task.await {
            Ok(ticks) => {
                self.ticks = Some(ticks);
                info!("[engine] stopped account={}", session.account_id);
                Ok(())
            }
            Err(e) => Err(LwError::Feed(format!("session loop for {} failed: {e}", session.account_id)).into()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.task.is_finished())
    }

    pub fn account_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.account_id.as_str())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait until at least `ticks_seen` ticks have been processed and no
    /// evaluation is in flight. Returns `false` on timeout.
    pub async fn settle(&self, ticks_seen: u64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.stats.snapshot().ticks >= ticks_seen && self.guard.in_flight_count() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}
