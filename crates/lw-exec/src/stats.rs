//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters updated from the engine loop and evaluation tasks.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub ticks: AtomicU64,
    pub stale_ticks: AtomicU64,
    pub evaluations: AtomicU64,
    pub guard_skips: AtomicU64,
    pub normalize_misses: AtomicU64,
    pub arms: AtomicU64,
    pub fills: AtomicU64,
    pub stale_aborts: AtomicU64,
    pub write_failures: AtomicU64,
}

impl EngineStats {
    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            ticks: get(&self.ticks),
            stale_ticks: get(&self.stale_ticks),
            evaluations: get(&self.evaluations),
            guard_skips: get(&self.guard_skips),
            normalize_misses: get(&self.normalize_misses),
            arms: get(&self.arms),
            fills: get(&self.fills),
            stale_aborts: get(&self.stale_aborts),
            write_failures: get(&self.write_failures),
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Ticks fully processed by the engine loop (stale ones included).
    pub ticks: u64,
    pub stale_ticks: u64,
    pub evaluations: u64,
    pub guard_skips: u64,
    pub normalize_misses: u64,
    pub arms: u64,
    pub fills: u64,
    /// Fill transactions that found the order no longer eligible.
    pub stale_aborts: u64,
    pub write_failures: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ticks={} stale={} evals={} guard_skips={} misses={} arms={} fills={} aborts={} write_failures={}",
            self.ticks,
            self.stale_ticks,
            self.evaluations,
            self.guard_skips,
            self.normalize_misses,
            self.arms,
            self.fills,
            self.stale_aborts,
            self.write_failures,
        )
    }
}
