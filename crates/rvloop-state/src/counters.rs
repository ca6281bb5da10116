//! Per-address execution counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::shard::{DEFAULT_SHARDS, Sharded};

/// Shared handle to one address's counter.
pub type Counter = Arc<AtomicU64>;

/// Address → count map that tolerates concurrent increments.
///
/// Increments of existing counters only take a shard read lock, so cores
/// hitting different (or the same) hot addresses do not serialize. A counter
/// that exists but was never incremented is indistinguishable from a missing
/// one in every read accessor.
pub struct CounterStore {
    shards: Sharded<FxHashMap<u64, Counter>>,
}

impl CounterStore {
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            shards: Sharded::new(shards),
        }
    }

    /// Get or create the counter for `addr`.
    pub fn counter(&self, addr: u64) -> Counter {
        let shard = self.shards.shard(addr);
        if let Some(counter) = shard.read().get(&addr) {
            return Arc::clone(counter);
        }
        Arc::clone(shard.write().entry(addr).or_default())
    }

    /// Increment the counter for `addr`, creating it on first use.
    ///
    /// Returns the new count.
    #[inline]
    pub fn increment(&self, addr: u64) -> u64 {
        let shard = self.shards.shard(addr);
        {
            let map = shard.read();
            if let Some(counter) = map.get(&addr) {
                return counter.fetch_add(1, Ordering::Relaxed) + 1;
            }
        }
        let mut map = shard.write();
        map.entry(addr)
            .or_default()
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    /// Recorded count for `addr`, if it executed at least once.
    #[must_use]
    pub fn get(&self, addr: u64) -> Option<u64> {
        let count = self
            .shards
            .shard(addr)
            .read()
            .get(&addr)
            .map(|counter| counter.load(Ordering::Relaxed))?;
        (count > 0).then_some(count)
    }

    /// Non-zero `(address, count)` pairs, sorted by address.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        let mut entries: Vec<(u64, u64)> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .iter()
                    .map(|(&addr, counter)| (addr, counter.load(Ordering::Relaxed)))
                    .filter(|&(_, count)| count > 0)
                    .collect::<Vec<_>>()
            })
            .collect();
        entries.sort_unstable_by_key(|&(addr, _)| addr);
        entries
    }

    /// Number of addresses with a non-zero count.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .filter(|counter| counter.load(Ordering::Relaxed) > 0)
                    .count()
            })
            .sum()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .map(|counter| counter.load(Ordering::Relaxed))
                    .sum::<u64>()
            })
            .sum()
    }
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
