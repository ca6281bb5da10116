//! Loop heads, loop latches and per-head iteration counts.

use crate::counters::CounterStore;
use crate::set::AddressSet;
use crate::shard::DEFAULT_SHARDS;

/// Loops discovered from backward branches.
///
/// A loop is identified by its start address (the branch target). Iteration
/// counts only exist for registered starts.
pub struct LoopRegistry {
    starts: AddressSet,
    ends: AddressSet,
    iterations: CounterStore,
}

impl LoopRegistry {
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            starts: AddressSet::new(shards),
            ends: AddressSet::new(shards),
            iterations: CounterStore::new(shards),
        }
    }

    /// Register a backward branch at `end` targeting `start`.
    ///
    /// Returns `true` if this edge was not known before. Callers guarantee
    /// `start < end`.
    pub fn register_edge(&self, start: u64, end: u64) -> bool {
        debug_assert!(start < end, "loop edge must branch backwards");
        // Insert the start first so a concurrent executor never sees an end
        // whose start is missing.
        let new_start = self.starts.insert(start);
        let new_end = self.ends.insert(end);
        new_start || new_end
    }

    #[inline]
    #[must_use]
    pub fn is_loop_start(&self, addr: u64) -> bool {
        self.starts.contains(addr)
    }

    #[must_use]
    pub fn is_loop_end(&self, addr: u64) -> bool {
        self.ends.contains(addr)
    }

    /// Count one arrival at `addr` if it is a loop start.
    ///
    /// Returns the new iteration count, or `None` if `addr` is not a start.
    #[inline]
    pub fn record_arrival(&self, addr: u64) -> Option<u64> {
        self.is_loop_start(addr)
            .then(|| self.iterations.increment(addr))
    }

    /// Iteration count of the loop starting at `addr`.
    #[must_use]
    pub fn iterations(&self, addr: u64) -> Option<u64> {
        self.iterations.get(addr)
    }

    /// Non-zero `(start, iterations)` pairs, sorted by address.
    #[must_use]
    pub fn iterations_snapshot(&self) -> Vec<(u64, u64)> {
        self.iterations.snapshot()
    }

    #[must_use]
    pub fn starts(&self) -> Vec<u64> {
        self.starts.to_sorted_vec()
    }

    #[must_use]
    pub fn ends(&self) -> Vec<u64> {
        self.ends.to_sorted_vec()
    }

    #[must_use]
    pub fn num_starts(&self) -> usize {
        self.starts.len()
    }

    #[must_use]
    pub fn num_ends(&self) -> usize {
        self.ends.len()
    }
}

impl Default for LoopRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
