//! Concurrent address set.

use rustc_hash::FxHashSet;

use crate::shard::{DEFAULT_SHARDS, Sharded};

/// Insert-only set of instruction addresses.
pub struct AddressSet {
    shards: Sharded<FxHashSet<u64>>,
}

impl AddressSet {
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            shards: Sharded::new(shards),
        }
    }

    /// Insert `addr`. Returns `true` if it was not present.
    pub fn insert(&self, addr: u64) -> bool {
        let shard = self.shards.shard(addr);
        if shard.read().contains(&addr) {
            return false;
        }
        shard.write().insert(addr)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        self.shards.shard(addr).read().contains(&addr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// All members, sorted.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<u64> {
        let mut addrs: Vec<u64> = self
            .shards
            .iter()
            .flat_map(|shard| shard.read().iter().copied().collect::<Vec<_>>())
            .collect();
        addrs.sort_unstable();
        addrs
    }
}

impl Default for AddressSet {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
