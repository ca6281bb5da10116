//! Address-sharded lock table.

use std::hash::BuildHasher;

use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;

/// Default shard count. Must be a power of two.
pub const DEFAULT_SHARDS: usize = 64;

/// A fixed number of independently locked `T`s, selected by address.
pub(crate) struct Sharded<T> {
    shards: Box<[RwLock<T>]>,
    mask: usize,
}

impl<T: Default> Sharded<T> {
    /// `count` is rounded up to a power of two (minimum 1).
    pub(crate) fn new(count: usize) -> Self {
        let count = count.max(1).next_power_of_two();
        let shards = (0..count).map(|_| RwLock::new(T::default())).collect();
        Self {
            shards,
            mask: count - 1,
        }
    }
}

impl<T> Sharded<T> {
    #[inline]
    pub(crate) fn shard(&self, addr: u64) -> &RwLock<T> {
        // Fx is multiplicative: the high half of the hash is the well-mixed part.
        let hash = FxBuildHasher.hash_one(addr);
        &self.shards[(hash >> 32) as usize & self.mask]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RwLock<T>> {
        self.shards.iter()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.shards.len()
    }
}
