//! One shared value per address.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::shard::{DEFAULT_SHARDS, Sharded};

/// Address → `Arc<V>` table where each address gets exactly one value.
///
/// Values are never removed, so a pointer taken from a returned `Arc` stays
/// valid for as long as the table lives.
pub struct Interned<V> {
    shards: Sharded<FxHashMap<u64, Arc<V>>>,
}

impl<V> Interned<V> {
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            shards: Sharded::new(shards),
        }
    }

    /// The value for `addr`, built with `init` if this is the first request.
    pub fn get_or_insert_with(&self, addr: u64, init: impl FnOnce() -> V) -> Arc<V> {
        let shard = self.shards.shard(addr);
        if let Some(value) = shard.read().get(&addr) {
            return Arc::clone(value);
        }
        Arc::clone(
            shard
                .write()
                .entry(addr)
                .or_insert_with(|| Arc::new(init())),
        )
    }

    #[must_use]
    pub fn get(&self, addr: u64) -> Option<Arc<V>> {
        self.shards.shard(addr).read().get(&addr).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

impl<V> Default for Interned<V> {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_value_built_once() {
        let table = Interned::<u64>::default();
        let a = table.get_or_insert_with(0x1000, || 1);
        let b = table.get_or_insert_with(0x1000, || 2);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 1);
        assert_eq!(table.len(), 1);
        assert!(table.get(0x1004).is_none());
    }

    #[test]
    fn test_concurrent_requests_share_one_value() {
        let table = Interned::<u64>::new(4);
        let values: Vec<Arc<u64>> = (0..64u64)
            .into_par_iter()
            .map(|i| table.get_or_insert_with(0x2000, || i))
            .collect();
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        assert_eq!(table.len(), 1);
    }
}
