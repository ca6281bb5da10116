//! Shared bookkeeping for rvloop.
//!
//! Everything here is written from instrumentation callbacks that may run on
//! several vCPU threads at once. Maps are split into address-selected shards,
//! each behind its own `RwLock`; counters are atomics bumped under the shard's
//! read lock, so the common increment never takes an exclusive lock.

mod counters;
mod interned;
mod loops;
mod set;
mod shard;

pub use counters::{Counter, CounterStore};
pub use interned::Interned;
pub use loops::LoopRegistry;
pub use set::AddressSet;
pub use shard::DEFAULT_SHARDS;
