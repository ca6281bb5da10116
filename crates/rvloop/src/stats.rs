//! Translation-time counters kept by the analyzer.

use std::sync::atomic::{AtomicU64, Ordering};

use rvloop_disasm::Classification;

/// Counters updated while blocks are translated. Never touched by the
/// execution callback.
#[derive(Debug, Default)]
pub struct AnalyzerStats {
    blocks: AtomicU64,
    instructions: AtomicU64,
    branches: AtomicU64,
    backward: AtomicU64,
    forward: AtomicU64,
    unresolved: AtomicU64,
}

/// Point-in-time copy of [`AnalyzerStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Block translation notifications handled.
    pub blocks: u64,
    /// Instructions instrumented (counting retranslations).
    pub instructions: u64,
    /// Conditional branches seen.
    pub branches: u64,
    /// Branches classified as loop edges.
    pub backward: u64,
    /// Branches with a target at or above their own address.
    pub forward: u64,
    /// Branches whose target could not be parsed.
    pub unresolved: u64,
}

impl AnalyzerStats {
    pub(crate) fn record_block(&self, instructions: usize) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.instructions
            .fetch_add(instructions as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_classification(&self, classification: &Classification) {
        let slot = match classification {
            Classification::NotBranch => return,
            Classification::Unresolved { .. } => &self.unresolved,
            Classification::Forward { .. } => &self.forward,
            Classification::Backward { .. } => &self.backward,
        };
        self.branches.fetch_add(1, Ordering::Relaxed);
        slot.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            instructions: self.instructions.load(Ordering::Relaxed),
            branches: self.branches.load(Ordering::Relaxed),
            backward: self.backward.load(Ordering::Relaxed),
            forward: self.forward.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
        }
    }
}
