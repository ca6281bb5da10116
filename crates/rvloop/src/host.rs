//! Boundary with the instrumentation engine.
//!
//! The engine owns disassembly, block formation and dispatch. It shows the
//! analyzer each freshly translated block through [`TranslatedBlock`] and
//! accepts one shared [`ExecProbe`] per instruction, which it must hand back to
//! [`Analyzer::fire`](crate::Analyzer::fire) (or pass the bound address to
//! [`Analyzer::record_execution`](crate::Analyzer::record_execution)) every
//! time that instruction executes.

use std::borrow::Cow;
use std::sync::Arc;

use rvloop_state::Counter;

/// A block of guest instructions the engine has just translated.
pub trait TranslatedBlock {
    /// Number of instructions in the block.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Virtual address of instruction `index`.
    fn vaddr(&self, index: usize) -> u64;

    /// Disassembly text of instruction `index`.
    fn disas(&self, index: usize) -> Cow<'_, str>;

    /// Ask the engine to fire `probe` whenever instruction `index` executes.
    ///
    /// Every translation of an address receives the same probe, and the
    /// analyzer keeps it alive until it is dropped.
    fn register_exec(&mut self, index: usize, probe: Arc<ExecProbe>);
}

/// Execution callback state bound to one instruction.
///
/// Holds the instruction's execution counter directly, so firing a probe
/// skips the address lookup.
#[derive(Clone, Debug)]
pub struct ExecProbe {
    vaddr: u64,
    pub(crate) executions: Counter,
}

impl ExecProbe {
    pub(crate) const fn new(vaddr: u64, executions: Counter) -> Self {
        Self { vaddr, executions }
    }

    /// Address this probe is bound to.
    #[must_use]
    pub const fn vaddr(&self) -> u64 {
        self.vaddr
    }
}

/// Instruction of a [`RecordedBlock`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestInsn {
    pub vaddr: u64,
    pub disas: String,
}

impl GuestInsn {
    pub fn new(vaddr: u64, disas: impl Into<String>) -> Self {
        Self {
            vaddr,
            disas: disas.into(),
        }
    }
}

/// In-memory translated block that keeps the probes registered on it.
///
/// Used by hosts that drive execution themselves (log replay, tests).
#[derive(Clone, Debug, Default)]
pub struct RecordedBlock {
    insns: Vec<GuestInsn>,
    probes: Vec<Option<Arc<ExecProbe>>>,
}

impl RecordedBlock {
    #[must_use]
    pub fn new(insns: Vec<GuestInsn>) -> Self {
        let probes = vec![None; insns.len()];
        Self { insns, probes }
    }

    /// Address of the first instruction.
    #[must_use]
    pub fn start(&self) -> Option<u64> {
        self.insns.first().map(|insn| insn.vaddr)
    }

    /// Probe registered on instruction `index`, if any.
    #[must_use]
    pub fn probe(&self, index: usize) -> Option<&Arc<ExecProbe>> {
        self.probes.get(index)?.as_ref()
    }

    /// Registered probes, in instruction order.
    pub fn probes(&self) -> impl Iterator<Item = &ExecProbe> {
        self.probes.iter().flatten().map(|probe| &**probe)
    }
}

impl TranslatedBlock for RecordedBlock {
    fn len(&self) -> usize {
        self.insns.len()
    }

    fn vaddr(&self, index: usize) -> u64 {
        self.insns[index].vaddr
    }

    fn disas(&self, index: usize) -> Cow<'_, str> {
        Cow::Borrowed(&self.insns[index].disas)
    }

    fn register_exec(&mut self, index: usize, probe: Arc<ExecProbe>) {
        self.probes[index] = Some(probe);
    }
}
