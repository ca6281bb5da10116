//! The analyzer context: block instrumentation, execution callback, shutdown.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rvloop_disasm::{BranchClassifier, Classification};
use rvloop_state::{CounterStore, Interned, LoopRegistry};
use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::host::{ExecProbe, TranslatedBlock};
use crate::metrics;
use crate::report::Report;
use crate::stats::{AnalyzerStats, StatsSnapshot};

/// State for one monitored run.
///
/// Shared by reference (usually behind an `Arc`) between the engine's
/// translation hook, its per-instruction callbacks and the exit hook. All
/// methods take `&self` and are safe to call from several threads at once.
pub struct Analyzer {
    config: AnalyzerConfig,
    classifier: BranchClassifier,
    executions: CounterStore,
    /// One probe per instrumented address, reused on retranslation.
    probes: Interned<ExecProbe>,
    loops: LoopRegistry,
    stats: AnalyzerStats,
    reported: AtomicBool,
}

impl Analyzer {
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            classifier: BranchClassifier::new(config.mnemonic_match),
            executions: CounterStore::new(config.shards),
            probes: Interned::new(config.shards),
            loops: LoopRegistry::new(config.shards),
            stats: AnalyzerStats::default(),
            reported: AtomicBool::new(false),
            config,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(AnalyzerConfig::default())
    }

    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Instrument a freshly translated block.
    ///
    /// Classifies every instruction and registers an execution probe for it.
    /// Retranslating a block only re-registers probes; existing counts and
    /// loop registrations are untouched.
    pub fn translate_block<B: TranslatedBlock + ?Sized>(&self, block: &mut B) {
        let len = block.len();
        for index in 0..len {
            let vaddr = block.vaddr(index);
            {
                let disas = block.disas(index);
                if self.config.log_disassembly {
                    info!("{vaddr:#x}: {disas}");
                }
                self.classify(vaddr, &disas);
            }
            block.register_exec(index, self.probe(vaddr));
        }

        self.stats.record_block(len);
        metrics::record_block(len);
    }

    /// Classify one instruction and register it if it closes a loop.
    pub fn classify(&self, vaddr: u64, disas: &str) -> Classification {
        let classification = self.classifier.classify(vaddr, disas);
        self.stats.record_classification(&classification);
        metrics::record_classification(&classification);

        match &classification {
            Classification::Backward { edge, .. } => {
                if self.loops.register_edge(edge.start, edge.end) {
                    info!(
                        "Possible loop detected: start {:#x}, end {:#x}",
                        edge.start, edge.end
                    );
                }
            }
            Classification::Unresolved { error, .. } => {
                debug!(addr = format!("{vaddr:#x}"), %error, disas, "unresolved branch target");
            }
            Classification::NotBranch | Classification::Forward { .. } => {}
        }
        classification
    }

    /// Probe bound to `vaddr`, with its counter resolved up front.
    ///
    /// The same probe is returned for every request on `vaddr` and lives as
    /// long as the analyzer.
    #[must_use]
    pub fn probe(&self, vaddr: u64) -> Arc<ExecProbe> {
        self.probes.get_or_insert_with(vaddr, || {
            ExecProbe::new(vaddr, self.executions.counter(vaddr))
        })
    }

    /// Number of distinct addresses that have been given a probe.
    #[must_use]
    pub fn instrumented(&self) -> usize {
        self.probes.len()
    }

    /// Execution callback for a registered probe.
    #[inline]
    pub fn fire(&self, probe: &ExecProbe) {
        probe.executions.fetch_add(1, Ordering::Relaxed);
        self.loops.record_arrival(probe.vaddr());
    }

    /// Execution callback keyed by address.
    ///
    /// Addresses that were never registered get a counter on first use.
    #[inline]
    pub fn record_execution(&self, vaddr: u64) {
        self.executions.increment(vaddr);
        self.loops.record_arrival(vaddr);
    }

    #[must_use]
    pub fn execution_count(&self, vaddr: u64) -> Option<u64> {
        self.executions.get(vaddr)
    }

    #[must_use]
    pub fn loop_iterations(&self, vaddr: u64) -> Option<u64> {
        self.loops.iterations(vaddr)
    }

    #[must_use]
    pub const fn loops(&self) -> &LoopRegistry {
        &self.loops
    }

    #[must_use]
    pub const fn executions(&self) -> &CounterStore {
        &self.executions
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Snapshot of the current counts.
    #[must_use]
    pub fn report(&self) -> Report {
        Report {
            loops: self.loops.iterations_snapshot(),
            instructions: self.executions.snapshot(),
            loop_starts: self.loops.num_starts(),
            loop_ends: self.loops.num_ends(),
            stats: self.stats.snapshot(),
        }
    }

    /// Emit the final report to `out`.
    ///
    /// Must be called once, after the monitored program has stopped. A second
    /// call fails with [`Error::AlreadyReported`] and writes nothing.
    pub fn shutdown<W: Write + ?Sized>(&self, out: &mut W) -> Result<Report> {
        if self.reported.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyReported);
        }

        let report = self.report();
        report.write(out, self.config.report_format, self.config.top)?;
        out.flush()?;
        metrics::record_report(&report);
        info!(
            instructions = report.instructions.len(),
            loops = report.loops.len(),
            blocks = report.stats.blocks,
            "analysis finished"
        );
        Ok(report)
    }

    /// Whether [`shutdown`](Self::shutdown) already ran.
    #[must_use]
    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{GuestInsn, RecordedBlock};
    use rvloop_disasm::MnemonicMatch;

    fn loop_block() -> RecordedBlock {
        RecordedBlock::new(vec![
            GuestInsn::new(0xff8, "addi a0,a0,1"),
            GuestInsn::new(0xffc, "nop"),
            GuestInsn::new(0x1000, "beq  a0,a1,-8  # 0xff8"),
        ])
    }

    fn run(analyzer: &Analyzer, block: &RecordedBlock, times: usize) {
        for _ in 0..times {
            for probe in block.probes() {
                analyzer.fire(probe);
            }
        }
    }

    #[test]
    fn test_translate_registers_loop_edge() {
        let analyzer = Analyzer::default();
        let mut block = RecordedBlock::new(vec![GuestInsn::new(0x1000, "beq  a0,a1,-8  # 0xff8")]);
        analyzer.translate_block(&mut block);

        assert_eq!(analyzer.loops().ends(), vec![0x1000]);
        assert_eq!(analyzer.loops().starts(), vec![0xff8]);
        assert_eq!(block.probes().count(), 1);
    }

    #[test]
    fn test_forward_branch_not_registered() {
        let analyzer = Analyzer::default();
        let mut block =
            RecordedBlock::new(vec![GuestInsn::new(0x1010, "bne a0,a1,+16  # 0x1020")]);
        analyzer.translate_block(&mut block);

        assert!(analyzer.loops().starts().is_empty());
        assert!(analyzer.loops().ends().is_empty());
        assert_eq!(analyzer.stats().forward, 1);
    }

    #[test]
    fn test_every_instruction_gets_a_probe() {
        let analyzer = Analyzer::default();
        let mut block = loop_block();
        analyzer.translate_block(&mut block);

        let addrs: Vec<u64> = block.probes().map(ExecProbe::vaddr).collect();
        assert_eq!(addrs, vec![0xff8, 0xffc, 0x1000]);
        // Registration alone records nothing.
        assert_eq!(analyzer.execution_count(0xff8), None);
    }

    #[test]
    fn test_exact_counts() {
        let analyzer = Analyzer::default();
        let mut block = loop_block();
        analyzer.translate_block(&mut block);
        run(&analyzer, &block, 5);

        assert_eq!(analyzer.execution_count(0x1000), Some(5));
        assert_eq!(analyzer.execution_count(0xff8), Some(5));
        assert_eq!(analyzer.loop_iterations(0xff8), Some(5));
        assert_eq!(analyzer.loop_iterations(0x1000), None);
    }

    #[test]
    fn test_counts_are_independent_per_address() {
        let analyzer = Analyzer::default();
        let mut block = RecordedBlock::new(vec![GuestInsn::new(0x1000, "beq  a0,a1,-8  # 0xff8")]);
        analyzer.translate_block(&mut block);
        run(&analyzer, &block, 5);
        analyzer.record_execution(0xff8);

        assert_eq!(analyzer.execution_count(0x1000), Some(5));
        assert_eq!(analyzer.execution_count(0xff8), Some(1));
        assert_eq!(analyzer.loop_iterations(0xff8), Some(1));
    }

    #[test]
    fn test_retranslation_is_idempotent() {
        let analyzer = Analyzer::default();
        let mut block = loop_block();
        analyzer.translate_block(&mut block);
        run(&analyzer, &block, 3);

        let mut again = loop_block();
        analyzer.translate_block(&mut again);
        run(&analyzer, &again, 2);

        assert_eq!(analyzer.loops().starts(), vec![0xff8]);
        assert_eq!(analyzer.loops().ends(), vec![0x1000]);
        assert_eq!(analyzer.execution_count(0xffc), Some(5));
        assert_eq!(analyzer.loop_iterations(0xff8), Some(5));
        assert_eq!(analyzer.stats().blocks, 2);
        assert_eq!(analyzer.stats().instructions, 6);
    }

    #[test]
    fn test_retranslation_reuses_probes() {
        let analyzer = Analyzer::default();
        let mut first = loop_block();
        analyzer.translate_block(&mut first);
        let mut second = loop_block();
        analyzer.translate_block(&mut second);

        for index in 0..3 {
            let a = first.probe(index).unwrap();
            let b = second.probe(index).unwrap();
            assert!(Arc::ptr_eq(a, b));
        }
        assert_eq!(analyzer.instrumented(), 3);
    }

    #[test]
    fn test_unknown_address_is_created_lazily() {
        let analyzer = Analyzer::default();
        analyzer.record_execution(0xdead_beef);
        analyzer.record_execution(0xdead_beef);
        assert_eq!(analyzer.execution_count(0xdead_beef), Some(2));
        assert_eq!(analyzer.loop_iterations(0xdead_beef), None);
    }

    #[test]
    fn test_iterations_start_after_registration() {
        let analyzer = Analyzer::default();
        // The head runs before the latch has been translated.
        analyzer.record_execution(0xff8);
        let mut latch = RecordedBlock::new(vec![GuestInsn::new(0x1000, "bnez a0,-8  # 0xff8")]);
        analyzer.translate_block(&mut latch);
        analyzer.record_execution(0xff8);

        assert_eq!(analyzer.execution_count(0xff8), Some(2));
        assert_eq!(analyzer.loop_iterations(0xff8), Some(1));
    }

    #[test]
    fn test_unresolved_targets_are_counted() {
        let analyzer = Analyzer::default();
        let mut block = RecordedBlock::new(vec![
            GuestInsn::new(0x1000, "beq a0,a1,-8"),
            GuestInsn::new(0x1004, "bne a0,a1,-8  # zz"),
        ]);
        analyzer.translate_block(&mut block);

        let stats = analyzer.stats();
        assert_eq!(stats.branches, 2);
        assert_eq!(stats.unresolved, 2);
        assert!(analyzer.loops().starts().is_empty());
    }

    #[test]
    fn test_prefix_mode() {
        let analyzer = Analyzer::new(
            AnalyzerConfig::default().with_mnemonic_match(MnemonicMatch::Prefix),
        );
        analyzer.classify(0x1000, "bgeu.x a0,a1,-8  # 0xff8");
        assert!(analyzer.loops().is_loop_start(0xff8));
    }

    #[test]
    fn test_shutdown_runs_once() {
        let analyzer = Analyzer::default();
        let mut block = loop_block();
        analyzer.translate_block(&mut block);
        run(&analyzer, &block, 5);

        let mut out = Vec::new();
        let report = analyzer.shutdown(&mut out).unwrap();
        assert_eq!(report.loops, vec![(0xff8, 5)]);
        assert!(analyzer.is_reported());

        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l == "Loop at 0xff8 executed 5 times"));

        let mut second = Vec::new();
        assert!(matches!(
            analyzer.shutdown(&mut second),
            Err(Error::AlreadyReported)
        ));
        assert!(second.is_empty());
    }
}
