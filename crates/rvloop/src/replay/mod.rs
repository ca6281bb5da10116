//! Offline host: replays a QEMU execution log through an [`Analyzer`].
//!
//! QEMU run with `-d in_asm,exec,nochain` logs every block it translates and
//! every block it executes. `IN:` sections become block translations and
//! `Trace` lines fire the probes of every instruction in the executed block.
//!
//! The log records block entries, not retired instructions. A block that
//! stops early (a fault or interrupt inside it, as in system-mode runs) is
//! still counted in full, and the instructions after the stop are counted
//! again when QEMU resumes at the faulting pc. Counts from a live plugin do
//! not have this error.
//!
//! Executions between two translations commute (they only bump counters and
//! the loop-start set cannot change), so each such batch is split per vCPU
//! and replayed on a rayon pool.

mod parse;


use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analyzer::Analyzer;
use crate::host::{GuestInsn, RecordedBlock};

pub use parse::{LogEvent, LogParser, parse_exec_line, parse_insn_line};

/// Pending executions flushed at this size even without a translation.
const MAX_BATCH: usize = 1 << 16;

/// Replay errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot open log {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("read error at line {line}: {source}")]
    Read {
        line: usize,
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Totals for one replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Log lines read.
    pub lines: usize,
    /// Block translations replayed.
    pub blocks: u64,
    /// Block executions replayed.
    pub block_execs: u64,
    /// Instruction executions delivered to the analyzer.
    pub insn_execs: u64,
    /// Block executions skipped because the block was never translated.
    pub untranslated: u64,
}

/// Open a log file, transparently decompressing `.zst` files.
pub fn open_log(path: &Path) -> Result<Box<dyn BufRead + Send>, ReplayError> {
    let open_err = |source| ReplayError::Open {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(open_err)?;

    if path.extension().is_some_and(|ext| ext == "zst") {
        let decoder = zstd::stream::read::Decoder::new(file).map_err(open_err)?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Replays QEMU logs into an analyzer.
pub struct Replayer {
    analyzer: Arc<Analyzer>,
    pool: rayon::ThreadPool,
    jobs: usize,
    /// Latest translation of each block, keyed by start address.
    blocks: FxHashMap<u64, RecordedBlock>,
    pending: Vec<(u32, u64)>,
    summary: ReplaySummary,
}

impl Replayer {
    /// Create a replayer using `jobs` worker threads (0 = one per CPU).
    pub fn new(analyzer: Arc<Analyzer>, jobs: usize) -> Result<Self, ReplayError> {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        Ok(Self {
            analyzer,
            pool,
            jobs,
            blocks: FxHashMap::default(),
            pending: Vec::new(),
            summary: ReplaySummary::default(),
        })
    }

    #[must_use]
    pub const fn summary(&self) -> ReplaySummary {
        self.summary
    }

    /// Replay a whole log. `progress` is called periodically with the
    /// running totals.
    pub fn replay<R: BufRead>(
        &mut self,
        reader: R,
        mut progress: impl FnMut(&ReplaySummary),
    ) -> Result<ReplaySummary, ReplayError> {
        let mut parser = LogParser::new(reader);
        let mut events = 0u64;

        while let Some(event) = parser.next() {
            match event? {
                LogEvent::Block(insns) => self.translate(insns),
                LogEvent::Exec { cpu, pc } => self.exec(cpu, pc),
            }
            events += 1;
            if events % (MAX_BATCH as u64) == 0 {
                self.summary.lines = parser.line_no();
                progress(&self.summary);
            }
        }
        self.flush();
        self.summary.lines = parser.line_no();
        progress(&self.summary);

        if self.summary.untranslated > 0 {
            warn!(
                skipped = self.summary.untranslated,
                "executions of untranslated blocks were skipped (was the log captured with in_asm?)"
            );
        }
        Ok(self.summary)
    }

    /// Handle one block translation.
    pub fn translate(&mut self, insns: Vec<GuestInsn>) {
        // Executions logged before this translation must see the old
        // loop-start set.
        self.flush();

        let mut block = RecordedBlock::new(insns);
        let Some(start) = block.start() else {
            return;
        };
        self.analyzer.translate_block(&mut block);
        self.summary.blocks += 1;
        if self.blocks.insert(start, block).is_some() {
            debug!(start = format!("{start:#x}"), "block retranslated");
        }
    }

    /// Queue one block execution.
    pub fn exec(&mut self, cpu: u32, pc: u64) {
        self.pending.push((cpu, pc));
        if self.pending.len() >= MAX_BATCH {
            self.flush();
        }
    }

    /// Deliver all queued executions to the analyzer.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        self.summary.block_execs += pending.len() as u64;

        let insn_execs = AtomicU64::new(0);
        let untranslated = AtomicU64::new(0);
        let run = |pcs: &[u64]| {
            let mut fired = 0u64;
            let mut missing = 0u64;
            for pc in pcs {
                match self.blocks.get(pc) {
                    Some(block) => {
                        for probe in block.probes() {
                            self.analyzer.fire(probe);
                            fired += 1;
                        }
                    }
                    None => missing += 1,
                }
            }
            insn_execs.fetch_add(fired, Ordering::Relaxed);
            untranslated.fetch_add(missing, Ordering::Relaxed);
        };

        if self.jobs == 1 {
            let pcs: Vec<u64> = pending.iter().map(|&(_, pc)| pc).collect();
            run(pcs.as_slice());
        } else {
            let mut per_cpu: FxHashMap<u32, Vec<u64>> = FxHashMap::default();
            for (cpu, pc) in pending {
                per_cpu.entry(cpu).or_default().push(pc);
            }
            let streams: Vec<Vec<u64>> = per_cpu.into_values().collect();
            self.pool
                .install(|| streams.par_iter().for_each(|pcs| run(pcs.as_slice())));
        }

        self.summary.insn_execs += insn_execs.into_inner();
        self.summary.untranslated += untranslated.into_inner();
    }
}

/// Replay the log at `path` into `analyzer`.
pub fn replay_file(
    analyzer: Arc<Analyzer>,
    path: &Path,
    jobs: usize,
    progress: impl FnMut(&ReplaySummary),
) -> Result<ReplaySummary, ReplayError> {
    let reader = open_log(path)?;
    let mut replayer = Replayer::new(analyzer, jobs)?;
    replayer.replay(reader, progress)
}
