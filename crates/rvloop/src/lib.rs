//! rvloop - dynamic execution analysis for RISC-V guests.
//!
//! Counts how often every guest instruction executes and discovers loops
//! from backward conditional branches found in the disassembly of each
//! translated block. Counts are reported once, when the run ends.
//!
//! The [`Analyzer`] is host-agnostic: anything that can hand it translated
//! blocks through [`TranslatedBlock`] and fire the returned probes can drive
//! it. Two hosts ship with the project: the offline QEMU log [`replay`]er in
//! this crate and the `rvloop-qemu` TCG plugin.
//!
//! # Example
//!
//! ```
//! use rvloop::{Analyzer, GuestInsn, RecordedBlock};
//!
//! let analyzer = Analyzer::with_defaults();
//! let mut block = RecordedBlock::new(vec![
//!     GuestInsn::new(0xff8, "addi a0,a0,1"),
//!     GuestInsn::new(0xffc, "beq a0,a1,-4  # 0xff8"),
//! ]);
//! analyzer.translate_block(&mut block);
//!
//! for _ in 0..3 {
//!     for probe in block.probes() {
//!         analyzer.fire(probe);
//!     }
//! }
//!
//! assert_eq!(analyzer.execution_count(0xffc), Some(3));
//! assert_eq!(analyzer.loop_iterations(0xff8), Some(3));
//! ```

mod analyzer;
mod config;
mod error;
mod host;
pub mod metrics;
pub mod replay;
mod report;
mod stats;

pub use analyzer::Analyzer;
pub use config::AnalyzerConfig;
pub use error::{ConfigError, Error, Result};
pub use host::{ExecProbe, GuestInsn, RecordedBlock, TranslatedBlock};
pub use report::{Report, ReportFormat};
pub use stats::{AnalyzerStats, StatsSnapshot};

pub use rvloop_disasm::{
    BranchClassifier, BranchCond, Classification, LoopEdge, MnemonicMatch, TargetError,
    branch_target,
};
pub use rvloop_state::DEFAULT_SHARDS;
