//! Conditional branch classification for RISC-V disassembly text.
//!
//! The instrumentation engine hands us one line of disassembly per guest
//! instruction. This crate decides whether that line is a conditional branch,
//! recovers its target from the `# <target>` annotation, and reports backward
//! branches as loop edges.
//!
//! ```
//! use rvloop_disasm::{BranchClassifier, LoopEdge};
//!
//! let classifier = BranchClassifier::default();
//! let result = classifier.classify(0x1000, "beq  a0,a1,-8  # 0xff8");
//! assert_eq!(result.loop_edge(), Some(LoopEdge { start: 0xff8, end: 0x1000 }));
//! ```

mod classify;
mod mnemonic;
mod target;

pub use classify::{BranchClassifier, Classification, LoopEdge};
pub use mnemonic::{BRANCHES, BranchCond, BranchInfo, MnemonicMatch, UnknownMatchMode, match_branch};
pub use target::{TargetError, branch_target};
