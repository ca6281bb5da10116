//! Loop-edge classification of a single instruction.

use crate::mnemonic::{BranchCond, MnemonicMatch, match_branch};
use crate::target::{TargetError, branch_target};

/// A backward conditional branch: `end` jumps back to `start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoopEdge {
    /// Branch target (loop head).
    pub start: u64,
    /// Address of the branch itself (loop latch).
    pub end: u64,
}

/// Outcome of classifying one instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Not a conditional branch.
    NotBranch,
    /// Conditional branch whose target could not be recovered.
    Unresolved { cond: BranchCond, error: TargetError },
    /// Target at or above the branch address.
    Forward { cond: BranchCond, target: u64 },
    /// Target strictly below the branch address.
    Backward { cond: BranchCond, edge: LoopEdge },
}

impl Classification {
    /// The loop edge, for backward branches.
    #[must_use]
    pub const fn loop_edge(&self) -> Option<LoopEdge> {
        match self {
            Self::Backward { edge, .. } => Some(*edge),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_branch(&self) -> bool {
        !matches!(self, Self::NotBranch)
    }
}

/// Classifies instructions by their disassembly text.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchClassifier {
    mode: MnemonicMatch,
}

impl BranchClassifier {
    #[must_use]
    pub const fn new(mode: MnemonicMatch) -> Self {
        Self { mode }
    }

    /// Classify the instruction at `vaddr`.
    #[must_use]
    pub fn classify(&self, vaddr: u64, disas: &str) -> Classification {
        let Some(info) = match_branch(disas, self.mode) else {
            return Classification::NotBranch;
        };
        let cond = info.cond;

        match branch_target(disas, vaddr) {
            Err(error) => Classification::Unresolved { cond, error },
            Ok(target) if target < vaddr => Classification::Backward {
                cond,
                edge: LoopEdge {
                    start: target,
                    end: vaddr,
                },
            },
            Ok(target) => Classification::Forward { cond, target },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_branch_is_loop_edge() {
        let classifier = BranchClassifier::default();
        let result = classifier.classify(0x1000, "beq  a0,a1,-8  # 0xff8");
        assert_eq!(
            result.loop_edge(),
            Some(LoopEdge {
                start: 0xff8,
                end: 0x1000
            })
        );
    }

    #[test]
    fn test_forward_branch() {
        let classifier = BranchClassifier::default();
        let result = classifier.classify(0x1010, "bne a0,a1,+16  # 0x1020");
        assert_eq!(
            result,
            Classification::Forward {
                cond: BranchCond::Ne,
                target: 0x1020
            }
        );
        assert_eq!(result.loop_edge(), None);
    }

    #[test]
    fn test_self_branch_is_not_backward() {
        let classifier = BranchClassifier::default();
        let result = classifier.classify(0x1000, "beq a0,a0,0  # 0x1000");
        assert!(matches!(result, Classification::Forward { target: 0x1000, .. }));
    }

    #[test]
    fn test_negative_annotation() {
        let classifier = BranchClassifier::default();
        let result = classifier.classify(0x2000, "bltu a2,a3,x # -0x20");
        assert_eq!(
            result.loop_edge(),
            Some(LoopEdge {
                start: 0x1fe0,
                end: 0x2000
            })
        );
    }

    #[test]
    fn test_unresolved_target() {
        let classifier = BranchClassifier::default();
        let result = classifier.classify(0x1000, "bge a0,a1,-8");
        assert_eq!(
            result,
            Classification::Unresolved {
                cond: BranchCond::Ge,
                error: TargetError::MissingMarker
            }
        );
        assert!(result.is_branch());
    }

    #[test]
    fn test_non_branch() {
        let classifier = BranchClassifier::default();
        let result = classifier.classify(0x1000, "addi a0,a0,-8  # 0xff8");
        assert_eq!(result, Classification::NotBranch);
        assert!(!result.is_branch());
    }

    #[test]
    fn test_prefix_mode_classifies_collisions() {
        let exact = BranchClassifier::new(MnemonicMatch::Exact);
        let prefix = BranchClassifier::new(MnemonicMatch::Prefix);
        let line = "bgeu.x a0,a1,-8  # 0xff8";
        assert_eq!(exact.classify(0x1000, line), Classification::NotBranch);
        assert!(prefix.classify(0x1000, line).loop_edge().is_some());
    }

    #[test]
    fn test_deterministic() {
        let classifier = BranchClassifier::default();
        let line = "blt a4,a5,-24  # 0x10e8";
        let first = classifier.classify(0x1100, line);
        for _ in 0..8 {
            assert_eq!(classifier.classify(0x1100, line), first);
        }
    }
}
