//! Classify command: run the branch classifier on one instruction.

use rvloop::{BranchClassifier, Classification, MnemonicMatch};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `classify` command.
pub fn cmd_classify(addr: u64, disas: &str, mode: MnemonicMatch) -> i32 {
    let classifier = BranchClassifier::new(mode);
    match classifier.classify(addr, disas) {
        Classification::NotBranch => {
            println!("{addr:#x}: not a conditional branch");
            EXIT_SUCCESS
        }
        Classification::Forward { cond, target } => {
            println!("{addr:#x}: {cond} forward to {target:#x}");
            EXIT_SUCCESS
        }
        Classification::Backward { cond, edge } => {
            println!(
                "{addr:#x}: {cond} backward to {:#x}, loop start {:#x}, end {:#x}",
                edge.start, edge.start, edge.end
            );
            EXIT_SUCCESS
        }
        Classification::Unresolved { cond, error } => {
            println!("{addr:#x}: {cond} with unresolved target ({error})");
            EXIT_FAILURE
        }
    }
}
