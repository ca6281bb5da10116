//! Execution callbacks fired from many threads at once.

use std::sync::Arc;

use rayon::prelude::*;
use rvloop::{Analyzer, AnalyzerConfig, GuestInsn, RecordedBlock};

fn loop_block(base: u64) -> RecordedBlock {
    RecordedBlock::new(vec![
        GuestInsn::new(base, "addi a0,a0,-1"),
        GuestInsn::new(base + 4, "add a1,a1,a2"),
        GuestInsn::new(base + 8, format!("bnez a0,-8  # {base:#x}")),
    ])
}

#[test]
fn parallel_probes_lose_no_updates() {
    let analyzer = Arc::new(Analyzer::new(AnalyzerConfig::default().with_shards(4)));
    let mut block = loop_block(0x8000_0000);
    analyzer.translate_block(&mut block);

    let threads = 8u64;
    let rounds = 10_000u64;
    (0..threads).into_par_iter().for_each(|_| {
        for _ in 0..rounds {
            for probe in block.probes() {
                analyzer.fire(probe);
            }
        }
    });

    let total = threads * rounds;
    assert_eq!(analyzer.execution_count(0x8000_0000), Some(total));
    assert_eq!(analyzer.execution_count(0x8000_0008), Some(total));
    assert_eq!(analyzer.loop_iterations(0x8000_0000), Some(total));
}

#[test]
fn concurrent_translation_and_execution() {
    let analyzer = Arc::new(Analyzer::with_defaults());
    let bases: Vec<u64> = (0..64u64).map(|i| 0x1_0000 + i * 0x100).collect();

    bases.par_iter().for_each(|&base| {
        let mut block = loop_block(base);
        analyzer.translate_block(&mut block);
        for _ in 0..100 {
            for probe in block.probes() {
                analyzer.fire(probe);
            }
        }
        // Lookup path used by hosts that only pass the address.
        analyzer.record_execution(base + 4);
    });

    let report = analyzer.report();
    assert_eq!(report.loop_starts, 64);
    assert_eq!(report.loops.len(), 64);
    for &base in &bases {
        assert_eq!(analyzer.execution_count(base), Some(100));
        assert_eq!(analyzer.execution_count(base + 4), Some(101));
        assert_eq!(analyzer.loop_iterations(base), Some(100));
    }
}
