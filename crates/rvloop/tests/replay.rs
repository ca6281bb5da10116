//! End-to-end replay of QEMU logs on disk.

use std::fs;
use std::sync::Arc;

use rvloop::replay::{self, ReplayError};
use rvloop::{Analyzer, AnalyzerConfig, Error, ReportFormat};

/// Countdown loop: `a0` from 3 to 0, then exit.
const COUNTDOWN_LOG: &str = "\
----------------
IN: _start
Priv: 3; Virt: 0
0x0000000000010000:  00300513          addi                    a0,zero,3

Trace 0: 0x7f0000000000 [00000000/0000000000010000/00000000/ff000000] _start
----------------
IN: _start
0x0000000000010004:  fff50513          addi                    a0,a0,-1
0x0000000000010008:  fe051ee3          bnez                    a0,-4                   # 0x10004

Trace 0: 0x7f0000000040 [00000000/0000000000010004/00000000/ff000000] _start
Trace 0: 0x7f0000000040 [00000000/0000000000010004/00000000/ff000000] _start
Trace 0: 0x7f0000000040 [00000000/0000000000010004/00000000/ff000000] _start
----------------
IN: _start
0x000000000001000c:  00000073          ecall

Trace 0: 0x7f0000000080 [00000000/000000000001000c/00000000/ff000000] _start
";

fn replay_path(path: &std::path::Path, config: AnalyzerConfig) -> Arc<Analyzer> {
    let analyzer = Arc::new(Analyzer::new(config));
    replay::replay_file(Arc::clone(&analyzer), path, 2, |_| {}).unwrap();
    analyzer
}

#[test]
fn replay_plain_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qemu.log");
    fs::write(&path, COUNTDOWN_LOG).unwrap();

    let analyzer = replay_path(&path, AnalyzerConfig::default());

    let mut out = Vec::new();
    let report = analyzer.shutdown(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(
        report.instructions,
        vec![(0x10000, 1), (0x10004, 3), (0x10008, 3), (0x1000c, 1)]
    );
    assert_eq!(report.loops, vec![(0x10004, 3)]);
    assert!(text.contains("Loop at 0x10004 executed 3 times\n"));
    assert!(text.contains("Instruction at 0x10008 executed 3 times\n"));
    assert!(text.contains("Instruction at 0x1000c executed 1 times\n"));
}

#[test]
fn replay_zstd_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qemu.log.zst");
    let compressed = zstd::encode_all(COUNTDOWN_LOG.as_bytes(), 3).unwrap();
    fs::write(&path, compressed).unwrap();

    let analyzer = replay_path(&path, AnalyzerConfig::default());
    assert_eq!(analyzer.execution_count(0x10004), Some(3));
    assert_eq!(analyzer.loop_iterations(0x10004), Some(3));
}

#[test]
fn replay_json_report_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("qemu.log");
    fs::write(&log, COUNTDOWN_LOG).unwrap();

    let config = AnalyzerConfig::default()
        .with_report_format(ReportFormat::Json)
        .with_top(Some(1));
    let analyzer = replay_path(&log, config);

    let report_path = dir.path().join("report.json");
    let mut file = fs::File::create(&report_path).unwrap();
    analyzer.shutdown(&mut file).unwrap();
    drop(file);

    let json = fs::read_to_string(&report_path).unwrap();
    assert!(json.starts_with(r#"{"loops":[{"addr":"0x10004","iterations":3}]"#));
    assert!(json.contains(r#""instructions":[{"addr":"0x10004","executions":3}]"#));
}

#[test]
fn shutdown_reports_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qemu.log");
    fs::write(&path, COUNTDOWN_LOG).unwrap();
    let analyzer = replay_path(&path, AnalyzerConfig::default());

    let mut first = Vec::new();
    analyzer.shutdown(&mut first).unwrap();
    let mut second = Vec::new();
    assert!(matches!(
        analyzer.shutdown(&mut second),
        Err(Error::AlreadyReported)
    ));
    assert!(!first.is_empty());
    assert!(second.is_empty());
}

#[test]
fn missing_log_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = replay::replay_file(
        Arc::new(Analyzer::with_defaults()),
        &dir.path().join("absent.log"),
        1,
        |_| {},
    )
    .unwrap_err();
    assert!(matches!(err, ReplayError::Open { .. }));
}
