//! Metrics collection and reporting using metrics-rs.
//!
//! Everything here is recorded at block translation or at shutdown, never
//! from the execution callback.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, gauge,
};
use parking_lot::RwLock;
use rvloop_disasm::Classification;

use crate::report::Report;

// ============================================================================
// Metric descriptions
// ============================================================================

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "rvloop_blocks_translated_total",
        Unit::Count,
        "Translated blocks instrumented"
    );
    describe_counter!(
        "rvloop_instructions_instrumented_total",
        Unit::Count,
        "Instructions given an execution probe"
    );
    describe_counter!(
        "rvloop_branches_total",
        Unit::Count,
        "Conditional branches classified"
    );
    describe_counter!(
        "rvloop_loop_edges_total",
        Unit::Count,
        "Backward conditional branches found"
    );
    describe_counter!(
        "rvloop_unresolved_targets_total",
        Unit::Count,
        "Conditional branches whose target could not be parsed"
    );
    describe_gauge!(
        "rvloop_reported_instructions",
        Unit::Count,
        "Distinct instruction addresses in the final report"
    );
    describe_gauge!(
        "rvloop_reported_loops",
        Unit::Count,
        "Loops with at least one counted iteration"
    );
}

// ============================================================================
// Metric recording functions
// ============================================================================

pub(crate) fn record_block(instructions: usize) {
    counter!("rvloop_blocks_translated_total").increment(1);
    counter!("rvloop_instructions_instrumented_total").increment(instructions as u64);
}

pub(crate) fn record_classification(classification: &Classification) {
    match classification {
        Classification::NotBranch => {}
        Classification::Unresolved { cond, .. } => {
            counter!("rvloop_branches_total", "cond" => cond.mnemonic()).increment(1);
            counter!("rvloop_unresolved_targets_total").increment(1);
        }
        Classification::Forward { cond, .. } => {
            counter!("rvloop_branches_total", "cond" => cond.mnemonic()).increment(1);
        }
        Classification::Backward { cond, .. } => {
            counter!("rvloop_branches_total", "cond" => cond.mnemonic()).increment(1);
            counter!("rvloop_loop_edges_total").increment(1);
        }
    }
}

pub(crate) fn record_report(report: &Report) {
    gauge!("rvloop_reported_instructions").set(report.instructions.len() as f64);
    gauge!("rvloop_reported_loops").set(report.loops.len() as f64);
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct CounterStorage {
    values: RwLock<HashMap<String, u64>>,
}

#[derive(Default)]
struct GaugeStorage {
    values: RwLock<HashMap<String, f64>>,
}

struct CliCounter {
    key: String,
    storage: Arc<CounterStorage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<GaugeStorage>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        *self
            .storage
            .values
            .write()
            .entry(self.key.clone())
            .or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self
            .storage
            .values
            .write()
            .entry(self.key.clone())
            .or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

/// In-memory recorder whose values are printed when the CLI exits.
#[derive(Default)]
pub struct CliRecorder {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. Returns `None` if one is already set.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let counters = Arc::clone(&self.counters);
        let gauges = Arc::clone(&self.gauges);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { counters, gauges })
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

/// Handle for reading metrics after installing the [`CliRecorder`].
pub struct CliRecorderHandle {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
}

impl CliRecorderHandle {
    #[must_use]
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.values.read().get(key).copied()
    }

    #[must_use]
    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.gauges.values.read().get(key).copied()
    }

    /// Print all collected metrics, sorted by key.
    pub fn print_summary(&self) {
        let counters = self.counters.values.read();
        let gauges = self.gauges.values.read();

        if counters.is_empty() && gauges.is_empty() {
            eprintln!("No metrics collected.");
            return;
        }

        eprintln!();
        eprintln!("## Metrics Summary");
        if !counters.is_empty() {
            eprintln!("### Counters");
            let mut entries: Vec<_> = counters.iter().collect();
            entries.sort();
            for (key, value) in entries {
                eprintln!("  {key}: {value}");
            }
        }
        if !gauges.is_empty() {
            eprintln!("### Gauges");
            let mut entries: Vec<_> = gauges.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                eprintln!("  {key}: {value}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::with_local_recorder;
    use rvloop_disasm::{BranchCond, LoopEdge};

    #[test]
    fn test_cli_recorder_counts() {
        let recorder = CliRecorder::new();
        let counters = Arc::clone(&recorder.counters);
        let handle = CliRecorderHandle {
            counters,
            gauges: Arc::clone(&recorder.gauges),
        };

        with_local_recorder(&recorder, || {
            record_block(3);
            record_block(2);
            record_classification(&Classification::Backward {
                cond: BranchCond::Eq,
                edge: LoopEdge {
                    start: 0xff8,
                    end: 0x1000,
                },
            });
            record_classification(&Classification::NotBranch);
        });

        assert_eq!(handle.get_counter("rvloop_blocks_translated_total"), Some(2));
        assert_eq!(handle.get_counter("rvloop_instructions_instrumented_total"), Some(5));
        assert_eq!(handle.get_counter("rvloop_loop_edges_total"), Some(1));
        assert_eq!(handle.get_counter("rvloop_branches_total{cond=beq}"), Some(1));
        assert_eq!(handle.get_counter("rvloop_unresolved_targets_total"), None);
    }

    #[test]
    fn test_cli_recorder_report_gauges() {
        let recorder = CliRecorder::new();
        let handle = CliRecorderHandle {
            counters: Arc::clone(&recorder.counters),
            gauges: Arc::clone(&recorder.gauges),
        };
        let report = Report {
            instructions: vec![(0x10, 1), (0x14, 2)],
            loops: vec![(0x10, 1)],
            ..Report::default()
        };

        with_local_recorder(&recorder, || record_report(&report));

        assert_eq!(handle.get_gauge("rvloop_reported_instructions"), Some(2.0));
        assert_eq!(handle.get_gauge("rvloop_reported_loops"), Some(1.0));
        assert_eq!(handle.get_gauge("rvloop_unknown"), None);
    }
}
