//! Replay command.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use rvloop::replay::{self, ReplaySummary};
use rvloop::{Analyzer, AnalyzerConfig};
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Spinner};

/// Handle the `replay` command.
pub fn cmd_replay(
    log: &Path,
    config: AnalyzerConfig,
    jobs: usize,
    output: Option<&Path>,
    silent: bool,
) -> i32 {
    let analyzer = Arc::new(Analyzer::new(config));

    let spinner = if silent {
        Spinner::hidden()
    } else {
        Spinner::new(format!("Replaying {}", log.display()))
    };
    let progress = |s: &ReplaySummary| {
        spinner.set_message(format!(
            "Replaying {} ({} lines, {} blocks, {} instructions executed)",
            log.display(),
            s.lines,
            s.blocks,
            s.insn_execs
        ));
    };

    let summary = match replay::replay_file(Arc::clone(&analyzer), log, jobs, progress) {
        Ok(summary) => summary,
        Err(e) => {
            spinner.finish_with_failure("Replay failed");
            error!(error = %e, path = %log.display(), "failed to replay log");
            return EXIT_FAILURE;
        }
    };
    spinner.finish_with_success(&format!(
        "Replayed {} blocks, {} block executions",
        summary.blocks, summary.block_execs
    ));

    let mut out: Box<dyn Write> = match output {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to create report file");
                return EXIT_FAILURE;
            }
        },
        None => Box::new(io::stdout().lock()),
    };

    match analyzer.shutdown(&mut out) {
        Ok(_) => {
            if !silent {
                if let Some(path) = output {
                    terminal::path_output(path);
                }
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to write report");
            EXIT_FAILURE
        }
    }
}
