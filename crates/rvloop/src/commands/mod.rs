//! Command implementations.

mod classify;
mod replay;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Replay { .. } => handle_replay(cli),
        Commands::Classify { .. } => handle_classify(cli),
    }
}

fn handle_replay(cli: &Cli) -> i32 {
    let Commands::Replay {
        log,
        mnemonic_match,
        shards,
        jobs,
        format,
        top,
        disas,
        output,
    } = &cli.command
    else {
        unreachable!("replay command variant mismatch");
    };

    let config = rvloop::AnalyzerConfig::default()
        .with_mnemonic_match((*mnemonic_match).into())
        .with_shards(*shards)
        .with_disassembly_log(*disas)
        .with_report_format((*format).into())
        .with_top(top.filter(|&n| n > 0));

    replay::cmd_replay(log, config, *jobs, output.as_deref(), cli.silent)
}

fn handle_classify(cli: &Cli) -> i32 {
    let Commands::Classify {
        addr,
        disas,
        mnemonic_match,
    } = &cli.command
    else {
        unreachable!("classify command variant mismatch");
    };

    classify::cmd_classify(*addr, disas, (*mnemonic_match).into())
}
