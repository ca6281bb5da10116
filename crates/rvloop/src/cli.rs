//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rvloop::{MnemonicMatch, ReportFormat};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "rvloop")]
#[command(about = "Count instruction executions and find loops in RISC-V guest runs")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a QEMU `-d in_asm,exec,nochain` log through the analyzer
    Replay {
        /// QEMU log file (`.zst` files are decompressed)
        #[arg(value_name = "LOG")]
        log: PathBuf,

        /// Branch mnemonic matching
        #[arg(long = "match", value_enum, default_value = "exact")]
        mnemonic_match: MatchArg,

        /// Lock shards per address map (rounded up to a power of two)
        #[arg(
            long,
            default_value_t = rvloop::DEFAULT_SHARDS,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        shards: usize,

        /// Number of replay threads (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: FormatArg,

        /// Only list the N most executed instructions
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Log every instrumented instruction with its disassembly
        #[arg(long)]
        disas: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Classify a single instruction
    Classify {
        /// Instruction address (hex, `0x` prefix optional)
        #[arg(value_name = "ADDR", value_parser = parse_hex_addr)]
        addr: u64,

        /// Disassembly text, e.g. "beq a0,a1,-8  # 0xff8"
        #[arg(value_name = "DISAS")]
        disas: String,

        /// Branch mnemonic matching
        #[arg(long = "match", value_enum, default_value = "exact")]
        mnemonic_match: MatchArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MatchArg {
    /// Whole mnemonic must equal a branch name (aliases included)
    Exact,
    /// Mnemonic only has to start with a base branch name
    Prefix,
}

impl From<MatchArg> for MnemonicMatch {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Exact => Self::Exact,
            MatchArg::Prefix => Self::Prefix,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    /// Human-readable lines
    Text,
    /// `kind address count` lines
    Raw,
    /// One JSON object
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Raw => Self::Raw,
            FormatArg::Json => Self::Json,
        }
    }
}

fn parse_hex_addr(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{s}': {e}"))
}
