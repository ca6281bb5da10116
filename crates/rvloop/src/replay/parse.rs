//! QEMU `-d in_asm,exec,nochain` log parsing.
//!
//! Two record kinds matter:
//!
//! ```text
//! IN: main
//! 0x0000000000010078:  00000517          auipc                   a0,0                    # 0x10078
//! 0x000000000001007c:  fe051ce3          bnez                    a0,-8                   # 0x10074
//!
//! Trace 0: 0x7f1c14000100 [00000000/0000000000010078/00000000/ff000000] main
//! ```
//!
//! An `IN:` section lists a freshly translated block; a `Trace` line is one
//! execution of the block starting at the bracketed pc. Everything else in
//! the log is ignored.

use std::io::BufRead;
use std::sync::OnceLock;

use regex::Regex;

use super::ReplayError;
use crate::host::GuestInsn;

/// One relevant record from the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEvent {
    /// A translated block, in program order.
    Block(Vec<GuestInsn>),
    /// One execution of the block starting at `pc` on vCPU `cpu`.
    Exec { cpu: u32, pc: u64 },
}

static INSN_PATTERN: OnceLock<Regex> = OnceLock::new();
static EXEC_PATTERN: OnceLock<Regex> = OnceLock::new();

fn insn_pattern() -> &'static Regex {
    INSN_PATTERN.get_or_init(|| {
        Regex::new(r"^0x([0-9a-fA-F]+):\s+(?:[0-9a-fA-F]{4,8}\s+)?(\S.*?)\s*$")
            .expect("valid instruction regex")
    })
}

fn exec_pattern() -> &'static Regex {
    EXEC_PATTERN.get_or_init(|| {
        Regex::new(r"^Trace\s+(\d+):\s+0x[0-9a-fA-F]+\s+\[[0-9a-fA-F]+/([0-9a-fA-F]+)/")
            .expect("valid exec regex")
    })
}

/// Parse one `0x<addr>:  <bytes>  <disas>` line.
///
/// Returns `None` if the line does not look like an instruction at all, and
/// an error message if it does but cannot be parsed.
pub fn parse_insn_line(line: &str) -> Option<Result<GuestInsn, String>> {
    if !line.starts_with("0x") {
        return None;
    }
    let Some(caps) = insn_pattern().captures(line) else {
        return Some(Err(format!("malformed instruction line '{line}'")));
    };
    let vaddr = match u64::from_str_radix(&caps[1], 16) {
        Ok(vaddr) => vaddr,
        Err(e) => return Some(Err(format!("bad address '{}': {e}", &caps[1]))),
    };
    Some(Ok(GuestInsn::new(vaddr, &caps[2])))
}

/// Parse a `Trace <cpu>: <ptr> [<cs_base>/<pc>/...]` line.
#[must_use]
pub fn parse_exec_line(line: &str) -> Option<(u32, u64)> {
    let caps = exec_pattern().captures(line)?;
    let cpu = caps[1].parse().ok()?;
    let pc = u64::from_str_radix(&caps[2], 16).ok()?;
    Some((cpu, pc))
}

/// Streaming parser over a QEMU log.
pub struct LogParser<R> {
    reader: R,
    line_no: usize,
    buf: String,
    /// Instructions of the `IN:` section being read, if any.
    block: Option<Vec<GuestInsn>>,
    /// Exec line that terminated a section, returned on the next call.
    deferred: Option<LogEvent>,
}

impl<R: BufRead> LogParser<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
            block: None,
            deferred: None,
        }
    }

    /// Lines consumed so far.
    pub const fn line_no(&self) -> usize {
        self.line_no
    }

    fn next_event(&mut self) -> Result<Option<LogEvent>, ReplayError> {
        if let Some(event) = self.deferred.take() {
            return Ok(Some(event));
        }

        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_line(&mut self.buf)
                .map_err(|source| ReplayError::Read {
                    line: self.line_no + 1,
                    source,
                })?;
            if read == 0 {
                return Ok(close_block(&mut self.block));
            }
            self.line_no += 1;
            let line = self.buf.trim_end_matches(['\n', '\r']);

            if line.starts_with("IN:") {
                let previous = close_block(&mut self.block);
                self.block = Some(Vec::new());
                if previous.is_some() {
                    return Ok(previous);
                }
                continue;
            }

            if let Some(insns) = self.block.as_mut() {
                match parse_insn_line(line) {
                    Some(Ok(insn)) => {
                        insns.push(insn);
                        continue;
                    }
                    Some(Err(message)) => {
                        return Err(ReplayError::Parse {
                            line: self.line_no,
                            message,
                        });
                    }
                    // Target-specific header lines ("Priv: 3; Virt: 0") precede
                    // the instructions.
                    None if insns.is_empty() && !line.trim().is_empty() => continue,
                    None => {}
                }
                let block = close_block(&mut self.block);
                if let Some((cpu, pc)) = parse_exec_line(line) {
                    let exec = LogEvent::Exec { cpu, pc };
                    if block.is_some() {
                        self.deferred = Some(exec);
                        return Ok(block);
                    }
                    return Ok(Some(exec));
                }
                if block.is_some() {
                    return Ok(block);
                }
                continue;
            }

            if let Some((cpu, pc)) = parse_exec_line(line) {
                return Ok(Some(LogEvent::Exec { cpu, pc }));
            }
        }
    }
}

/// End the current section, yielding it if it has instructions.
fn close_block(block: &mut Option<Vec<GuestInsn>>) -> Option<LogEvent> {
    block
        .take()
        .filter(|insns| !insns.is_empty())
        .map(LogEvent::Block)
}

impl<R: BufRead> Iterator for LogParser<R> {
    type Item = Result<LogEvent, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
