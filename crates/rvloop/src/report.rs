//! Final report rendering.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::stats::StatsSnapshot;

/// Report output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// `kind address count` lines for scripting.
    Raw,
    /// Single JSON object.
    Json,
}

impl ReportFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Raw => "raw",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "raw" => Ok(Self::Raw),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{other}' (expected text, raw or json)")),
        }
    }
}

/// Counts collected during one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// `(loop start, iterations)`, sorted by address.
    pub loops: Vec<(u64, u64)>,
    /// `(address, executions)`, sorted by address.
    pub instructions: Vec<(u64, u64)>,
    /// Distinct loop start addresses discovered.
    pub loop_starts: usize,
    /// Distinct loop end addresses discovered.
    pub loop_ends: usize,
    pub stats: StatsSnapshot,
}

impl Report {
    /// The `n` most executed instructions, hottest first (ties by address).
    #[must_use]
    pub fn hottest(&self, n: usize) -> Vec<(u64, u64)> {
        let mut sorted = self.instructions.clone();
        sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        sorted.truncate(n);
        sorted
    }

    /// Total dynamic instruction count.
    #[must_use]
    pub fn total_executions(&self) -> u64 {
        self.instructions.iter().map(|&(_, count)| count).sum()
    }

    /// Write the report. With `top`, only the hottest instructions are listed.
    pub fn write<W: Write + ?Sized>(
        &self,
        out: &mut W,
        format: ReportFormat,
        top: Option<usize>,
    ) -> io::Result<()> {
        let hottest;
        let instructions = match top {
            Some(n) => {
                hottest = self.hottest(n);
                &hottest
            }
            None => &self.instructions,
        };

        match format {
            ReportFormat::Text => self.write_text(out, instructions),
            ReportFormat::Raw => self.write_raw(out, instructions),
            ReportFormat::Json => self.write_json(out, instructions),
        }
    }

    /// Render to a string.
    #[must_use]
    pub fn render(&self, format: ReportFormat, top: Option<usize>) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut buf, format, top);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn write_text<W: Write + ?Sized>(&self, out: &mut W, instructions: &[(u64, u64)]) -> io::Result<()> {
        for &(addr, count) in &self.loops {
            writeln!(out, "Loop at {addr:#x} executed {count} times")?;
        }
        for &(addr, count) in instructions {
            writeln!(out, "Instruction at {addr:#x} executed {count} times")?;
        }
        let s = &self.stats;
        writeln!(
            out,
            "Summary: {} instructions executed {} times, {} loops ({} latches), {} blocks translated, {} of {} branch targets unresolved",
            self.instructions.len(),
            self.total_executions(),
            self.loop_starts,
            self.loop_ends,
            s.blocks,
            s.unresolved,
            s.branches
        )
    }

    fn write_raw<W: Write + ?Sized>(&self, out: &mut W, instructions: &[(u64, u64)]) -> io::Result<()> {
        for &(addr, count) in &self.loops {
            writeln!(out, "loop {addr:#x} {count}")?;
        }
        for &(addr, count) in instructions {
            writeln!(out, "insn {addr:#x} {count}")?;
        }
        let s = &self.stats;
        writeln!(out, "blocks: {}", s.blocks)?;
        writeln!(out, "branches: {}", s.branches)?;
        writeln!(out, "backward: {}", s.backward)?;
        writeln!(out, "forward: {}", s.forward)?;
        writeln!(out, "unresolved: {}", s.unresolved)
    }

    fn write_json<W: Write + ?Sized>(&self, out: &mut W, instructions: &[(u64, u64)]) -> io::Result<()> {
        let loops = self
            .loops
            .iter()
            .map(|(addr, count)| format!(r#"{{"addr":"{addr:#x}","iterations":{count}}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let insns = instructions
            .iter()
            .map(|(addr, count)| format!(r#"{{"addr":"{addr:#x}","executions":{count}}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let s = &self.stats;
        writeln!(
            out,
            r#"{{"loops":[{}],"instructions":[{}],"loop_starts":{},"loop_ends":{},"stats":{{"blocks":{},"instructions":{},"branches":{},"backward":{},"forward":{},"unresolved":{}}}}}"#,
            loops,
            insns,
            self.loop_starts,
            self.loop_ends,
            s.blocks,
            s.instructions,
            s.branches,
            s.backward,
            s.forward,
            s.unresolved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            loops: vec![(0xff8, 5)],
            instructions: vec![(0xff8, 5), (0xffc, 5), (0x1000, 5), (0x1004, 1)],
            loop_starts: 1,
            loop_ends: 1,
            stats: StatsSnapshot {
                blocks: 2,
                instructions: 4,
                branches: 1,
                backward: 1,
                forward: 0,
                unresolved: 0,
            },
        }
    }

    #[test]
    fn test_text_report_lines() {
        let text = sample().render(ReportFormat::Text, None);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"Loop at 0xff8 executed 5 times"));
        assert!(lines.contains(&"Instruction at 0x1000 executed 5 times"));
        assert!(lines.contains(&"Instruction at 0x1004 executed 1 times"));
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("Instruction at")).count(),
            4
        );
        assert!(lines.last().unwrap().starts_with("Summary: 4 instructions executed 16 times"));
    }

    #[test]
    fn test_raw_report() {
        let text = sample().render(ReportFormat::Raw, None);
        assert!(text.lines().any(|l| l == "loop 0xff8 5"));
        assert!(text.lines().any(|l| l == "insn 0x1004 1"));
        assert!(text.lines().any(|l| l == "backward: 1"));
    }

    #[test]
    fn test_json_report() {
        let text = sample().render(ReportFormat::Json, None);
        assert!(text.starts_with(r#"{"loops":[{"addr":"0xff8","iterations":5}]"#));
        assert!(text.contains(r#"{"addr":"0x1004","executions":1}"#));
        assert!(text.trim_end().ends_with("}}"));
    }

    #[test]
    fn test_top_limits_instructions() {
        let text = sample().render(ReportFormat::Raw, Some(2));
        let insns: Vec<&str> = text.lines().filter(|l| l.starts_with("insn")).collect();
        assert_eq!(insns, vec!["insn 0xff8 5", "insn 0xffc 5"]);
        // Loops are never truncated.
        assert!(text.lines().any(|l| l == "loop 0xff8 5"));
    }

    #[test]
    fn test_hottest_orders_by_count() {
        let mut report = sample();
        report.instructions.push((0x2000, 9));
        assert_eq!(report.hottest(2), vec![(0x2000, 9), (0xff8, 5)]);
    }

    #[test]
    fn test_empty_report() {
        let text = Report::default().render(ReportFormat::Text, None);
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("Summary: 0 instructions"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
