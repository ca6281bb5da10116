//! Analyzer configuration.

use rvloop_disasm::MnemonicMatch;
use rvloop_state::DEFAULT_SHARDS;

use crate::error::ConfigError;
use crate::report::ReportFormat;

/// Analyzer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// How branch mnemonics are recognized.
    pub mnemonic_match: MnemonicMatch,
    /// Lock shards per map (rounded up to a power of two).
    pub shards: usize,
    /// Log `<address>: <disassembly>` for every instrumented instruction.
    pub log_disassembly: bool,
    /// Report output format.
    pub report_format: ReportFormat,
    /// Only report the N most executed instructions.
    pub top: Option<usize>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            mnemonic_match: MnemonicMatch::Exact,
            shards: DEFAULT_SHARDS,
            log_disassembly: false,
            report_format: ReportFormat::Text,
            top: None,
        }
    }
}

impl AnalyzerConfig {
    #[must_use]
    pub const fn with_mnemonic_match(mut self, mode: MnemonicMatch) -> Self {
        self.mnemonic_match = mode;
        self
    }

    #[must_use]
    pub const fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    #[must_use]
    pub const fn with_disassembly_log(mut self, enabled: bool) -> Self {
        self.log_disassembly = enabled;
        self
    }

    #[must_use]
    pub const fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    #[must_use]
    pub const fn with_top(mut self, top: Option<usize>) -> Self {
        self.top = top;
        self
    }

    /// Apply one `key=value` option, as passed on a plugin command line.
    ///
    /// Recognized keys: `match`, `shards`, `disas`, `report`, `top`.
    pub fn apply_option(&mut self, option: &str) -> Result<(), ConfigError> {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| ConfigError::MissingValue(option.to_string()))?;
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };

        match key {
            "match" => {
                self.mnemonic_match = value.parse().map_err(|e| invalid(format!("{e}")))?;
            }
            "shards" => {
                let shards: usize = value.parse().map_err(|e| invalid(format!("{e}")))?;
                if shards == 0 {
                    return Err(invalid("must be at least 1".to_string()));
                }
                self.shards = shards;
            }
            "disas" => {
                self.log_disassembly =
                    parse_bool(value).ok_or_else(|| invalid("expected on/off".to_string()))?;
            }
            "report" => {
                self.report_format = value.parse().map_err(|e| invalid(format!("{e}")))?;
            }
            "top" => {
                let top: usize = value.parse().map_err(|e| invalid(format!("{e}")))?;
                self.top = (top > 0).then_some(top);
            }
            _ => return Err(ConfigError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    /// Build a configuration from a list of `key=value` options.
    pub fn from_options<'a>(
        options: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for option in options {
            config.apply_option(option)?;
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
