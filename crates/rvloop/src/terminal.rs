//! Terminal UI utilities for progress indication and styled output.

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner for indeterminate progress.
pub struct Spinner {
    bar: ProgressBar,
    /// `--silent`: draw nothing and print no status lines.
    quiet: bool,
}

impl Spinner {
    /// Create a new spinner with a message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.cyan} {msg}")
                .expect("valid spinner template"),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar, quiet: false }
    }

    /// A spinner that draws nothing, for `--silent`.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            quiet: true,
        }
    }

    /// Whether finishing prints a status line.
    pub const fn announces(&self) -> bool {
        !self.quiet
    }

    /// Update the spinner message.
    pub fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    /// Finish the spinner with a success message.
    pub fn finish_with_success(&self, message: &str) {
        self.bar.finish_and_clear();
        if self.announces() {
            eprintln!("{} {}", style("✓").green().bold(), message);
        }
    }

    /// Finish the spinner with a failure message.
    pub fn finish_with_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        if self.announces() {
            eprintln!("{} {}", style("✗").red().bold(), message);
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Print a path output (like "-> /path/to/file").
pub fn path_output(path: &Path) {
    eprintln!("  {} {}", style("→").dim(), style(path.display()).dim());
}
