//! Console output and progress reporting

use crate::config::Verbosity;
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use preflight::{CheckResult, MasterReport, Phase, ProgressObserver, StageResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Styled line printer with a stage spinner
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    bar: ProgressBar,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        let bar = if quiet || !use_color {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} stages {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        Self {
            term: Term::stderr(),
            bar,
            use_color,
            quiet,
        }
    }

    /// Update the spinner message
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Count one finished stage
    pub fn increment(&self) {
        self.bar.inc(1);
    }

    /// Stop the spinner
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn line(&self, text: &str) {
        self.bar.suspend(|| {
            let _ = self.term.write_line(text);
        });
    }

    fn glyph(&self, colored: console::StyledObject<&'static str>, plain: &str) -> String {
        if self.use_color {
            colored.to_string()
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.glyph(style("✓").green().bold(), "PASS");
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = self.glyph(style("✗").red().bold(), "FAIL");
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.glyph(style("⚠").yellow().bold(), "WARN");
        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.glyph(style("ℹ").blue().bold(), "INFO");
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        self.line("");
        self.line(&styled);
    }

    /// Print the final verdict banner
    pub fn banner(&self, report: &MasterReport) {
        self.line("");
        let summary = report.summary();
        if self.use_color {
            let verdict = if report.production_ready {
                Style::new().green().bold().apply_to(summary)
            } else {
                Style::new().red().bold().apply_to(summary)
            };
            self.line(&verdict.to_string());
        } else {
            self.line(&summary);
        }
        if self.quiet && report.production_ready {
            return;
        }
        for rec in &report.recommendations {
            self.line(&format!("  - {rec}"));
        }
    }
}

/// [`ProgressObserver`] printing to the terminal
#[derive(Debug)]
pub struct ConsoleObserver {
    reporter: ProgressReporter,
    verbosity: Verbosity,
    depth: AtomicUsize,
}

impl ConsoleObserver {
    /// Create an observer
    #[must_use]
    pub fn new(reporter: ProgressReporter, verbosity: Verbosity) -> Self {
        Self {
            reporter,
            verbosity,
            depth: AtomicUsize::new(0),
        }
    }

    /// Access the underlying reporter
    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth.load(Ordering::Relaxed))
    }
}

impl ProgressObserver for ConsoleObserver {
    fn on_phase(&self, phase: Phase) {
        self.reporter.set_message(phase.as_str());
        if matches!(phase, Phase::Done) {
            self.reporter.finish();
        }
    }

    fn on_stage_start(&self, stage: &str) {
        if self.depth.load(Ordering::Relaxed) == 0 {
            self.reporter.header(stage);
        } else if self.verbosity.is_verbose() {
            self.reporter.info(&format!("{}{stage}", self.indent()));
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    fn on_check(&self, stage: &str, check: &CheckResult) {
        let line = format!("{}{stage}/{check}", self.indent());
        if !check.passed {
            self.reporter.failure(&line);
        } else if self.verbosity.is_verbose() {
            self.reporter.success(&line);
        }
    }

    fn on_warning(&self, stage: &str, message: &str) {
        self.reporter
            .warning(&format!("{}{stage}: {message}", self.indent()));
    }

    fn on_stage_complete(&self, result: &StageResult) {
        let depth = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)))
            .unwrap_or_else(|d| d)
            .saturating_sub(1);
        self.reporter.increment();
        let pad = "  ".repeat(depth);
        let line = format!(
            "{pad}{}: {} passed, {} failed, {} warnings ({} ms)",
            result.stage_name,
            result.counts.passed,
            result.counts.failed,
            result.counts.warnings,
            result.duration_ms
        );
        if let Some(error) = &result.error {
            self.reporter
                .failure(&format!("{pad}{} crashed: {error}", result.stage_name));
        }
        if result.passed {
            self.reporter.success(&line);
        } else {
            self.reporter.failure(&line);
        }
    }

    fn on_report(&self, report: &MasterReport) {
        self.reporter.banner(report);
    }
}
