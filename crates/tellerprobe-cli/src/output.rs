//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tellerprobe::{Counts, ScenarioReport, SuiteReport, Verdict};

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Progress reporter for suite execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
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
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Spin while the runner works; it reports only once the suite ends
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(spinner);
    }

    /// Clear the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("✓", "PASS", Style::new().green().bold()), message);
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        self.line(&self.prefix("✗", "FAIL", Style::new().red().bold()), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("⚠", "WARN", Style::new().yellow().bold()), message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefix("ℹ", "INFO", Style::new().blue().bold()), message);
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

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// One line per scenario, in plan order
    pub fn scenario(&self, report: &ScenarioReport) {
        let message = scenario_line(report);
        match report.verdict {
            Verdict::Pass => self.success(&message),
            Verdict::Fail => self.failure(&message),
            Verdict::Skip => self.warning(&message),
        }
    }

    /// Per-scenario lines, malformed rows, then the totals
    pub fn suite(&self, report: &SuiteReport) {
        self.header(&report.suite_name);
        for scenario in &report.scenarios {
            self.scenario(scenario);
        }
        for row in &report.malformed {
            self.warning(&format!("row {} ({}): {}", row.index, row.label, row.reason));
        }
        self.summary(&report.counts, report.duration);
    }

    /// Print suite totals
    pub fn summary(&self, counts: &Counts, duration: Duration) {
        if self.quiet && counts.failed == 0 {
            return;
        }

        let _ = self.term.write_line("");

        let total = counts.total();
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();

            let status = if counts.failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            let _ = self.term.write_line(&format!(
                "{} {} scenarios in {:.2}s ({} passed, {} failed, {} skipped)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(counts.passed),
                if counts.failed > 0 {
                    failed_style.apply_to(counts.failed).to_string()
                } else {
                    counts.failed.to_string()
                },
                skipped_style.apply_to(counts.skipped)
            ));
        } else {
            let _ = self.term.write_line(&summary_line(counts, duration));
        }
    }

    fn prefix(&self, symbol: &str, plain: &str, paint: Style) -> String {
        if self.use_color {
            paint.apply_to(symbol).to_string()
        } else {
            plain.to_string()
        }
    }

    fn line(&self, prefix: &str, message: &str) {
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

/// `name (kind) [attempts] - reason` for one scenario
#[must_use]
pub fn scenario_line(report: &ScenarioReport) -> String {
    let mut line = format!("{} ({})", report.name, report.kind.label());
    if report.attempts > 1 {
        line.push_str(&format!(" after {} attempts", report.attempts));
    }
    line.push_str(&format!(" in {:.2}s", report.duration.as_secs_f64()));
    if let Some(reason) = &report.reason {
        line.push_str(" - ");
        line.push_str(reason);
    }
    for artifact in &report.artifacts {
        line.push_str(&format!("\n    screenshot: {}", artifact.display()));
    }
    line
}

/// Uncolored totals line
#[must_use]
pub fn summary_line(counts: &Counts, duration: Duration) -> String {
    let total = counts.total();
    let status = if counts.failed > 0 { "FAILED" } else { "PASSED" };
    format!(
        "{status} {total} scenarios in {:.2}s ({} passed, {} failed, {} skipped)",
        duration.as_secs_f64(),
        counts.passed,
        counts.failed,
        counts.skipped
    )
}
