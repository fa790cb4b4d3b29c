//! Reporting sink: per-scenario verdicts, step logs and artifacts, rendered
//! as JSON, HTML and JUnit XML.
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │  FailureMode::       │     │  FailureMode::       │
//! │  CollectAll          │     │  FailFast            │
//! │                      │     │                      │
//! │  run every scenario  │     │  stop dispatching    │
//! │  (default)           │     │  after the first FAIL│
//! └──────────────────────┘     └──────────────────────┘
//! ```

use crate::result::{ProbeError, ProbeResult};
use crate::scenario::{MalformedRow, ScenarioKind, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do after a failed scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Run everything and report all failures
    #[default]
    CollectAll,
    /// Stop after the first failure
    FailFast,
}

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Position of the row in the data file
    pub index: usize,
    /// Display name
    pub name: String,
    /// Scenario kind
    pub kind: ScenarioKind,
    /// Terminal verdict
    pub verdict: Verdict,
    /// Why it failed or was skipped
    pub reason: Option<String>,
    /// Steps taken, in order
    pub steps: Vec<String>,
    /// Diagnostic screenshots
    pub artifacts: Vec<PathBuf>,
    /// Runs made, retries included
    pub attempts: u32,
    /// Wall time of the last run
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// When the scenario finished
    pub timestamp: DateTime<Utc>,
}

impl ScenarioReport {
    fn new(index: usize, name: impl Into<String>, kind: ScenarioKind, verdict: Verdict) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
            verdict,
            reason: None,
            steps: Vec::new(),
            artifacts: Vec::new(),
            attempts: 1,
            duration: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// A passing scenario
    #[must_use]
    pub fn passed(index: usize, name: impl Into<String>, kind: ScenarioKind, duration: Duration) -> Self {
        Self {
            duration,
            ..Self::new(index, name, kind, Verdict::Pass)
        }
    }

    /// A failing scenario
    #[must_use]
    pub fn failed(
        index: usize,
        name: impl Into<String>,
        kind: ScenarioKind,
        duration: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            duration,
            reason: Some(reason.into()),
            ..Self::new(index, name, kind, Verdict::Fail)
        }
    }

    /// A skipped scenario
    #[must_use]
    pub fn skipped(index: usize, name: impl Into<String>, kind: ScenarioKind, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(index, name, kind, Verdict::Skip)
        }
    }

    /// Attach the step log
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    /// Attach diagnostic screenshots
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Record the number of runs
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Verdict tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Passed scenarios
    pub passed: usize,
    /// Failed scenarios
    pub failed: usize,
    /// Skipped scenarios
    pub skipped: usize,
}

impl Counts {
    /// All scenarios
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Share of executed (not skipped) scenarios that passed
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        let executed = self.passed + self.failed;
        if executed == 0 {
            return 1.0;
        }
        self.passed as f64 / executed as f64
    }
}

// =============================================================================
// COLLECTOR
// =============================================================================

/// Collects scenario outcomes as they finish
#[derive(Debug, Default)]
pub struct Reporter {
    results: Vec<ScenarioReport>,
    failure_mode: FailureMode,
    suite_name: String,
    started: Option<DateTime<Utc>>,
}

impl Reporter {
    /// Reporter that collects everything
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(FailureMode::CollectAll)
    }

    /// Reporter with the given failure mode
    #[must_use]
    pub fn with_mode(failure_mode: FailureMode) -> Self {
        Self {
            failure_mode,
            suite_name: "tellerprobe".to_string(),
            ..Self::default()
        }
    }

    /// Set the suite name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    /// Mark the start of the run
    pub fn start(&mut self) {
        self.started = Some(Utc::now());
    }

    /// Record an outcome
    ///
    /// # Errors
    ///
    /// In fail-fast mode, returns [`ProbeError::AssertionFailed`] for a
    /// failed scenario; the outcome is recorded either way
    pub fn record(&mut self, report: ScenarioReport) -> ProbeResult<()> {
        let failure = (report.verdict == Verdict::Fail).then(|| {
            format!(
                "scenario '{}' failed: {}",
                report.name,
                report.reason.clone().unwrap_or_default()
            )
        });
        self.results.push(report);
        match failure {
            Some(message) if self.failure_mode == FailureMode::FailFast => {
                Err(ProbeError::AssertionFailed { message })
            }
            _ => Ok(()),
        }
    }

    /// Outcomes recorded so far
    #[must_use]
    pub fn results(&self) -> &[ScenarioReport] {
        &self.results
    }

    /// Failure mode in effect
    #[must_use]
    pub const fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Finish the run; outcomes are ordered by data row
    #[must_use]
    pub fn finish(mut self, malformed: Vec<MalformedRow>) -> SuiteReport {
        self.results.sort_by_key(|r| r.index);
        let started = self.started.unwrap_or_else(Utc::now);
        let duration = (Utc::now() - started).to_std().unwrap_or_default();
        SuiteReport {
            suite_name: self.suite_name,
            counts: count(&self.results),
            started,
            duration,
            scenarios: self.results,
            malformed,
        }
    }
}

fn count(results: &[ScenarioReport]) -> Counts {
    results.iter().fold(Counts::default(), |mut counts, r| {
        match r.verdict {
            Verdict::Pass => counts.passed += 1,
            Verdict::Fail => counts.failed += 1,
            Verdict::Skip => counts.skipped += 1,
        }
        counts
    })
}

// =============================================================================
// SUITE REPORT
// =============================================================================

/// Finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite_name: String,
    /// Verdict tallies
    pub counts: Counts,
    /// When the run started
    pub started: DateTime<Utc>,
    /// Wall time of the run
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Outcomes ordered by data row
    pub scenarios: Vec<ScenarioReport>,
    /// Rows that never became scenarios
    pub malformed: Vec<MalformedRow>,
}

impl SuiteReport {
    /// Whether no scenario failed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.counts.failed == 0
    }

    /// Failed scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.scenarios
            .iter()
            .filter(|r| r.verdict == Verdict::Fail)
            .collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} skipped ({:.1}% of executed) in {:.2}s",
            self.suite_name,
            self.counts.passed,
            self.counts.failed,
            self.counts.skipped,
            self.counts.pass_rate() * 100.0,
            self.duration.as_secs_f64()
        )
    }

    /// Render as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn render_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as a standalone HTML page
    #[must_use]
    pub fn render_html(&self) -> String {
        let mut html = String::new();

        html.push_str(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Tellerprobe Report</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        .progress-bar { background: #ddd; height: 20px; border-radius: 10px; overflow: hidden; }
        .passed { background: #4caf50; height: 100%; }
        .scenario { padding: 10px; margin: 5px 0; border-radius: 4px; }
        .scenario.pass { background: #e8f5e9; border-left: 4px solid #4caf50; }
        .scenario.fail { background: #ffebee; border-left: 4px solid #f44336; }
        .scenario.skip { background: #fff3e0; border-left: 4px solid #ff9800; }
        .reason { color: #d32f2f; font-family: monospace; white-space: pre-wrap; }
        .steps { font-size: 0.9em; color: #555; }
    </style>
</head>
<body>
"#,
        );

        let _ = write!(
            html,
            r#"<div class="summary">
    <h1>{}</h1>
    <h2>{} passed, {} failed, {} skipped</h2>
    <div class="progress-bar">
        <div class="passed" style="width: {:.1}%"></div>
    </div>
    <p>Started {} &middot; {:.2}s</p>
</div>
"#,
            escape_xml(&self.suite_name),
            self.counts.passed,
            self.counts.failed,
            self.counts.skipped,
            self.counts.pass_rate() * 100.0,
            self.started.format("%Y-%m-%d %H:%M:%S UTC"),
            self.duration.as_secs_f64()
        );

        html.push_str("<h2>Scenarios</h2>\n");
        for result in &self.scenarios {
            let class = match result.verdict {
                Verdict::Pass => "pass",
                Verdict::Fail => "fail",
                Verdict::Skip => "skip",
            };
            let _ = writeln!(
                html,
                r#"<div class="scenario {class}">
    <strong>{}</strong> [{}] - {} ({:.2}ms, {} attempt(s))"#,
                escape_xml(&result.name),
                result.kind,
                result.verdict,
                result.duration.as_secs_f64() * 1000.0,
                result.attempts
            );
            if let Some(reason) = &result.reason {
                let _ = writeln!(html, r#"    <div class="reason">{}</div>"#, escape_xml(reason));
            }
            if !result.steps.is_empty() {
                html.push_str("    <ol class=\"steps\">\n");
                for step in &result.steps {
                    let _ = writeln!(html, "        <li>{}</li>", escape_xml(step));
                }
                html.push_str("    </ol>\n");
            }
            for artifact in &result.artifacts {
                let path = escape_xml(&artifact.display().to_string());
                let _ = writeln!(html, r#"    <a href="{path}">{path}</a>"#);
            }
            html.push_str("</div>\n");
        }

        if !self.malformed.is_empty() {
            html.push_str("<h2>Malformed rows</h2>\n<ul>\n");
            for row in &self.malformed {
                let _ = writeln!(
                    html,
                    "    <li>row {} ({}): {}</li>",
                    row.index + 1,
                    escape_xml(&row.label),
                    escape_xml(&row.reason)
                );
            }
            html.push_str("</ul>\n");
        }

        html.push_str(
            r"
<footer>
    <p>Generated by Tellerprobe</p>
</footer>
</body>
</html>
",
        );
        html
    }

    /// Render as JUnit XML for CI
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
            escape_xml(&self.suite_name),
            self.counts.total(),
            self.counts.failed,
            self.counts.skipped,
            self.duration.as_secs_f64(),
            self.started.format("%Y-%m-%dT%H:%M:%S")
        );

        for result in &self.scenarios {
            let _ = writeln!(
                xml,
                r#"  <testcase classname="{}" name="{}" time="{:.3}">"#,
                result.kind,
                escape_xml(&result.name),
                result.duration.as_secs_f64()
            );
            let reason = escape_xml(result.reason.as_deref().unwrap_or_default());
            match result.verdict {
                Verdict::Pass => {}
                Verdict::Fail => {
                    let _ = writeln!(xml, r#"    <failure message="{reason}">{reason}</failure>"#);
                }
                Verdict::Skip => {
                    let _ = writeln!(xml, r#"    <skipped message="{reason}"/>"#);
                }
            }
            if !result.steps.is_empty() || !result.artifacts.is_empty() {
                let mut out: Vec<String> = result.steps.clone();
                out.extend(result.artifacts.iter().map(|a| format!("artifact: {}", a.display())));
                let _ = writeln!(xml, "    <system-out>{}</system-out>", escape_xml(&out.join("\n")));
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write `report.json`, `report.html` and `junit.xml` into `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory or a file cannot be written
    pub fn write_all(&self, dir: &Path) -> ProbeResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let outputs = [
            ("report.json", self.render_json()?),
            ("report.html", self.render_html()),
            ("junit.xml", self.render_junit()),
        ];
        let mut written = Vec::with_capacity(outputs.len());
        for (file, content) in outputs {
            let path = dir.join(file);
            std::fs::write(&path, content)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
