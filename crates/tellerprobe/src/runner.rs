//! Scenario runner.
//!
//! Workers pull scenarios off a shared cursor. Each worker owns at most one
//! browser session at a time, kept in a thread-local slot at the worker
//! boundary and created lazily through the [`DriverFactory`]. A lost session
//! is discarded and the worker's next scenario opens a fresh one.

use crate::driver::DriverFactory;
use crate::engine::{Engine, EngineSettings};
use crate::reporter::{FailureMode, Reporter, ScenarioReport, SuiteReport};
use crate::result::ProbeError;
use crate::scenario::{Credentials, Scenario, ScenarioPlan, Verdict};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

thread_local! {
    static SESSION: RefCell<Option<Engine>> = const { RefCell::new(None) };
}

/// Runner options
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Parallel workers, each with its own session
    pub workers: usize,
    /// Continue or stop after a failure
    pub failure_mode: FailureMode,
    /// Account for scenarios that log in implicitly
    pub credentials: Credentials,
    /// Name shown in reports
    pub suite_name: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            failure_mode: FailureMode::CollectAll,
            credentials: Credentials::default(),
            suite_name: "tellerprobe".to_string(),
        }
    }
}

enum Outcome {
    Passed,
    Failed { reason: String, artifacts: Vec<PathBuf> },
    Skipped { reason: String, artifacts: Vec<PathBuf> },
}

/// Runs a [`ScenarioPlan`] and reports every scenario
pub struct ScenarioRunner<F> {
    factory: F,
    settings: EngineSettings,
    options: RunnerOptions,
}

impl<F> std::fmt::Debug for ScenarioRunner<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("settings", &self.settings)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<F: DriverFactory> ScenarioRunner<F> {
    /// Runner opening sessions through `factory`
    #[must_use]
    pub const fn new(factory: F, settings: EngineSettings, options: RunnerOptions) -> Self {
        Self {
            factory,
            settings,
            options,
        }
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run every scenario of `plan`. Every scenario ends up in the report
    /// with exactly one verdict; in fail-fast mode the ones never started are
    /// skipped.
    #[must_use]
    pub fn run(&self, plan: &ScenarioPlan) -> SuiteReport {
        let mut reporter = Reporter::with_mode(self.options.failure_mode).with_name(&self.options.suite_name);
        reporter.start();
        let reporter = Mutex::new(reporter);
        let cursor = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let workers = self.options.workers.clamp(1, plan.len().max(1));
        info!(scenarios = plan.len(), workers, "starting run");

        std::thread::scope(|scope| {
            for id in 0..workers {
                let (reporter, cursor, stop) = (&reporter, &cursor, &stop);
                let _ = scope.spawn(move || self.work(id, plan, cursor, stop, reporter));
            }
        });

        let mut reporter = reporter
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let recorded: HashSet<usize> = reporter.results().iter().map(|r| r.index).collect();
        for scenario in plan.scenarios.iter().filter(|s| !recorded.contains(&s.index)) {
            let _ = reporter.record(ScenarioReport::skipped(
                scenario.index,
                &scenario.name,
                scenario.kind(),
                "not run: stopped after first failure",
            ));
        }
        let report = reporter.finish(plan.malformed.clone());
        info!(summary = %report.summary(), "run finished");
        report
    }

    fn work(&self, id: usize, plan: &ScenarioPlan, cursor: &AtomicUsize, stop: &AtomicBool, reporter: &Mutex<Reporter>) {
        debug!(worker = id, "worker started");
        while !stop.load(Ordering::SeqCst) {
            let Some(scenario) = plan.scenarios.get(cursor.fetch_add(1, Ordering::SeqCst)) else {
                break;
            };
            let report = self.run_scenario(scenario);
            let mut reporter = reporter
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Err(err) = reporter.record(report) {
                warn!(worker = id, %err, "fail-fast: no further scenarios will start");
                stop.store(true, Ordering::SeqCst);
            }
        }
        SESSION.with(|slot| drop(slot.borrow_mut().take()));
        debug!(worker = id, "worker finished");
    }

    fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let mut attempts = 0;
        loop {
            attempts += 1;
            info!(scenario = %scenario.name, kind = %scenario.kind(), attempt = attempts, "scenario started");
            let started = Instant::now();
            let mut steps = Vec::new();
            let outcome = self.execute(scenario, &mut steps);
            let duration = started.elapsed();
            let report = match outcome {
                Outcome::Passed => ScenarioReport::passed(scenario.index, &scenario.name, scenario.kind(), duration),
                Outcome::Failed { reason, artifacts } => {
                    ScenarioReport::failed(scenario.index, &scenario.name, scenario.kind(), duration, reason)
                        .with_artifacts(artifacts)
                }
                Outcome::Skipped { reason, artifacts } => {
                    let mut report = ScenarioReport::skipped(scenario.index, &scenario.name, scenario.kind(), reason)
                        .with_artifacts(artifacts);
                    report.duration = duration;
                    report
                }
            }
            .with_steps(steps)
            .with_attempts(attempts);

            info!(
                scenario = %scenario.name,
                verdict = %report.verdict,
                reason = report.reason.as_deref().unwrap_or_default(),
                "scenario finished"
            );
            if report.verdict == Verdict::Fail && attempts <= scenario.retries {
                continue;
            }
            return report;
        }
    }

    /// One run of `scenario` on this worker's session
    fn execute(&self, scenario: &Scenario, steps: &mut Vec<String>) -> Outcome {
        SESSION.with(|slot| {
            let previous = slot.borrow_mut().take();
            let engine = match previous {
                Some(engine) if engine.is_session_active() => engine,
                stale => {
                    if stale.is_some() {
                        debug!("previous session no longer answers, opening a new one");
                    }
                    match self.factory.create() {
                        Ok(driver) => Engine::new(driver, self.settings.clone()),
                        Err(err) => {
                            return Outcome::Skipped {
                                reason: format!("could not open a browser session: {err}"),
                                artifacts: Vec::new(),
                            };
                        }
                    }
                }
            };

            let result = catch_unwind(AssertUnwindSafe(|| {
                scenario.execute(&engine, &self.options.credentials, steps)
            }));
            match result {
                Ok(Ok(())) => {
                    *slot.borrow_mut() = Some(engine);
                    Outcome::Passed
                }
                Ok(Err(err)) => {
                    let outcome = match Verdict::from_error(&err) {
                        Verdict::Skip => Outcome::Skipped {
                            reason: err.to_string(),
                            artifacts: diagnostic_artifact(&err).into_iter().collect(),
                        },
                        _ => Outcome::Failed {
                            reason: err.to_string(),
                            artifacts: diagnostic_artifact(&err)
                                .or_else(|| engine.capture(&failure_label(scenario)))
                                .into_iter()
                                .collect(),
                        },
                    };
                    if matches!(err, ProbeError::SessionLost { .. }) {
                        warn!(scenario = %scenario.name, "session lost, discarding it");
                    } else {
                        *slot.borrow_mut() = Some(engine);
                    }
                    outcome
                }
                Err(payload) => {
                    let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                    warn!(scenario = %scenario.name, %reason, "scenario panicked, discarding its session");
                    let artifacts = engine.capture(&failure_label(scenario)).into_iter().collect();
                    Outcome::Failed { reason, artifacts }
                }
            }
        })
    }
}

fn diagnostic_artifact(err: &ProbeError) -> Option<PathBuf> {
    err.diagnostic().and_then(|d| d.artifact.clone())
}

fn failure_label(scenario: &Scenario) -> String {
    format!("{}_{}_failed", scenario.kind(), scenario.index + 1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
