//! Run command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, ProgressReporter};
use crate::RunArgs;
use std::path::Path;
use tellerprobe::{
    DriverFactory, FailureMode, RunnerOptions, ScenarioPlan, ScenarioRunner, SuiteConfig,
    SuiteReport,
};
use tracing::{debug, info};

/// Execute the run command
///
/// # Errors
///
/// Configuration and data errors, report I/O errors, or
/// [`CliError::ScenarioFailures`] when any scenario failed
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let suite = load_suite(args)?;
    let plan = ScenarioPlan::load(&args.data)?;
    info!(
        data = %args.data.display(),
        scenarios = plan.len(),
        malformed = plan.malformed.len(),
        "planned scenarios"
    );

    let factory = browser_factory(&suite, args)?;
    let mut progress = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    progress.start_spinner(&format!("running {} scenario(s)", plan.len()));
    let report = run_suite(factory, &suite, &plan, runner_options(&suite, args));
    progress.finish();
    let report = report?;

    let written = report.write_all(&suite.report_dir)?;
    match OutputFormat::from(args.format) {
        OutputFormat::Text => {
            progress.suite(&report);
            for path in &written {
                progress.info(&format!("wrote {}", path.display()));
            }
        }
        OutputFormat::Json => println!("{}", report.render_json()?),
    }
    outcome(&report)
}

/// Suite configuration with command-line overrides applied
///
/// # Errors
///
/// Returns error if the file or environment is invalid, or `--workers 0`
pub fn load_suite(args: &RunArgs) -> CliResult<SuiteConfig> {
    let mut suite = SuiteConfig::load(args.config.as_deref())?;
    apply_overrides(&mut suite, args)?;
    Ok(suite)
}

/// Flags win over the file and the environment
///
/// # Errors
///
/// [`CliError::InvalidArgument`] for `--workers 0`
pub fn apply_overrides(suite: &mut SuiteConfig, args: &RunArgs) -> CliResult<()> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError::invalid_argument("--workers must be at least 1"));
        }
        suite.workers = workers;
    }
    if let Some(ref output) = args.output {
        suite.report_dir.clone_from(output);
    }
    debug!(workers = suite.workers, report_dir = %suite.report_dir.display(), "effective suite settings");
    Ok(())
}

/// Runner options for this invocation
#[must_use]
pub fn runner_options(suite: &SuiteConfig, args: &RunArgs) -> RunnerOptions {
    RunnerOptions {
        workers: suite.workers,
        failure_mode: if args.fail_fast {
            FailureMode::FailFast
        } else {
            FailureMode::CollectAll
        },
        credentials: suite.credentials(),
        suite_name: suite_name(&args.data),
    }
}

/// Report name taken from the data file's stem
#[must_use]
pub fn suite_name(data: &Path) -> String {
    data.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("tellerprobe")
        .to_string()
}

/// Run `plan` with sessions from `factory`
///
/// # Errors
///
/// Returns error if the suite's waits cannot become engine settings
pub fn run_suite<F: DriverFactory>(
    factory: F,
    suite: &SuiteConfig,
    plan: &ScenarioPlan,
    options: RunnerOptions,
) -> CliResult<SuiteReport> {
    let settings = suite.engine_settings()?;
    Ok(ScenarioRunner::new(factory, settings, options).run(plan))
}

/// Exit status of a finished suite
///
/// # Errors
///
/// [`CliError::ScenarioFailures`] when any scenario failed
pub fn outcome(report: &SuiteReport) -> CliResult<()> {
    if report.counts.failed > 0 {
        return Err(CliError::ScenarioFailures {
            failed: report.counts.failed,
        });
    }
    Ok(())
}

#[cfg(feature = "browser")]
fn browser_factory(suite: &SuiteConfig, args: &RunArgs) -> CliResult<tellerprobe::ChromiumFactory> {
    let mut chromium = tellerprobe::ChromiumConfig::default().with_headless(suite.headless);
    if args.no_sandbox {
        chromium = chromium.with_no_sandbox();
    }
    Ok(tellerprobe::ChromiumFactory::new(chromium))
}

#[cfg(not(feature = "browser"))]
fn browser_factory(
    _suite: &SuiteConfig,
    _args: &RunArgs,
) -> CliResult<fn() -> tellerprobe::ProbeResult<Box<dyn tellerprobe::Driver>>> {
    Err(CliError::config(
        "this build cannot launch a browser; rebuild with `--features browser`",
    ))
}
