//! Tellerprobe CLI: data-driven ParaBank scenarios
//!
//! ## Usage
//!
//! ```bash
//! tellerprobe validate --data scenarios.yaml     # Plan without a browser
//! tellerprobe run --data scenarios.yaml -j 4     # Run on four browsers
//! tellerprobe config --config tellerprobe.yaml   # Show effective settings
//! ```

use clap::Parser;
use std::process::ExitCode;
use tellerprobe_cli::{
    handlers::{execute_config, execute_run, execute_validate},
    Cli, CliConfig, CliError, CliResult, Commands, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            // 1: scenarios failed, 2: the suite could not run
            if matches!(e, CliError::ScenarioFailures { .. }) {
                ExitCode::FAILURE
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    config.init_logging();

    match cli.command {
        Commands::Run(args) => execute_run(&config, &args),
        Commands::Validate(args) => execute_validate(&args),
        Commands::Config(args) => execute_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_log_format(cli.log_format.into())
}
