//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tellerprobe: data-driven end-to-end scenarios for the ParaBank demo
#[derive(Parser, Debug)]
#[command(name = "tellerprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios from a data file against a browser
    Run(RunArgs),

    /// Plan scenarios from a data file without a browser
    Validate(ValidateArgs),

    /// Show the effective suite configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario data file (JSON or YAML)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Suite configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Parallel workers, each with its own browser
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Stop starting scenarios after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Report directory (overrides `report_dir`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Summary format on stdout
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario data file (JSON or YAML)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Suite configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Plain lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_command() {
            let cli = Cli::parse_from(["tellerprobe", "run", "--data", "scenarios.yaml"]);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.data, PathBuf::from("scenarios.yaml"));
            assert!(args.config.is_none());
            assert!(args.workers.is_none());
            assert!(!args.fail_fast);
            assert_eq!(args.format, FormatArg::Text);
        }

        #[test]
        fn test_parse_run_with_options() {
            let cli = Cli::parse_from([
                "tellerprobe",
                "run",
                "-d",
                "rows.json",
                "--config",
                "suite.yaml",
                "-j",
                "4",
                "--fail-fast",
                "--output",
                "out",
                "--format",
                "json",
                "--no-sandbox",
            ]);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.workers, Some(4));
            assert!(args.fail_fast);
            assert!(args.no_sandbox);
            assert_eq!(args.output, Some(PathBuf::from("out")));
            assert_eq!(args.format, FormatArg::Json);
        }

        #[test]
        fn test_run_requires_data() {
            assert!(Cli::try_parse_from(["tellerprobe", "run"]).is_err());
        }

        #[test]
        fn test_parse_validate_command() {
            let cli = Cli::parse_from(["tellerprobe", "validate", "--data", "rows.yaml"]);
            assert!(matches!(cli.command, Commands::Validate(_)));
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::parse_from(["tellerprobe", "config", "-vv", "--log-format", "json"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.log_format, LogFormatArg::Json));
        }
    }
}
