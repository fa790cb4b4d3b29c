//! Command handlers - extracted from main.rs for testability

pub mod config;
pub mod run;
pub mod validate;

pub use config::{execute_config, render_config};
pub use run::{apply_overrides, execute_run, outcome, run_suite, runner_options, suite_name};
pub use validate::{execute_validate, render_plan};
