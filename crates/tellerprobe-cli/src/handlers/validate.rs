//! Validate command handler
//!
//! Plans a data file without opening a browser, so broken rows surface
//! before a long run.

use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::ValidateArgs;
use std::fmt::Write as _;
use tellerprobe::ScenarioPlan;

/// Execute the validate command
///
/// # Errors
///
/// Returns error if the file cannot be read or names an unknown scenario
pub fn execute_validate(args: &ValidateArgs) -> CliResult<()> {
    let plan = ScenarioPlan::load(&args.data)?;
    match OutputFormat::from(args.format) {
        OutputFormat::Text => print!("{}", render_plan(&plan)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

/// One line per planned scenario, then the rows set aside
#[must_use]
pub fn render_plan(plan: &ScenarioPlan) -> String {
    let mut out = String::new();
    for scenario in &plan.scenarios {
        let _ = write!(out, "row {}: {} ({})", scenario.index, scenario.name, scenario.kind().label());
        if scenario.retries > 0 {
            let _ = write!(out, ", {} retries", scenario.retries);
        }
        out.push('\n');
    }
    for row in &plan.malformed {
        let _ = writeln!(out, "row {} ({}): {}", row.index, row.label, row.reason);
    }
    let _ = writeln!(
        out,
        "{} runnable, {} malformed",
        plan.scenarios.len(),
        plan.malformed.len()
    );
    out
}
