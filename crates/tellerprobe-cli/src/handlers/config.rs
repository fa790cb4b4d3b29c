//! Config command handler

use crate::error::CliResult;
use crate::ConfigArgs;
use tellerprobe::SuiteConfig;

/// Execute the config command: print the effective suite configuration
///
/// # Errors
///
/// Returns error if the file or an environment override is invalid
pub fn execute_config(args: &ConfigArgs) -> CliResult<()> {
    let suite = SuiteConfig::load(args.config.as_deref())?;
    print!("{}", render_config(&suite)?);
    Ok(())
}

/// YAML text of `suite`, ready to save as a config file
///
/// # Errors
///
/// Returns error if serialization fails
pub fn render_config(suite: &SuiteConfig) -> CliResult<String> {
    Ok(suite.to_yaml()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_default_config() {
        let text = render_config(&SuiteConfig::default()).unwrap();
        assert!(text.contains("base_url:"));
        assert!(text.contains("fallback: disabled"));
    }

    #[test]
    fn test_rendered_config_reloads() {
        let suite = SuiteConfig {
            workers: 4,
            base_url: "http://localhost:8080/parabank/".to_string(),
            ..SuiteConfig::default()
        };
        let text = render_config(&suite).unwrap();
        assert_eq!(SuiteConfig::from_yaml_str(&text).unwrap(), suite);
    }

    #[test]
    fn test_missing_config_file() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/tellerprobe.yaml")),
        };
        assert!(execute_config(&args).is_err());
    }
}
