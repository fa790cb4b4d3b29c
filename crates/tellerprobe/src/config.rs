//! Suite configuration.
//!
//! Read from YAML, every field optional; environment variables are applied
//! on top of the file.

use crate::artifact::ArtifactStore;
use crate::engine::{EngineSettings, FallbackPolicy, DEFAULT_ACTION_ATTEMPTS, DEFAULT_OPTION_RETRIES};
use crate::result::{ProbeError, ProbeResult};
use crate::scenario::Credentials;
use crate::wait::{
    WaitPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS, SETTLE_DELAY_MS, SHORT_WAIT_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Base URL override
pub const ENV_BASE_URL: &str = "TELLERPROBE_BASE_URL";
/// Headless override (`true`/`false`/`1`/`0`)
pub const ENV_HEADLESS: &str = "TELLERPROBE_HEADLESS";
/// Worker count override
pub const ENV_WORKERS: &str = "TELLERPROBE_WORKERS";
/// Default wait override, in milliseconds
pub const ENV_DEFAULT_WAIT_MS: &str = "TELLERPROBE_DEFAULT_WAIT_MS";

/// Browser family to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Chromium over CDP
    #[default]
    Chromium,
}

/// Everything a run needs besides the scenario data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    /// Application root; relative page paths resolve against it
    pub base_url: String,
    /// Browser to launch
    pub browser: BrowserKind,
    /// Run without a window
    pub headless: bool,
    /// Wait for ordinary interactions
    pub default_wait_ms: u64,
    /// Wait for cheap repeatable checks
    pub short_wait_ms: u64,
    /// Poll interval for both waits
    pub poll_interval_ms: u64,
    /// Unconditional settle delay
    pub settle_delay_ms: u64,
    /// Checks while a dropdown populates
    pub option_retries: u32,
    /// Attempts for page loads and form submissions
    pub action_attempts: u32,
    /// Parallel workers
    pub workers: usize,
    /// Screenshot directory
    pub artifacts_dir: PathBuf,
    /// Report directory
    pub report_dir: PathBuf,
    /// Row/option fallback
    pub fallback: FallbackPolicy,
    /// Login for scenarios that need one
    pub username: String,
    /// Password for `username`
    pub password: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://parabank.parasoft.com/parabank/".to_string(),
            browser: BrowserKind::Chromium,
            headless: true,
            default_wait_ms: DEFAULT_WAIT_TIMEOUT_MS,
            short_wait_ms: SHORT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_delay_ms: SETTLE_DELAY_MS,
            option_retries: DEFAULT_OPTION_RETRIES,
            action_attempts: DEFAULT_ACTION_ATTEMPTS,
            workers: 1,
            artifacts_dir: PathBuf::from("target/screenshots"),
            report_dir: PathBuf::from("target/tellerprobe"),
            fallback: FallbackPolicy::Disabled,
            username: "john".to_string(),
            password: "demo".to_string(),
        }
    }
}

impl SuiteConfig {
    /// Parse YAML
    ///
    /// # Errors
    ///
    /// Returns error on malformed YAML or unknown keys
    pub fn from_yaml_str(text: &str) -> ProbeResult<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Read a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// File (or defaults when `path` is `None`), then the process
    /// environment, then validation
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be loaded, an override does not
    /// parse, or the result is invalid
    pub fn load(path: Option<&Path>) -> ProbeResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup`
    ///
    /// # Errors
    ///
    /// [`ProbeError::InvalidConfig`] if an override does not parse
    pub fn apply_env<F>(&mut self, lookup: F) -> ProbeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            debug!(base_url = %url, "base url from environment");
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_HEADLESS) {
            self.headless = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ProbeError::invalid_config(format!("{ENV_HEADLESS}='{raw}' is not a boolean"))),
            };
        }
        if let Some(raw) = lookup(ENV_WORKERS) {
            self.workers = raw
                .trim()
                .parse()
                .map_err(|_| ProbeError::invalid_config(format!("{ENV_WORKERS}='{raw}' is not a count")))?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_WAIT_MS) {
            self.default_wait_ms = raw
                .trim()
                .parse()
                .map_err(|_| ProbeError::invalid_config(format!("{ENV_DEFAULT_WAIT_MS}='{raw}' is not milliseconds")))?;
        }
        Ok(())
    }

    /// Reject values the engine cannot work with
    ///
    /// # Errors
    ///
    /// [`ProbeError::InvalidConfig`] naming the first offending field
    pub fn validate(&self) -> ProbeResult<()> {
        let zero = [
            ("default_wait_ms", self.default_wait_ms == 0),
            ("short_wait_ms", self.short_wait_ms == 0),
            ("poll_interval_ms", self.poll_interval_ms == 0),
            ("option_retries", self.option_retries == 0),
            ("action_attempts", self.action_attempts == 0),
            ("workers", self.workers == 0),
        ];
        if let Some((field, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ProbeError::invalid_config(format!("{field} must be greater than zero")));
        }
        if self.base_url.trim().is_empty() {
            return Err(ProbeError::invalid_config("base_url must not be empty"));
        }
        Ok(())
    }

    /// Engine settings for one session
    ///
    /// # Errors
    ///
    /// [`ProbeError::InvalidConfig`] if a wait policy cannot be built
    pub fn engine_settings(&self) -> ProbeResult<EngineSettings> {
        Ok(EngineSettings {
            base_url: self.base_url.clone(),
            default_policy: WaitPolicy::from_millis(self.default_wait_ms, self.poll_interval_ms)?,
            short_policy: WaitPolicy::from_millis(self.short_wait_ms, self.poll_interval_ms.min(self.short_wait_ms))?,
            artifacts: ArtifactStore::new(&self.artifacts_dir),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            option_retries: self.option_retries,
            action_attempts: self.action_attempts,
            fallback: self.fallback,
        })
    }

    /// Login for scenarios that need one
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Render as YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = SuiteConfig::default();
            assert_eq!(config.default_wait_ms, 15_000);
            assert_eq!(config.fallback, FallbackPolicy::Disabled);
            config.validate().unwrap();
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = SuiteConfig::from_yaml_str("workers: 4\nfallback: first_available\n").unwrap();
            assert_eq!(config.workers, 4);
            assert!(config.fallback.is_enabled());
            assert_eq!(config.username, "john");
        }

        #[test]
        fn test_unknown_key_rejected() {
            assert!(SuiteConfig::from_yaml_str("wrokers: 4\n").is_err());
        }

        #[test]
        fn test_yaml_round_trip() {
            let config = SuiteConfig {
                workers: 3,
                ..SuiteConfig::default()
            };
            let parsed = SuiteConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
            assert_eq!(parsed, config);
        }

        #[test]
        fn test_from_file() {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("suite.yaml");
            std::fs::write(&path, "base_url: http://localhost:8080/parabank/\n").unwrap();
            let config = SuiteConfig::from_file(&path).unwrap();
            assert_eq!(config.base_url, "http://localhost:8080/parabank/");
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_overrides_apply() {
            let mut config = SuiteConfig::default();
            config
                .apply_env(env(&[
                    (ENV_BASE_URL, "http://bank.test/"),
                    (ENV_HEADLESS, "false"),
                    (ENV_WORKERS, "2"),
                    (ENV_DEFAULT_WAIT_MS, "500"),
                ]))
                .unwrap();
            assert_eq!(config.base_url, "http://bank.test/");
            assert!(!config.headless);
            assert_eq!(config.workers, 2);
            assert_eq!(config.default_wait_ms, 500);
        }

        #[test]
        fn test_bad_override_rejected() {
            let mut config = SuiteConfig::default();
            let err = config.apply_env(env(&[(ENV_WORKERS, "many")])).unwrap_err();
            assert!(matches!(err, ProbeError::InvalidConfig { .. }));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_zero_values_rejected() {
            for config in [
                SuiteConfig {
                    workers: 0,
                    ..SuiteConfig::default()
                },
                SuiteConfig {
                    poll_interval_ms: 0,
                    ..SuiteConfig::default()
                },
                SuiteConfig {
                    action_attempts: 0,
                    ..SuiteConfig::default()
                },
            ] {
                assert!(matches!(
                    config.validate(),
                    Err(ProbeError::InvalidConfig { .. })
                ));
            }
        }

        #[test]
        fn test_engine_settings() {
            let config = SuiteConfig {
                short_wait_ms: 100,
                ..SuiteConfig::default()
            };
            let settings = config.engine_settings().unwrap();
            assert_eq!(settings.default_policy.timeout(), Duration::from_secs(15));
            assert_eq!(settings.short_policy.poll_interval(), Duration::from_millis(100));
            assert_eq!(settings.artifacts.dir(), Path::new("target/screenshots"));
            assert_eq!(settings.action_attempts, 3);
        }
    }
}
