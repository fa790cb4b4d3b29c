//! Diagnostic artifacts on disk.
//!
//! Screenshots land in `{dir}/{label}_{yyyyMMdd_HHmmss_SSS}.png`.

use crate::driver::Screenshot;
use crate::result::ProbeResult;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Default directory for failure screenshots
pub const DEFAULT_ARTIFACTS_DIR: &str = "target/screenshots";

/// Writes diagnostic artifacts into one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACTS_DIR)
    }
}

impl ArtifactStore {
    /// Store artifacts under `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a label captured at `at`
    #[must_use]
    pub fn path_for(&self, label: &str, at: DateTime<Local>) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.png",
            sanitize_label(label),
            at.format("%Y%m%d_%H%M%S_%3f")
        ))
    }

    /// Write a screenshot, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub fn save_screenshot(&self, label: &str, screenshot: &Screenshot) -> ProbeResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(label, DateTime::<Local>::from(screenshot.timestamp));
        std::fs::write(&path, &screenshot.data)?;
        Ok(path)
    }
}

/// Keep labels filesystem-safe
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}
