//! Result and error types for Tellerprobe.
//!
//! Engine-level failures carry a boxed [`Diagnostic`] so a report can show
//! which locators were tried, where the browser was, and the screenshot taken
//! at the moment the call gave up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Tellerprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Triage context captured when an interaction is exhausted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Caller-supplied label ("login_submit", "transfer_amount", ...)
    pub label: String,
    /// Locator set rendered as text
    pub locators: String,
    /// Last known page URL
    pub url: String,
    /// Last known page title
    pub title: String,
    /// Screenshot written for this failure, if capture succeeded
    pub artifact: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a diagnostic with only a label
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Attach the rendered locator set
    #[must_use]
    pub fn with_locators(mut self, locators: impl Into<String>) -> Self {
        self.locators = locators.into();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] at {} ({:?})", self.label, self.url, self.title)?;
        if !self.locators.is_empty() {
            write!(f, " via {}", self.locators)?;
        }
        Ok(())
    }
}

/// Errors that can occur while driving the application under test
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No locator in a set matched within the wait policy
    #[error("element not found after {waited_ms}ms: {diagnostic}")]
    NotFound {
        /// Milliseconds spent polling
        waited_ms: u64,
        /// Failure context
        diagnostic: Box<Diagnostic>,
    },

    /// Element resolved but neither a native nor a scripted click landed
    #[error("element not clickable: {message} {diagnostic}")]
    NotClickable {
        /// Error message
        message: String,
        /// Failure context
        diagnostic: Box<Diagnostic>,
    },

    /// Element could not be brought into an editable state
    #[error("element not editable: {message} {diagnostic}")]
    NotEditable {
        /// Error message
        message: String,
        /// Failure context
        diagnostic: Box<Diagnostic>,
    },

    /// Dropdown never offered the requested option
    #[error("dropdown option '{option}' not found {diagnostic}")]
    OptionNotFound {
        /// Requested visible text
        option: String,
        /// Failure context
        diagnostic: Box<Diagnostic>,
    },

    /// Scenario label is not in the catalogue
    #[error("unknown scenario: {label}")]
    UnknownScenario {
        /// Label as found in the data source
        label: String,
    },

    /// The environment cannot provide what a scenario needs
    #[error("precondition unavailable: {message}")]
    PreconditionUnavailable {
        /// Error message
        message: String,
    },

    /// The browser session is gone
    #[error("session lost: {message}")]
    SessionLost {
        /// Error message
        message: String,
    },

    /// Observed outcome differs from the expected one
    #[error("assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// A construction invariant was violated
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Transient driver failure
    #[error("driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Scenario data could not be loaded
    #[error("data source error: {message}")]
    DataSource {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Flat classification of [`ProbeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`ProbeError::NotFound`]
    NotFound,
    /// See [`ProbeError::NotClickable`]
    NotClickable,
    /// See [`ProbeError::NotEditable`]
    NotEditable,
    /// See [`ProbeError::OptionNotFound`]
    OptionNotFound,
    /// See [`ProbeError::UnknownScenario`]
    UnknownScenario,
    /// See [`ProbeError::PreconditionUnavailable`]
    PreconditionUnavailable,
    /// See [`ProbeError::SessionLost`]
    SessionLost,
    /// See [`ProbeError::AssertionFailed`]
    AssertionFailed,
    /// See [`ProbeError::InvalidConfig`]
    InvalidConfig,
    /// Driver, data or I/O trouble
    Other,
}

impl ProbeError {
    /// Build an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Build a precondition failure
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionUnavailable {
            message: message.into(),
        }
    }

    /// Build a configuration failure
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotClickable { .. } => ErrorKind::NotClickable,
            Self::NotEditable { .. } => ErrorKind::NotEditable,
            Self::OptionNotFound { .. } => ErrorKind::OptionNotFound,
            Self::UnknownScenario { .. } => ErrorKind::UnknownScenario,
            Self::PreconditionUnavailable { .. } => ErrorKind::PreconditionUnavailable,
            Self::SessionLost { .. } => ErrorKind::SessionLost,
            Self::AssertionFailed { .. } => ErrorKind::AssertionFailed,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::Driver { .. }
            | Self::DataSource { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => ErrorKind::Other,
        }
    }

    /// Whether this error turns a scenario into a skip rather than a failure
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::PreconditionUnavailable { .. } | Self::SessionLost { .. }
        )
    }

    /// Whether re-running the action could change the outcome
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::SessionLost { .. } | Self::UnknownScenario { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Failure context, for engine-level errors
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::NotFound { diagnostic, .. }
            | Self::NotClickable { diagnostic, .. }
            | Self::NotEditable { diagnostic, .. }
            | Self::OptionNotFound { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}
