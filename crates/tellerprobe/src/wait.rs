//! Wait policies and the cooperative polling loop.
//!
//! Every wait blocks the calling worker: check, sleep one poll interval,
//! check again, until the condition holds or the timeout elapses. A timeout
//! is the only cancellation mechanism.

use crate::driver::{Driver, DriverResult, ElementHandle};
use crate::result::{ProbeError, ProbeResult};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for element waits (15 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 15_000;

/// Timeout for cheap, repeatable checks such as `is_loaded` (2 seconds)
pub const SHORT_WAIT_TIMEOUT_MS: u64 = 2_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Unconditional settle delay for client-side animation (300ms)
pub const SETTLE_DELAY_MS: u64 = 300;

// =============================================================================
// CONDITION
// =============================================================================

/// Element predicate used by [`Condition::Custom`]
pub type Predicate = Arc<dyn Fn(&dyn Driver, &ElementHandle) -> DriverResult<bool> + Send + Sync>;

/// What must hold for a candidate element to count as matched
#[derive(Clone)]
pub enum Condition {
    /// Element is attached to the DOM
    Present,
    /// Element is rendered and visible
    Visible,
    /// Element is visible and enabled
    Clickable,
    /// Element is visible, enabled and not read-only
    Editable,
    /// Caller-defined check
    Custom {
        /// Shown in logs and diagnostics
        description: String,
        /// The check itself
        predicate: Predicate,
    },
}

impl Condition {
    /// Build a custom condition
    pub fn custom<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Driver, &ElementHandle) -> DriverResult<bool> + Send + Sync + 'static,
    {
        Self::Custom {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Human-readable name
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Present => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
            Self::Editable => "editable",
            Self::Custom { description, .. } => description,
        }
    }

    /// Evaluate against one candidate
    pub(crate) fn holds(&self, driver: &dyn Driver, handle: &ElementHandle) -> DriverResult<bool> {
        match self {
            Self::Present => Ok(true),
            Self::Visible => driver.is_visible(handle),
            Self::Clickable => Ok(driver.is_visible(handle)? && driver.is_enabled(handle)?),
            Self::Editable => Ok(driver.is_visible(handle)? && driver.is_editable(handle)?),
            Self::Custom { predicate, .. } => predicate(driver, handle),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({})", self.description())
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Present, Self::Present)
            | (Self::Visible, Self::Visible)
            | (Self::Clickable, Self::Clickable)
            | (Self::Editable, Self::Editable) => true,
            (Self::Custom { predicate: a, .. }, Self::Custom { predicate: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timeout, poll interval and default condition for a wait
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
    condition: Condition,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            condition: Condition::Visible,
        }
    }
}

impl WaitPolicy {
    /// Create a policy that waits for visibility
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::InvalidConfig`] if either duration is zero
    pub fn new(timeout: Duration, poll_interval: Duration) -> ProbeResult<Self> {
        if timeout.is_zero() {
            return Err(ProbeError::invalid_config("wait timeout must be positive"));
        }
        if poll_interval.is_zero() {
            return Err(ProbeError::invalid_config("poll interval must be positive"));
        }
        Ok(Self {
            timeout,
            poll_interval,
            condition: Condition::Visible,
        })
    }

    /// Create from milliseconds
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::InvalidConfig`] if either value is zero
    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> ProbeResult<Self> {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_interval_ms),
        )
    }

    /// Policy for repeatable page checks
    #[must_use]
    pub fn short() -> Self {
        Self {
            timeout: Duration::from_millis(SHORT_WAIT_TIMEOUT_MS),
            ..Self::default()
        }
    }

    /// Replace the default condition
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Get timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Get the default condition
    #[must_use]
    pub const fn condition(&self) -> &Condition {
        &self.condition
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll `attempt` until it yields a value or `policy` times out.
///
/// `Ok(Some(_))` stops with the value, `Ok(None)` keeps polling and `Err`
/// aborts immediately. At least one attempt is always made, and one final
/// attempt happens at the deadline. Returns `Ok(None)` on timeout.
pub fn poll_until<T, F>(policy: &WaitPolicy, mut attempt: F) -> ProbeResult<Option<T>>
where
    F: FnMut() -> ProbeResult<Option<T>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = attempt()? {
            return Ok(Some(value));
        }
        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Ok(None);
        }
        std::thread::sleep(policy.poll_interval.min(policy.timeout - elapsed));
    }
}
