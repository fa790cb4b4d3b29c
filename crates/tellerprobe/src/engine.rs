//! Interaction engine: bounded waiting, retrying and locator fallback over a
//! [`Driver`].
//!
//! Every call walks the same small state machine:
//!
//! ```text
//! Idle -> Polling -> Matched -> Acting -> Succeeded
//!                |          |         \-> ActionFailed
//!                |          \-> Succeeded        (pure waits and reads)
//!                |-> TimedOut
//!                \-> ActionFailed                (session lost while polling)
//! ```
//!
//! Exhausted failures capture a screenshot tagged with the locator set's
//! label and surface as typed [`ProbeError`]s carrying a [`Diagnostic`].

use crate::artifact::ArtifactStore;
use crate::driver::{Driver, DriverError, ElementHandle};
use crate::locator::LocatorSet;
use crate::result::{Diagnostic, ErrorKind, ProbeError, ProbeResult};
use crate::script::Script;
use crate::wait::{poll_until, Condition, WaitPolicy, SETTLE_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of checks while a dropdown populates
pub const DEFAULT_OPTION_RETRIES: u32 = 5;

/// Default attempts for page loads and form submissions
pub const DEFAULT_ACTION_ATTEMPTS: u32 = 3;

const UNAVAILABLE: &str = "<unavailable>";

// =============================================================================
// POLICIES
// =============================================================================

/// What to do when the intended row or option cannot be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Report the target as missing
    #[default]
    Disabled,
    /// Use the first available row or option, with a warning
    FirstAvailable,
}

impl FallbackPolicy {
    /// Whether falling back is allowed
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::FirstAvailable)
    }
}

/// Delay between attempts of [`Engine::retry_action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately
    #[default]
    None,
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// `initial`, then `initial + step`, then `initial + 2 * step`, ...
    Incremental {
        /// Delay after the first failure
        initial: Duration,
        /// Added after each further failure
        step: Duration,
    },
}

impl Backoff {
    /// Delay after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Incremental { initial, step } => {
                initial.saturating_add(step.saturating_mul(attempt.saturating_sub(1)))
            }
        }
    }
}

// =============================================================================
// CALL STATE MACHINE
// =============================================================================

/// Lifecycle of a single engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Not started
    Idle,
    /// Querying the driver each poll interval
    Polling,
    /// A locator satisfied the condition
    Matched,
    /// Performing the action on the matched element
    Acting,
    /// Done, value produced
    Succeeded,
    /// The action or the session failed
    ActionFailed,
    /// No locator matched within the timeout
    TimedOut,
}

impl CallState {
    /// Terminal states end a call
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::ActionFailed | Self::TimedOut)
    }

    /// Allowed transitions
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Polling)
                | (
                    Self::Polling,
                    Self::Matched | Self::TimedOut | Self::ActionFailed
                )
                | (Self::Matched, Self::Acting | Self::Succeeded)
                | (Self::Acting, Self::Succeeded | Self::ActionFailed)
        )
    }
}

/// Records transitions of one call; publishes them to the engine on drop
struct CallTrace<'e> {
    op: &'static str,
    states: Vec<CallState>,
    sink: &'e RefCell<Vec<CallState>>,
}

impl<'e> CallTrace<'e> {
    fn new(op: &'static str, sink: &'e RefCell<Vec<CallState>>) -> Self {
        Self {
            op,
            states: vec![CallState::Idle],
            sink,
        }
    }

    fn advance(&mut self, next: CallState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "{}: illegal transition {current:?} -> {next:?}",
            self.op
        );
        debug!(op = self.op, from = ?current, to = ?next, "call state");
        self.states.push(next);
    }

    fn current(&self) -> CallState {
        self.states.last().copied().unwrap_or(CallState::Idle)
    }
}

impl Drop for CallTrace<'_> {
    fn drop(&mut self) {
        *self.sink.borrow_mut() = std::mem::take(&mut self.states);
    }
}

// =============================================================================
// ACTION RESULT
// =============================================================================

/// Outcome of [`Engine::retry_action`]
#[derive(Debug)]
pub struct ActionResult<T> {
    value: Option<T>,
    error: Option<ProbeError>,
    attempts: u32,
    artifact: Option<PathBuf>,
}

impl<T> ActionResult<T> {
    fn success(value: T, attempts: u32) -> Self {
        Self {
            value: Some(value),
            error: None,
            attempts,
            artifact: None,
        }
    }

    fn failure(error: ProbeError, attempts: u32, artifact: Option<PathBuf>) -> Self {
        Self {
            value: None,
            error: Some(error),
            attempts,
            artifact,
        }
    }

    /// Whether the action eventually succeeded
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.value.is_some()
    }

    /// Kind of the final error, if any
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(ProbeError::kind)
    }

    /// Final error, if any
    #[must_use]
    pub const fn error(&self) -> Option<&ProbeError> {
        self.error.as_ref()
    }

    /// Attempts actually made
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Screenshot captured when attempts ran out
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Convert into a plain result
    ///
    /// # Errors
    ///
    /// Returns the final error of a failed action
    pub fn into_result(self) -> ProbeResult<T> {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ProbeError::Driver {
                message: "action produced no outcome".to_string(),
            }),
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Base URL relative paths are resolved against
    pub base_url: String,
    /// Policy for ordinary interactions
    pub default_policy: WaitPolicy,
    /// Policy for cheap repeatable checks
    pub short_policy: WaitPolicy,
    /// Where failure screenshots go
    pub artifacts: ArtifactStore,
    /// Unconditional settle delay
    pub settle_delay: Duration,
    /// Checks while a dropdown populates
    pub option_retries: u32,
    /// Attempts for page loads and form submissions
    pub action_attempts: u32,
    /// Row/option fallback
    pub fallback: FallbackPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_policy: WaitPolicy::default(),
            short_policy: WaitPolicy::short(),
            artifacts: ArtifactStore::default(),
            settle_delay: Duration::from_millis(SETTLE_DELAY_MS),
            option_retries: DEFAULT_OPTION_RETRIES,
            action_attempts: DEFAULT_ACTION_ATTEMPTS,
            fallback: FallbackPolicy::Disabled,
        }
    }
}

/// Resilient interaction layer over one browser session
#[derive(Debug)]
pub struct Engine {
    driver: Box<dyn Driver>,
    settings: EngineSettings,
    closed: Cell<bool>,
    defer_capture: Cell<bool>,
    last_call: RefCell<Vec<CallState>>,
}

impl Engine {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: Box<dyn Driver>, settings: EngineSettings) -> Self {
        Self {
            driver,
            settings,
            closed: Cell::new(false),
            defer_capture: Cell::new(false),
            last_call: RefCell::new(Vec::new()),
        }
    }

    /// Settings in effect
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Policy for ordinary interactions
    #[must_use]
    pub const fn default_policy(&self) -> &WaitPolicy {
        &self.settings.default_policy
    }

    /// Policy for `is_loaded` style checks
    #[must_use]
    pub const fn short_policy(&self) -> &WaitPolicy {
        &self.settings.short_policy
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// State transitions of the most recent call
    #[must_use]
    pub fn last_call_states(&self) -> Vec<CallState> {
        self.last_call.borrow().clone()
    }

    fn trace(&self, op: &'static str) -> CallTrace<'_> {
        CallTrace::new(op, &self.last_call)
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Resolve a path against the base URL; absolute URLs pass through
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if path.contains("://") || path.starts_with("about:") || self.settings.base_url.is_empty() {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Load a page
    pub fn navigate(&self, path: &str) -> ProbeResult<()> {
        let url = self.resolve_url(path);
        debug!(%url, "navigate");
        Ok(self.driver.navigate(&url)?)
    }

    /// Reload the current page
    pub fn refresh(&self) -> ProbeResult<()> {
        Ok(self.driver.refresh()?)
    }

    /// Current URL
    pub fn current_url(&self) -> ProbeResult<String> {
        Ok(self.driver.current_url()?)
    }

    /// Current title
    pub fn title(&self) -> ProbeResult<String> {
        Ok(self.driver.title()?)
    }

    /// Sleep the configured settle delay
    pub fn settle(&self) {
        std::thread::sleep(self.settings.settle_delay);
    }

    // -------------------------------------------------------------------------
    // Waiting
    // -------------------------------------------------------------------------

    /// One pass over the set: first candidate satisfying `condition`
    fn probe(&self, set: &LocatorSet, condition: &Condition) -> ProbeResult<Option<ElementHandle>> {
        for locator in set {
            let candidates = match self.driver.find_candidates(locator) {
                Ok(candidates) => candidates,
                Err(DriverError::SessionLost(message)) => {
                    return Err(ProbeError::SessionLost { message })
                }
                Err(err) => {
                    debug!(%locator, %err, "lookup failed, trying next locator");
                    continue;
                }
            };
            for handle in candidates {
                match condition.holds(self.driver.as_ref(), &handle) {
                    Ok(true) => return Ok(Some(handle)),
                    Ok(false) => {}
                    Err(DriverError::SessionLost(message)) => {
                        return Err(ProbeError::SessionLost { message })
                    }
                    Err(err) => debug!(%locator, %err, "candidate went stale"),
                }
            }
        }
        Ok(None)
    }

    /// Poll until some locator satisfies `condition`; drives the trace
    /// through `Polling` into `Matched`, `TimedOut` or `ActionFailed`
    fn locate(
        &self,
        trace: &mut CallTrace<'_>,
        set: &LocatorSet,
        condition: &Condition,
        policy: &WaitPolicy,
    ) -> ProbeResult<Option<ElementHandle>> {
        trace.advance(CallState::Polling);
        match poll_until(policy, || self.probe(set, condition)) {
            Ok(Some(handle)) => {
                trace.advance(CallState::Matched);
                Ok(Some(handle))
            }
            Ok(None) => {
                trace.advance(CallState::TimedOut);
                Ok(None)
            }
            Err(err) => {
                trace.advance(CallState::ActionFailed);
                Err(err)
            }
        }
    }

    /// Wait until `condition` holds for some locator in `set`, trying
    /// locators in declaration order on every poll
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] after the timeout,
    /// [`ProbeError::SessionLost`] as soon as the session is gone
    pub fn wait_until(
        &self,
        set: &LocatorSet,
        condition: &Condition,
        policy: &WaitPolicy,
    ) -> ProbeResult<ElementHandle> {
        let mut trace = self.trace("wait_until");
        match self.locate(&mut trace, set, condition, policy)? {
            Some(handle) => {
                trace.advance(CallState::Succeeded);
                Ok(handle)
            }
            None => Err(ProbeError::NotFound {
                waited_ms: policy.timeout().as_millis() as u64,
                diagnostic: self.diagnose(set),
            }),
        }
    }

    /// [`Engine::wait_until`] with the policy's own condition
    pub fn wait_for(&self, set: &LocatorSet, policy: &WaitPolicy) -> ProbeResult<ElementHandle> {
        self.wait_until(set, policy.condition(), policy)
    }

    /// Whether any locator currently finds an attached element; no waiting
    #[must_use]
    pub fn exists(&self, set: &LocatorSet) -> bool {
        matches!(self.probe(set, &Condition::Present), Ok(Some(_)))
    }

    /// Whether the element becomes visible within `policy`; never fails
    #[must_use]
    pub fn is_displayed(&self, set: &LocatorSet, policy: &WaitPolicy) -> bool {
        let mut trace = self.trace("is_displayed");
        match self.locate(&mut trace, set, &Condition::Visible, policy) {
            Ok(Some(_)) => {
                trace.advance(CallState::Succeeded);
                true
            }
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Wait for clickable and click; if the native click fails, force a
    /// scripted click exactly once
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] if nothing became clickable,
    /// [`ProbeError::NotClickable`] if both clicks failed
    pub fn click(&self, set: &LocatorSet, policy: &WaitPolicy) -> ProbeResult<()> {
        let mut trace = self.trace("click");
        let Some(handle) = self.locate(&mut trace, set, &Condition::Clickable, policy)? else {
            return Err(ProbeError::NotFound {
                waited_ms: policy.timeout().as_millis() as u64,
                diagnostic: self.diagnose(set),
            });
        };
        trace.advance(CallState::Acting);
        let native = match self.driver.click(&handle) {
            Ok(()) => {
                trace.advance(CallState::Succeeded);
                return Ok(());
            }
            Err(DriverError::SessionLost(message)) => {
                trace.advance(CallState::ActionFailed);
                return Err(ProbeError::SessionLost { message });
            }
            Err(err) => err,
        };
        debug!(label = %set.label(), %native, "native click failed, forcing scripted click");
        match self.driver.execute_script(&Script::Click.render(), Some(&handle)) {
            Ok(_) => {
                trace.advance(CallState::Succeeded);
                Ok(())
            }
            Err(DriverError::SessionLost(message)) => {
                trace.advance(CallState::ActionFailed);
                Err(ProbeError::SessionLost { message })
            }
            Err(scripted) => {
                trace.advance(CallState::ActionFailed);
                Err(ProbeError::NotClickable {
                    message: format!("{native}; scripted click: {scripted}"),
                    diagnostic: self.diagnose(set),
                })
            }
        }
    }

    /// Wait for editable (visible, enabled, not read-only), clear, then type `text`
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotEditable`] if the element never became editable
    /// within the policy or refused input
    pub fn type_text(&self, set: &LocatorSet, text: &str, policy: &WaitPolicy) -> ProbeResult<()> {
        let mut trace = self.trace("type_text");
        let Some(handle) = self.locate(&mut trace, set, &Condition::Editable, policy)? else {
            return Err(ProbeError::NotEditable {
                message: format!("not editable within {}ms", policy.timeout().as_millis()),
                diagnostic: self.diagnose(set),
            });
        };
        trace.advance(CallState::Acting);
        match self.driver.clear_and_type(&handle, text) {
            Ok(()) => {
                trace.advance(CallState::Succeeded);
                Ok(())
            }
            Err(DriverError::SessionLost(message)) => {
                trace.advance(CallState::ActionFailed);
                Err(ProbeError::SessionLost { message })
            }
            Err(err) => {
                trace.advance(CallState::ActionFailed);
                Err(ProbeError::NotEditable {
                    message: err.to_string(),
                    diagnostic: self.diagnose(set),
                })
            }
        }
    }

    /// Wait for visible and return the trimmed text; `""` if the element
    /// cannot be resolved. Never fails.
    #[must_use]
    pub fn read(&self, set: &LocatorSet, policy: &WaitPolicy) -> String {
        let mut trace = self.trace("read");
        match self.locate(&mut trace, set, &Condition::Visible, policy) {
            Ok(Some(handle)) => {
                trace.advance(CallState::Acting);
                match self.driver.get_text(&handle) {
                    Ok(text) => {
                        trace.advance(CallState::Succeeded);
                        text.trim().to_string()
                    }
                    Err(err) => {
                        trace.advance(CallState::ActionFailed);
                        debug!(label = %set.label(), %err, "read failed");
                        String::new()
                    }
                }
            }
            Ok(None) => String::new(),
            Err(err) => {
                debug!(label = %set.label(), %err, "read aborted");
                String::new()
            }
        }
    }

    /// Trimmed texts of every element the first productive locator finds;
    /// empty if none appear within `policy`. Never fails.
    #[must_use]
    pub fn read_all(&self, set: &LocatorSet, policy: &WaitPolicy) -> Vec<String> {
        let mut trace = self.trace("read_all");
        trace.advance(CallState::Polling);
        let found = poll_until(policy, || {
            for locator in set {
                match self.driver.find_candidates(locator) {
                    Ok(handles) if !handles.is_empty() => return Ok(Some(handles)),
                    Ok(_) => {}
                    Err(DriverError::SessionLost(message)) => {
                        return Err(ProbeError::SessionLost { message })
                    }
                    Err(err) => debug!(%locator, %err, "lookup failed"),
                }
            }
            Ok(None)
        });
        match found {
            Ok(Some(handles)) => {
                trace.advance(CallState::Matched);
                trace.advance(CallState::Acting);
                let texts = handles
                    .iter()
                    .filter_map(|h| self.driver.get_text(h).ok())
                    .map(|t| t.trim().to_string())
                    .collect();
                trace.advance(CallState::Succeeded);
                texts
            }
            Ok(None) => {
                trace.advance(CallState::TimedOut);
                Vec::new()
            }
            Err(err) => {
                trace.advance(CallState::ActionFailed);
                debug!(label = %set.label(), %err, "read_all aborted");
                Vec::new()
            }
        }
    }

    /// Visible texts of a dropdown's options
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] if the dropdown is absent
    pub fn option_texts(&self, set: &LocatorSet, policy: &WaitPolicy) -> ProbeResult<Vec<String>> {
        let handle = self.wait_until(set, &Condition::Present, policy)?;
        self.options_of(&handle)
    }

    fn options_of(&self, handle: &ElementHandle) -> ProbeResult<Vec<String>> {
        let value = self
            .driver
            .execute_script(&Script::OptionTexts.render(), Some(handle))?;
        Ok(serde_json::from_value(value)?)
    }

    fn select_on(&self, handle: &ElementHandle, text: &str) -> ProbeResult<bool> {
        let value = self
            .driver
            .execute_script(&Script::SelectByText(text.to_string()).render(), Some(handle))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Select a dropdown option by exact visible text, re-checking a bounded
    /// number of times while the option list populates
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] if the dropdown is absent,
    /// [`ProbeError::OptionNotFound`] if the option never appears
    pub fn select_option(&self, set: &LocatorSet, text: &str, policy: &WaitPolicy) -> ProbeResult<()> {
        let mut trace = self.trace("select_option");
        let Some(handle) = self.locate(&mut trace, set, &Condition::Present, policy)? else {
            return Err(ProbeError::NotFound {
                waited_ms: policy.timeout().as_millis() as u64,
                diagnostic: self.diagnose(set),
            });
        };
        trace.advance(CallState::Acting);
        let attempts = self.settings.option_retries.max(1);
        for attempt in 1..=attempts {
            match self.select_on(&handle, text) {
                Ok(true) => {
                    trace.advance(CallState::Succeeded);
                    return Ok(());
                }
                Ok(false) => debug!(label = %set.label(), option = text, attempt, "option not present yet"),
                Err(err @ ProbeError::SessionLost { .. }) => {
                    trace.advance(CallState::ActionFailed);
                    return Err(err);
                }
                Err(err) => debug!(label = %set.label(), %err, attempt, "select failed"),
            }
            if attempt < attempts {
                std::thread::sleep(policy.poll_interval());
            }
        }
        trace.advance(CallState::ActionFailed);
        Err(ProbeError::OptionNotFound {
            option: text.to_string(),
            diagnostic: self.diagnose(set),
        })
    }

    /// Select the first option whose text starts with `prefix` and return
    /// its text. With [`FallbackPolicy::FirstAvailable`], falls back to the
    /// first option once retries run out.
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] if the dropdown is absent,
    /// [`ProbeError::OptionNotFound`] if no option qualifies
    pub fn select_option_starting_with(
        &self,
        set: &LocatorSet,
        prefix: &str,
        policy: &WaitPolicy,
    ) -> ProbeResult<String> {
        let mut trace = self.trace("select_option_starting_with");
        let Some(handle) = self.locate(&mut trace, set, &Condition::Present, policy)? else {
            return Err(ProbeError::NotFound {
                waited_ms: policy.timeout().as_millis() as u64,
                diagnostic: self.diagnose(set),
            });
        };
        trace.advance(CallState::Acting);
        let attempts = self.settings.option_retries.max(1);
        let mut last_seen = Vec::new();
        for attempt in 1..=attempts {
            match self.options_of(&handle) {
                Ok(options) => {
                    if let Some(choice) = options.iter().find(|o| o.starts_with(prefix)) {
                        match self.select_on(&handle, choice) {
                            Ok(true) => {
                                trace.advance(CallState::Succeeded);
                                return Ok(choice.clone());
                            }
                            Ok(false) => debug!(label = %set.label(), option = %choice, attempt, "option not selectable yet"),
                            Err(err @ ProbeError::SessionLost { .. }) => {
                                trace.advance(CallState::ActionFailed);
                                return Err(err);
                            }
                            Err(err) => debug!(label = %set.label(), %err, attempt, "select failed"),
                        }
                    }
                    last_seen = options;
                }
                Err(err @ ProbeError::SessionLost { .. }) => {
                    trace.advance(CallState::ActionFailed);
                    return Err(err);
                }
                Err(err) => debug!(label = %set.label(), %err, attempt, "options unreadable"),
            }
            if attempt < attempts {
                std::thread::sleep(policy.poll_interval());
            }
        }
        if self.settings.fallback.is_enabled() {
            if let Some(first) = last_seen.first().cloned() {
                match self.select_on(&handle, &first) {
                    Ok(true) => {
                        warn!(label = %set.label(), prefix, fallback = %first, "no option matched, fell back to first");
                        trace.advance(CallState::Succeeded);
                        return Ok(first);
                    }
                    Ok(false) => debug!(label = %set.label(), fallback = %first, "fallback option not selectable"),
                    Err(err @ ProbeError::SessionLost { .. }) => {
                        trace.advance(CallState::ActionFailed);
                        return Err(err);
                    }
                    Err(err) => debug!(label = %set.label(), %err, "fallback select failed"),
                }
            }
        }
        trace.advance(CallState::ActionFailed);
        Err(ProbeError::OptionNotFound {
            option: format!("{prefix}*"),
            diagnostic: self.diagnose(set),
        })
    }

    /// Run `action` up to `max_attempts` times, sleeping per `backoff`
    /// between failures. Errors that cannot change on retry (lost session)
    /// stop immediately. `action` receives the 1-based attempt number.
    pub fn retry_action<T, F>(
        &self,
        label: &str,
        max_attempts: u32,
        backoff: Backoff,
        mut action: F,
    ) -> ActionResult<T>
    where
        F: FnMut(u32) -> ProbeResult<T>,
    {
        if max_attempts == 0 {
            return ActionResult::failure(
                ProbeError::invalid_config(format!("{label}: max_attempts must be at least 1")),
                0,
                None,
            );
        }
        // Screenshots wait for the final attempt
        let outer = self.defer_capture.get();
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.defer_capture.set(outer || attempt < max_attempts);
            let outcome = action(attempt);
            self.defer_capture.set(outer);
            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!(label, attempt, "action succeeded after retry");
                    }
                    return ActionResult::success(value, attempt);
                }
                Err(err) => err,
            };
            if !err.is_retryable() {
                return ActionResult::failure(err, attempt, None);
            }
            if attempt >= max_attempts {
                warn!(label, attempts = attempt, %err, "action exhausted its attempts");
                let artifact = err
                    .diagnostic()
                    .and_then(|d| d.artifact.clone())
                    .or_else(|| if outer { None } else { self.capture(label) });
                return ActionResult::failure(err, attempt, artifact);
            }
            debug!(label, attempt, %err, "action failed, retrying");
            std::thread::sleep(backoff.delay_after(attempt));
        }
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Screenshot tagged with `label`; failures are logged, never raised
    pub fn capture(&self, label: &str) -> Option<PathBuf> {
        let shot = match self.driver.screenshot() {
            Ok(shot) => shot,
            Err(err) => {
                warn!(label, %err, "diagnostic screenshot failed");
                return None;
            }
        };
        match self.settings.artifacts.save_screenshot(label, &shot) {
            Ok(path) => {
                debug!(label, path = %path.display(), "diagnostic screenshot saved");
                Some(path)
            }
            Err(err) => {
                warn!(label, %err, "diagnostic screenshot not written");
                None
            }
        }
    }

    /// URL, title and screenshot under `label`; never fails
    #[must_use]
    pub fn snapshot(&self, label: &str) -> Diagnostic {
        Diagnostic {
            label: label.to_string(),
            locators: String::new(),
            url: self
                .driver
                .current_url()
                .unwrap_or_else(|_| UNAVAILABLE.to_string()),
            title: self
                .driver
                .title()
                .unwrap_or_else(|_| UNAVAILABLE.to_string()),
            artifact: if self.defer_capture.get() {
                debug!(label, "screenshot deferred to the final attempt");
                None
            } else {
                self.capture(label)
            },
        }
    }

    fn diagnose(&self, set: &LocatorSet) -> Box<Diagnostic> {
        Box::new(self.snapshot(&set.label()).with_locators(set.to_string()))
    }

    /// Log title, URL, existence and visibility of `set`
    pub fn dump_debug(&self, label: &str, set: &LocatorSet) {
        let visible = matches!(self.probe(set, &Condition::Visible), Ok(Some(_)));
        info!(
            label,
            title = %self.driver.title().unwrap_or_else(|_| UNAVAILABLE.to_string()),
            url = %self.driver.current_url().unwrap_or_else(|_| UNAVAILABLE.to_string()),
            exists = self.exists(set),
            visible,
            locators = %set,
            "debug dump"
        );
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Whether the session still answers
    #[must_use]
    pub fn is_session_active(&self) -> bool {
        !self.closed.get() && self.driver.current_url().is_ok()
    }

    /// Close the session. Idempotent; a session that is already gone
    /// counts as closed.
    ///
    /// # Errors
    ///
    /// Returns a driver error other than a lost session
    pub fn close(&self) -> ProbeResult<()> {
        if self.closed.replace(true) {
            return Ok(());
        }
        match self.driver.close_session() {
            Ok(()) => Ok(()),
            Err(DriverError::SessionLost(message)) => {
                debug!(%message, "session already gone at teardown");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(%err, "session teardown failed");
        }
    }
}
