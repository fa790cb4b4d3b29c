//! Driver capability interface.
//!
//! The engine consumes a [`Driver`]; it never implements browser automation
//! itself. [`MockDriver`] is a scripted in-memory implementation for tests,
//! and `browser::ChromiumDriver` (feature `browser`) drives a real Chromium.
//!
//! Methods take `&self`. A driver is owned by exactly one worker, so
//! implementations only need interior mutability, not cross-thread sharing.

use crate::locator::Locator;
use crate::result::{ProbeError, ProbeResult};
use crate::script::Script;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Failures reported by a driver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The browser session is closed or unreachable
    #[error("session lost: {0}")]
    SessionLost(String),
    /// The handle no longer refers to an attached element
    #[error("no such element: {0}")]
    NoSuchElement(String),
    /// Another element would receive the click
    #[error("click intercepted: {0}")]
    Intercepted(String),
    /// Script evaluation failed
    #[error("script failed: {0}")]
    Script(String),
    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl From<DriverError> for ProbeError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::SessionLost(message) => Self::SessionLost { message },
            other => Self::Driver {
                message: other.to_string(),
            },
        }
    }
}

/// Opaque reference to an element found by a driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: String,
    /// Element tag name, lowercase
    pub tag_name: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
        }
    }
}

/// Screenshot data
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Encoded image bytes (PNG)
    pub data: Vec<u8>,
    /// Capture time
    pub timestamp: SystemTime,
}

impl Screenshot {
    /// PNG file signature
    pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: SystemTime::now(),
        }
    }

    /// Get size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if data starts with the PNG signature
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.data.starts_with(&Self::PNG_SIGNATURE)
    }
}

/// Browser capabilities consumed by the interaction engine
pub trait Driver: Send {
    /// Load a URL
    fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Reload the current page
    fn refresh(&self) -> DriverResult<()>;

    /// All elements currently matching `locator`, in document order
    fn find_candidates(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>>;

    /// Whether the element is rendered and visible
    fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Whether the element accepts input
    fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Whether typing into the element would take effect: enabled and not read-only
    fn is_editable(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.is_enabled(handle)
    }

    /// Native click
    fn click(&self, handle: &ElementHandle) -> DriverResult<()>;

    /// Clear the element's content, then type `text`
    fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Rendered text of the element
    fn get_text(&self, handle: &ElementHandle) -> DriverResult<String>;

    /// Run `script`; `handle`, when given, is `arguments[0]`
    fn execute_script(
        &self,
        script: &str,
        handle: Option<&ElementHandle>,
    ) -> DriverResult<serde_json::Value>;

    /// Capture the viewport
    fn screenshot(&self) -> DriverResult<Screenshot>;

    /// URL of the current page
    fn current_url(&self) -> DriverResult<String>;

    /// Title of the current page
    fn title(&self) -> DriverResult<String>;

    /// End the session
    fn close_session(&self) -> DriverResult<()>;
}

impl<D: Driver + Sync + ?Sized> Driver for std::sync::Arc<D> {
    fn navigate(&self, url: &str) -> DriverResult<()> {
        (**self).navigate(url)
    }

    fn refresh(&self) -> DriverResult<()> {
        (**self).refresh()
    }

    fn find_candidates(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>> {
        (**self).find_candidates(locator)
    }

    fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool> {
        (**self).is_visible(handle)
    }

    fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        (**self).is_enabled(handle)
    }

    fn is_editable(&self, handle: &ElementHandle) -> DriverResult<bool> {
        (**self).is_editable(handle)
    }

    fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        (**self).click(handle)
    }

    fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        (**self).clear_and_type(handle, text)
    }

    fn get_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        (**self).get_text(handle)
    }

    fn execute_script(
        &self,
        script: &str,
        handle: Option<&ElementHandle>,
    ) -> DriverResult<serde_json::Value> {
        (**self).execute_script(script, handle)
    }

    fn screenshot(&self) -> DriverResult<Screenshot> {
        (**self).screenshot()
    }

    fn current_url(&self) -> DriverResult<String> {
        (**self).current_url()
    }

    fn title(&self) -> DriverResult<String> {
        (**self).title()
    }

    fn close_session(&self) -> DriverResult<()> {
        (**self).close_session()
    }
}

impl std::fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Driver")
    }
}

/// Creates one driver per worker
pub trait DriverFactory: Send + Sync {
    /// Open a new browser session
    fn create(&self) -> ProbeResult<Box<dyn Driver>>;
}

impl<F> DriverFactory for F
where
    F: Fn() -> ProbeResult<Box<dyn Driver>> + Send + Sync,
{
    fn create(&self) -> ProbeResult<Box<dyn Driver>> {
        self()
    }
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// Element scripted into a [`MockDriver`]
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Tag name
    pub tag_name: String,
    /// Rendered text
    pub text: String,
    /// Visible once present
    pub visible: bool,
    /// Accepts input
    pub enabled: bool,
    /// Becomes present this long after the driver is created
    pub appears_after: Duration,
    /// Native click fails with [`DriverError::Intercepted`]
    pub click_intercepted: bool,
    /// Scripted click fails too
    pub script_click_fails: bool,
    /// Stays disabled until this long after the driver is created
    pub enabled_after: Duration,
    /// Typing fails
    pub read_only: bool,
    /// Options of a `<select>`
    pub options: Vec<String>,
    /// Options only show up after this delay
    pub options_after: Duration,
    /// Selections that fail with a script error before one succeeds
    pub select_failures: u32,
}

impl MockElement {
    /// Visible, enabled element with text
    #[must_use]
    pub fn new(tag_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            text: text.into(),
            visible: true,
            enabled: true,
            appears_after: Duration::ZERO,
            enabled_after: Duration::ZERO,
            click_intercepted: false,
            script_click_fails: false,
            read_only: false,
            options: Vec::new(),
            options_after: Duration::ZERO,
            select_failures: 0,
        }
    }

    /// A `<select>` with the given option texts
    #[must_use]
    pub fn select<S: Into<String>>(options: impl IntoIterator<Item = S>) -> Self {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::new("select", "")
        }
    }

    /// Present but hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Present and visible but disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Disabled until a delay has passed
    #[must_use]
    pub fn enabled_after(mut self, delay: Duration) -> Self {
        self.enabled_after = delay;
        self
    }

    /// Attach after a delay
    #[must_use]
    pub fn appearing_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    /// Populate options after a delay
    #[must_use]
    pub fn options_after(mut self, delay: Duration) -> Self {
        self.options_after = delay;
        self
    }

    /// Make the native click fail
    #[must_use]
    pub fn intercepted(mut self) -> Self {
        self.click_intercepted = true;
        self
    }

    /// Make both native and scripted clicks fail
    #[must_use]
    pub fn unclickable(mut self) -> Self {
        self.click_intercepted = true;
        self.script_click_fails = true;
        self
    }

    /// Fail the next `count` selections with a script error
    #[must_use]
    pub fn failing_selects(mut self, count: u32) -> Self {
        self.select_failures = count;
        self
    }

    /// Make typing fail
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[derive(Debug)]
struct MockEntry {
    locator: Locator,
    handle: ElementHandle,
    element: MockElement,
    typed: Option<String>,
    selected: Option<String>,
    clicks: usize,
}

#[derive(Debug, Default)]
struct MockState {
    entries: Vec<MockEntry>,
    url: String,
    title: String,
    history: Vec<String>,
    closed: bool,
    fail_screenshots: bool,
    script_results: BTreeMap<String, serde_json::Value>,
}

/// Scripted in-memory driver for tests
#[derive(Debug)]
pub struct MockDriver {
    created: Instant,
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create an empty mock driver on `about:blank`
    #[must_use]
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            state: Mutex::new(MockState {
                url: "about:blank".to_string(),
                ..MockState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register an element under a locator
    #[must_use]
    pub fn with_element(self, locator: Locator, element: MockElement) -> Self {
        {
            let mut state = self.state();
            let id = format!("mock-{}", state.entries.len());
            let handle = ElementHandle::new(id, element.tag_name.clone());
            state.entries.push(MockEntry {
                locator,
                handle,
                element,
                typed: None,
                selected: None,
                clicks: 0,
            });
        }
        self
    }

    /// Set the page title
    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.state().title = title.into();
        self
    }

    /// Answer a non-engine script with a fixed value
    #[must_use]
    pub fn with_script_result(self, script: impl Into<String>, value: serde_json::Value) -> Self {
        let _ = self.state().script_results.insert(script.into(), value);
        self
    }

    /// Make screenshot capture fail
    #[must_use]
    pub fn with_failing_screenshots(self) -> Self {
        self.state().fail_screenshots = true;
        self
    }

    /// Simulate the browser going away
    pub fn lose_session(&self) {
        self.state().closed = true;
    }

    /// Method names in call order
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    /// Check if a method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// Count calls to a method
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.state().history.iter().filter(|m| *m == method).count()
    }

    /// Text typed into the element registered under `locator`
    #[must_use]
    pub fn typed_text(&self, locator: &Locator) -> Option<String> {
        self.state()
            .entries
            .iter()
            .find(|e| &e.locator == locator)
            .and_then(|e| e.typed.clone())
    }

    /// Option selected on the element registered under `locator`
    #[must_use]
    pub fn selected_option(&self, locator: &Locator) -> Option<String> {
        self.state()
            .entries
            .iter()
            .find(|e| &e.locator == locator)
            .and_then(|e| e.selected.clone())
    }

    /// Clicks that landed on the element registered under `locator`
    #[must_use]
    pub fn clicks_on(&self, locator: &Locator) -> usize {
        self.state()
            .entries
            .iter()
            .filter(|e| &e.locator == locator)
            .map(|e| e.clicks)
            .sum()
    }

    fn enter(&self, method: &str) -> DriverResult<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.history.push(method.to_string());
        if state.closed {
            return Err(DriverError::SessionLost("mock session closed".to_string()));
        }
        Ok(state)
    }

    fn entry<'s>(state: &'s mut MockState, handle: &ElementHandle) -> DriverResult<&'s mut MockEntry> {
        state
            .entries
            .iter_mut()
            .find(|e| e.handle == *handle)
            .ok_or_else(|| DriverError::NoSuchElement(handle.id.clone()))
    }

    fn options_of(&self, entry: &MockEntry) -> Vec<String> {
        if self.created.elapsed() >= entry.element.options_after {
            entry.element.options.clone()
        } else {
            Vec::new()
        }
    }
}

impl Driver for MockDriver {
    fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.enter("navigate")?;
        state.url = url.to_string();
        Ok(())
    }

    fn refresh(&self) -> DriverResult<()> {
        let _state = self.enter("refresh")?;
        Ok(())
    }

    fn find_candidates(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>> {
        let state = self.enter("find_candidates")?;
        let elapsed = self.created.elapsed();
        Ok(state
            .entries
            .iter()
            .filter(|e| &e.locator == locator && elapsed >= e.element.appears_after)
            .map(|e| e.handle.clone())
            .collect())
    }

    fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.enter("is_visible")?;
        Ok(Self::entry(&mut state, handle)?.element.visible)
    }

    fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.enter("is_enabled")?;
        let element = &Self::entry(&mut state, handle)?.element;
        Ok(element.enabled && self.created.elapsed() >= element.enabled_after)
    }

    fn is_editable(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.enter("is_editable")?;
        let element = &Self::entry(&mut state, handle)?.element;
        Ok(element.enabled && !element.read_only && self.created.elapsed() >= element.enabled_after)
    }

    fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        let mut state = self.enter("click")?;
        let entry = Self::entry(&mut state, handle)?;
        if entry.element.click_intercepted {
            return Err(DriverError::Intercepted(format!("{} is covered", handle.id)));
        }
        entry.clicks += 1;
        Ok(())
    }

    fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        let mut state = self.enter("clear_and_type")?;
        let entry = Self::entry(&mut state, handle)?;
        let enabled = entry.element.enabled && self.created.elapsed() >= entry.element.enabled_after;
        if entry.element.read_only || !enabled {
            return Err(DriverError::Other(format!("{} is read-only", handle.id)));
        }
        entry.typed = Some(text.to_string());
        Ok(())
    }

    fn get_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        let mut state = self.enter("get_text")?;
        Ok(Self::entry(&mut state, handle)?.element.text.clone())
    }

    fn execute_script(
        &self,
        script: &str,
        handle: Option<&ElementHandle>,
    ) -> DriverResult<serde_json::Value> {
        let mut state = self.enter("execute_script")?;
        let Some(known) = Script::recognize(script) else {
            return Ok(state
                .script_results
                .get(script)
                .cloned()
                .unwrap_or(serde_json::Value::Null));
        };
        let handle = handle.ok_or_else(|| DriverError::Script("missing element".to_string()))?;
        let entry = Self::entry(&mut state, handle)?;
        match known {
            Script::Click => {
                if entry.element.script_click_fails {
                    return Err(DriverError::Script("click() had no effect".to_string()));
                }
                entry.clicks += 1;
                Ok(serde_json::Value::Bool(true))
            }
            Script::OptionTexts => Ok(serde_json::json!(self.options_of(entry))),
            Script::SelectByText(text) => {
                if entry.element.select_failures > 0 {
                    entry.element.select_failures -= 1;
                    return Err(DriverError::Script("select raised".to_string()));
                }
                let found = self.options_of(entry).contains(&text);
                if found {
                    entry.selected = Some(text);
                }
                Ok(serde_json::Value::Bool(found))
            }
            Script::SelectedText => Ok(serde_json::json!(entry.selected.clone().unwrap_or_default())),
        }
    }

    fn screenshot(&self) -> DriverResult<Screenshot> {
        let state = self.enter("screenshot")?;
        if state.fail_screenshots {
            return Err(DriverError::Other("screenshot unsupported".to_string()));
        }
        Ok(Screenshot::new(Screenshot::PNG_SIGNATURE.to_vec()))
    }

    fn current_url(&self) -> DriverResult<String> {
        Ok(self.enter("current_url")?.url.clone())
    }

    fn title(&self) -> DriverResult<String> {
        Ok(self.enter("title")?.title.clone())
    }

    fn close_session(&self) -> DriverResult<()> {
        let mut state = self.enter("close_session")?;
        state.closed = true;
        Ok(())
    }
}
