//! Chromium-backed [`Driver`] over the Chrome `DevTools` Protocol.
//!
//! The CDP client is async; each driver owns a small tokio runtime and blocks
//! on it, so the engine above stays synchronous. Lookups run in the page:
//! matching nodes are tagged with a `data-tellerprobe-id` attribute, and the
//! tag becomes the [`ElementHandle`] id.

use crate::driver::{Driver, DriverError, DriverFactory, DriverResult, ElementHandle, Screenshot};
use crate::locator::{Locator, Query};
use crate::result::{ProbeError, ProbeResult};
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Mutex;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const HANDLE_ATTR: &str = "data-tellerprobe-id";

/// Launch options
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Run without a window
    pub headless: bool,
    /// Chromium sandbox (disable in containers)
    pub sandbox: bool,
    /// Browser binary; auto-detected when `None`
    pub executable: Option<String>,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            executable: None,
            viewport_width: 1280,
            viewport_height: 900,
        }
    }
}

impl ChromiumConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable the sandbox (containers, CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Use a specific browser binary
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable = Some(path.into());
        self
    }
}

fn driver_error(err: &CdpError) -> DriverError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("channel") || lower.contains("closed") || lower.contains("not connected") {
        DriverError::SessionLost(message)
    } else {
        DriverError::Other(message)
    }
}

/// One Chromium process with one page
pub struct ChromiumDriver {
    runtime: Runtime,
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver").finish_non_exhaustive()
    }
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page
    ///
    /// # Errors
    ///
    /// [`ProbeError::Driver`] if the runtime or the browser cannot start
    pub fn launch(config: &ChromiumConfig) -> ProbeResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let mut builder = BrowserConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.executable {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|message| ProbeError::Driver { message })?;

        let (browser, page, handler) = runtime.block_on(async {
            let (browser, mut handler) = Browser::launch(cdp_config).await?;
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            let page = browser.new_page("about:blank").await?;
            Ok::<_, CdpError>((browser, page, handler))
        })
        .map_err(|e| ProbeError::Driver {
            message: format!("chromium launch failed: {e}"),
        })?;
        debug!(headless = config.headless, "chromium launched");

        Ok(Self {
            runtime,
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    fn block<T>(&self, fut: impl Future<Output = Result<T, CdpError>>) -> DriverResult<T> {
        self.runtime.block_on(fut).map_err(|e| driver_error(&e))
    }

    /// Evaluate a function body in the page, returning its JSON result
    fn evaluate(&self, body: &str) -> DriverResult<Value> {
        let expression = format!("JSON.stringify((function() {{\n{body}\n}})())");
        let result = self.block(self.page.evaluate(expression))?;
        decode(result.value())
    }

    fn element(&self, handle: &ElementHandle) -> DriverResult<Element> {
        let selector = format!("[{HANDLE_ATTR}='{}']", handle.id);
        self.runtime
            .block_on(self.page.find_element(selector))
            .map_err(|e| match driver_error(&e) {
                lost @ DriverError::SessionLost(_) => lost,
                _ => DriverError::NoSuchElement(handle.id.clone()),
            })
    }

    /// Call `body` with the element as `this` and as `arguments[0]`
    fn call_on(&self, handle: &ElementHandle, body: &str) -> DriverResult<Value> {
        let element = self.element(handle)?;
        let function = format!(
            "function() {{ return JSON.stringify((function() {{\n{body}\n}}).call(this, this)); }}"
        );
        let returned = self.block(element.call_js_fn(function, false))?;
        decode(returned.result.value.as_ref())
    }
}

fn decode(value: Option<&Value>) -> DriverResult<Value> {
    match value {
        Some(Value::String(json)) => serde_json::from_str(json).map_err(|e| DriverError::Script(e.to_string())),
        _ => Ok(Value::Null),
    }
}

fn lookup_script(locator: &Locator) -> String {
    let query = match locator.to_query() {
        Query::Css(css) => format!(
            "Array.from(document.querySelectorAll({}))",
            Value::String(css)
        ),
        Query::XPath(xpath) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             const out = []; for (let i = 0; i < r.snapshotLength; i++) {{ out.push(r.snapshotItem(i)); }} return out; }})()",
            Value::String(xpath)
        ),
    };
    format!(
        "window.__tellerprobeNext = window.__tellerprobeNext || 0;\n\
         return {query}.filter(el => el.nodeType === 1).map(el => {{\n\
           if (!el.hasAttribute('{HANDLE_ATTR}')) {{ el.setAttribute('{HANDLE_ATTR}', 'tp-' + (window.__tellerprobeNext++)); }}\n\
           return [el.getAttribute('{HANDLE_ATTR}'), el.tagName.toLowerCase()];\n\
         }});"
    )
}

impl Driver for ChromiumDriver {
    fn navigate(&self, url: &str) -> DriverResult<()> {
        let _ = self.block(self.page.goto(url))?;
        Ok(())
    }

    fn refresh(&self) -> DriverResult<()> {
        let _ = self.block(self.page.reload())?;
        Ok(())
    }

    fn find_candidates(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>> {
        let found = self.evaluate(&lookup_script(locator))?;
        let pairs: Vec<(String, String)> =
            serde_json::from_value(found).map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(pairs
            .into_iter()
            .map(|(id, tag)| ElementHandle::new(id, tag))
            .collect())
    }

    fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let visible = self.call_on(
            handle,
            "const r = this.getBoundingClientRect(); const s = getComputedStyle(this);\n\
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';",
        )?;
        Ok(visible.as_bool().unwrap_or(false))
    }

    fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let enabled = self.call_on(handle, "return !this.disabled;")?;
        Ok(enabled.as_bool().unwrap_or(false))
    }

    fn is_editable(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let editable = self.call_on(handle, "return !this.disabled && !this.readOnly;")?;
        Ok(editable.as_bool().unwrap_or(false))
    }

    fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        let element = self.element(handle)?;
        self.runtime
            .block_on(element.click())
            .map(|_| ())
            .map_err(|e| match driver_error(&e) {
                lost @ DriverError::SessionLost(_) => lost,
                DriverError::Other(message) => DriverError::Intercepted(message),
                other => other,
            })
    }

    fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        let writable = self.call_on(
            handle,
            "if (this.readOnly || this.disabled) { return false; }\n\
             this.focus(); this.value = '';\n\
             this.dispatchEvent(new Event('input', { bubbles: true }));\n\
             return true;",
        )?;
        if writable.as_bool() != Some(true) {
            return Err(DriverError::Other(format!("{} is read-only", handle.id)));
        }
        if text.is_empty() {
            return Ok(());
        }
        let element = self.element(handle)?;
        let _ = self.block(element.type_str(text))?;
        Ok(())
    }

    fn get_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        let text = self.call_on(handle, "return (this.innerText || this.value || '').trim();")?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    fn execute_script(&self, script: &str, handle: Option<&ElementHandle>) -> DriverResult<Value> {
        match handle {
            Some(handle) => self.call_on(handle, script),
            None => self.evaluate(script),
        }
    }

    fn screenshot(&self) -> DriverResult<Screenshot> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self.block(self.page.execute(params))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| DriverError::Other(format!("screenshot payload: {e}")))?;
        Ok(Screenshot::new(data))
    }

    fn current_url(&self) -> DriverResult<String> {
        Ok(self.block(self.page.url())?.unwrap_or_default())
    }

    fn title(&self) -> DriverResult<String> {
        Ok(self.block(self.page.get_title())?.unwrap_or_default())
    }

    fn close_session(&self) -> DriverResult<()> {
        let mut browser = self
            .browser
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let closed = self.runtime.block_on(async {
            browser.close().await?;
            browser.wait().await.map_err(CdpError::from)
        });
        self.handler.abort();
        match closed {
            Ok(_) => Ok(()),
            Err(err) => match driver_error(&err) {
                DriverError::SessionLost(message) => Err(DriverError::SessionLost(message)),
                other => {
                    warn!(%other, "chromium did not shut down cleanly");
                    Err(other)
                }
            },
        }
    }
}

/// Launches one [`ChromiumDriver`] per worker
#[derive(Debug, Clone, Default)]
pub struct ChromiumFactory {
    config: ChromiumConfig,
}

impl ChromiumFactory {
    /// Factory launching with `config`
    #[must_use]
    pub const fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }
}

impl DriverFactory for ChromiumFactory {
    fn create(&self) -> ProbeResult<Box<dyn Driver>> {
        Ok(Box::new(ChromiumDriver::launch(&self.config)?))
    }
}
