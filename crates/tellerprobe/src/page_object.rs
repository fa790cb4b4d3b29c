//! Page Model contract.
//!
//! A page model maps one screen's semantics onto named operations built from
//! [`Engine`] calls. Its only required check is [`PageModel::is_loaded`], a
//! side-effect-free query using the engine's short policy.
//!
//! Essential actions fail loudly with a typed error. Auxiliary actions (an
//! optional checkbox, a cosmetic link) degrade to a logged no-op. Expected
//! outcomes are returned as `bool` or `Option`, never as errors.

use crate::engine::{Backoff, Engine};
use crate::result::{ProbeError, ProbeResult};
use std::time::Instant;
use tracing::{debug, warn};

/// Contract every page model implements
pub trait PageModel {
    /// Engine the page drives
    fn engine(&self) -> &Engine;

    /// Path of the page relative to the base URL
    fn path(&self) -> &str;

    /// Whether the page is showing; cheap and repeatable
    fn is_loaded(&self) -> bool;

    /// Page name for logs and diagnostics
    fn page_name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Whether the browser's URL points at this page
    fn url_matches(&self) -> bool {
        let path = self.path().trim_start_matches('/');
        let path = path.split('?').next().unwrap_or(path);
        self.engine()
            .current_url()
            .map(|url| url.contains(path))
            .unwrap_or(false)
    }

    /// Navigate to the page and wait until it is loaded, reloading between
    /// attempts
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] if the page never reports loaded,
    /// [`ProbeError::SessionLost`] if the browser went away
    fn open(&self) -> ProbeResult<()> {
        let engine = self.engine();
        let started = Instant::now();
        engine.navigate(self.path())?;
        let label = format!("{}_open", self.page_name());
        engine
            .retry_action(&label, engine.settings().action_attempts, Backoff::None, |attempt| {
                if attempt > 1 {
                    debug!(page = self.page_name(), attempt, "page not loaded, refreshing");
                    engine.refresh()?;
                }
                if self.is_loaded() {
                    Ok(())
                } else {
                    Err(ProbeError::NotFound {
                        waited_ms: started.elapsed().as_millis() as u64,
                        diagnostic: Box::new(engine.snapshot(&format!("{}_not_loaded", self.page_name()))),
                    })
                }
            })
            .into_result()
    }
}

/// Run an auxiliary action; failures are logged and swallowed
pub fn best_effort<F>(engine: &Engine, what: &str, action: F)
where
    F: FnOnce() -> ProbeResult<()>,
{
    match action() {
        Ok(()) => {}
        Err(err @ ProbeError::SessionLost { .. }) => {
            warn!(what, %err, "auxiliary action hit a lost session");
        }
        Err(err) => {
            warn!(what, url = %engine.current_url().unwrap_or_default(), %err, "auxiliary action skipped");
        }
    }
}
