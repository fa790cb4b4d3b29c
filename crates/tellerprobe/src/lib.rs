//! Tellerprobe: resilient page models and data-driven scenarios for
//! end-to-end tests of a banking web application.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Scenario    │   │  Page        │   │  Interaction │   │  Driver      │
//! │  Runner      │──►│  Models      │──►│  Engine      │──►│  (Chromium / │
//! │  (workers)   │   │  (pages::*)  │   │  wait/retry  │   │   mock)      │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//!        │                                      │
//!        ▼                                      ▼
//! ┌──────────────┐                       ┌──────────────┐
//! │  Reporter    │◄──────────────────────│  Diagnostics │
//! │  JSON/HTML/  │                       │  screenshots │
//! │  JUnit       │                       └──────────────┘
//! └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tellerprobe::prelude::*;
//!
//! let driver = MockDriver::new()
//!     .with_element(Locator::id("balance"), MockElement::new("span", "$515.50"));
//! let engine = Engine::new(Box::new(driver), EngineSettings::default());
//! let balance = LocatorSet::single(Locator::id("balance")).or(Locator::css(".balance"));
//! assert_eq!(engine.read(&balance, engine.short_policy()), "$515.50");
//! ```

#![warn(missing_docs)]

mod artifact;
#[cfg(feature = "browser")]
mod browser;
mod config;
mod driver;
mod engine;
mod locator;
mod page_object;
mod reporter;
mod result;
mod runner;
mod scenario;
mod script;
mod wait;

/// Page models for the banking application
pub mod pages;

pub use artifact::ArtifactStore;
#[cfg(feature = "browser")]
pub use browser::{ChromiumConfig, ChromiumDriver, ChromiumFactory};
pub use config::{
    BrowserKind, SuiteConfig, ENV_BASE_URL, ENV_DEFAULT_WAIT_MS, ENV_HEADLESS, ENV_WORKERS,
};
pub use driver::{
    Driver, DriverError, DriverFactory, DriverResult, ElementHandle, MockDriver, MockElement,
    Screenshot,
};
pub use engine::{
    ActionResult, Backoff, CallState, Engine, EngineSettings, FallbackPolicy,
    DEFAULT_ACTION_ATTEMPTS, DEFAULT_OPTION_RETRIES,
};
pub use locator::{Locator, LocatorSet, Query};
pub use page_object::{best_effort, PageModel};
pub use reporter::{Counts, FailureMode, Reporter, ScenarioReport, SuiteReport};
pub use result::{Diagnostic, ErrorKind, ProbeError, ProbeResult};
pub use runner::{RunnerOptions, ScenarioRunner};
pub use scenario::{
    Credentials, MalformedRow, Scenario, ScenarioAction, ScenarioKind, ScenarioPlan, Verdict,
    BALANCE_TOLERANCE,
};
pub use script::Script;
pub use wait::{
    poll_until, Condition, Predicate, WaitPolicy, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_WAIT_TIMEOUT_MS, SETTLE_DELAY_MS, SHORT_WAIT_TIMEOUT_MS,
};

/// Everything a test file usually needs
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::browser::*;
    pub use super::driver::*;
    pub use super::engine::*;
    pub use super::locator::*;
    pub use super::page_object::*;
    pub use super::pages::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::runner::*;
    pub use super::scenario::*;
    pub use super::wait::*;
    pub use super::{ArtifactStore, SuiteConfig};
}
