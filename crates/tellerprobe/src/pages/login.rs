//! Login form on the landing page.

use crate::engine::{Backoff, Engine};
use crate::locator::{Locator, LocatorSet};
use crate::page_object::{best_effort, PageModel};
use crate::result::{ProbeError, ProbeResult};
use tracing::{debug, info};

const ACCOUNTS_HEADER: &str = "//h1[contains(translate(normalize-space(.),'abcdefghijklmnopqrstuvwxyz','ABCDEFGHIJKLMNOPQRSTUVWXYZ'),'ACCOUNTS')]";

/// Login form
#[derive(Debug)]
pub struct LoginPage<'e> {
    engine: &'e Engine,
    username: LocatorSet,
    password: LocatorSet,
    masked_password: LocatorSet,
    submit: LocatorSet,
    error: LocatorSet,
    logged_in: LocatorSet,
    logout: LocatorSet,
    remember_me: LocatorSet,
}

impl<'e> LoginPage<'e> {
    /// Login page driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            username: LocatorSet::single(Locator::name("username")).named("username_field"),
            password: LocatorSet::single(Locator::name("password")).named("password_field"),
            masked_password: LocatorSet::single(Locator::css("input[name='password'][type='password']"))
                .named("masked_password"),
            submit: LocatorSet::single(Locator::css("input[type='submit'][value='Log In']"))
                .or(Locator::xpath("//form[@name='login']//input[@type='submit']"))
                .named("login_button"),
            error: LocatorSet::single(Locator::css("#rightPanel .error"))
                .or(Locator::css("#leftPanel p"))
                .named("login_error"),
            logged_in: LocatorSet::single(Locator::xpath(ACCOUNTS_HEADER))
                .or(Locator::link_text("Log Out"))
                .named("post_login_marker"),
            logout: LocatorSet::single(Locator::link_text("Log Out")).named("logout_link"),
            remember_me: LocatorSet::single(Locator::css("input[type='checkbox'][name*='remember']"))
                .named("remember_me"),
        }
    }

    fn enter_credentials(&self, username: &str, password: &str) -> ProbeResult<()> {
        let policy = self.engine.default_policy();
        self.engine.type_text(&self.username, username, policy)?;
        self.engine.type_text(&self.password, password, policy)
    }

    /// Submit credentials. Submission is retried with credential re-entry
    /// after a reload while the page shows neither the account view nor an
    /// error. Rejected credentials are not an error here; check
    /// [`LoginPage::is_login_successful`] and [`LoginPage::error_message`].
    ///
    /// # Errors
    ///
    /// Returns error if the form cannot be driven or never reacts
    pub fn login(&self, username: &str, password: &str) -> ProbeResult<()> {
        self.open()?;
        info!(username, "logging in");
        self.engine
            .retry_action(
                "login_submit",
                self.engine.settings().action_attempts,
                Backoff::Fixed(self.engine.settings().settle_delay),
                |attempt| {
                    if attempt > 1 {
                        debug!(attempt, "login did not settle, re-entering credentials");
                        self.engine.refresh()?;
                    }
                    self.enter_credentials(username, password)?;
                    self.engine.click(&self.submit, self.engine.default_policy())?;
                    if self.is_login_successful() || self.is_error_visible() {
                        Ok(())
                    } else {
                        Err(ProbeError::assertion("login form did not react"))
                    }
                },
            )
            .into_result()
    }

    /// Account header or logout link showing, or the browser landed on the
    /// overview
    #[must_use]
    pub fn is_login_successful(&self) -> bool {
        let url = self.engine.current_url().unwrap_or_default().to_lowercase();
        let title = self.engine.title().unwrap_or_default().to_lowercase();
        url.contains("overview")
            || title.contains("accounts")
            || self.engine.is_displayed(&self.logged_in, self.engine.short_policy())
    }

    /// Whether a login error is showing
    #[must_use]
    pub fn is_error_visible(&self) -> bool {
        self.engine.is_displayed(&self.error, self.engine.short_policy())
    }

    /// Error text; empty if none appears
    #[must_use]
    pub fn error_message(&self) -> String {
        self.engine.read(&self.error, self.engine.default_policy())
    }

    /// Whether the password input hides what is typed
    #[must_use]
    pub fn is_password_masked(&self) -> bool {
        self.engine.exists(&self.masked_password)
    }

    /// Tick "remember me" where the application offers it
    pub fn click_remember_me(&self) {
        if !self.engine.exists(&self.remember_me) {
            debug!("no remember-me checkbox on this version");
            return;
        }
        best_effort(self.engine, "remember me", || {
            self.engine.click(&self.remember_me, self.engine.short_policy())
        });
    }

    /// Log out through the link, falling back to the logout URL
    ///
    /// # Errors
    ///
    /// Returns error only if the session is gone
    pub fn logout(&self) -> ProbeResult<()> {
        match self.engine.click(&self.logout, self.engine.short_policy()) {
            Ok(()) => Ok(()),
            Err(err @ ProbeError::SessionLost { .. }) => Err(err),
            Err(err) => {
                debug!(%err, "logout link unavailable, navigating directly");
                self.engine.navigate("logout.htm")
            }
        }
    }

    /// End any session left over from an earlier scenario on this browser
    ///
    /// # Errors
    ///
    /// Returns error if the logout page cannot be loaded
    pub fn ensure_logged_out(&self) -> ProbeResult<()> {
        self.engine.navigate("logout.htm")
    }
}

impl PageModel for LoginPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "index.htm"
    }

    fn is_loaded(&self) -> bool {
        let policy = self.engine.short_policy();
        self.engine.is_displayed(&self.username, policy)
            && self.engine.is_displayed(&self.password, policy)
            && self.engine.is_displayed(&self.submit, policy)
    }
}
