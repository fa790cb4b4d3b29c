//! Customer care contact form.

use crate::engine::Engine;
use crate::locator::{Locator, LocatorSet};
use crate::page_object::PageModel;
use crate::result::ProbeResult;
use tracing::info;

/// Customer care form
#[derive(Debug)]
pub struct ContactPage<'e> {
    engine: &'e Engine,
    marker: LocatorSet,
    name: LocatorSet,
    email: LocatorSet,
    phone: LocatorSet,
    message: LocatorSet,
    submit: LocatorSet,
    success: LocatorSet,
    errors: LocatorSet,
}

impl<'e> ContactPage<'e> {
    /// Contact page driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            marker: LocatorSet::single(Locator::id("contactForm"))
                .or(Locator::xpath("//h1[contains(normalize-space(.),'Customer Care')]"))
                .named("contact_form"),
            name: LocatorSet::single(Locator::id("name")).named("contact_name"),
            email: LocatorSet::single(Locator::id("email")).named("contact_email"),
            phone: LocatorSet::single(Locator::id("phone")).named("contact_phone"),
            message: LocatorSet::single(Locator::id("message")).named("contact_message"),
            submit: LocatorSet::single(Locator::xpath(
                "//input[@value='Send to Customer Care' or @value='Send' or @type='submit']",
            ))
            .named("send_button"),
            success: LocatorSet::single(Locator::xpath("//div[@id='rightPanel']/p[contains(.,'Thank you')]"))
                .or(Locator::css("#rightPanel .result"))
                .named("contact_success"),
            errors: LocatorSet::single(Locator::css("#rightPanel .error")).named("contact_errors"),
        }
    }

    /// Fill every field (blank values included) and send
    ///
    /// # Errors
    ///
    /// Returns error if the form cannot be driven
    pub fn submit(&self, name: &str, email: &str, phone: &str, message: &str) -> ProbeResult<()> {
        self.open()?;
        let policy = self.engine.default_policy();
        self.engine.type_text(&self.name, name, policy)?;
        self.engine.type_text(&self.email, email, policy)?;
        self.engine.type_text(&self.phone, phone, policy)?;
        self.engine.type_text(&self.message, message, policy)?;
        self.engine.click(&self.submit, policy)?;
        info!(name, "contact form sent");
        Ok(())
    }

    fn success_text(&self) -> String {
        self.engine.read(&self.success, self.engine.short_policy())
    }

    /// Success text, else the validation messages; empty if neither showed
    #[must_use]
    pub fn response(&self) -> String {
        let success = self.success_text();
        if !success.is_empty() {
            return success;
        }
        self.engine
            .read_all(&self.errors, self.engine.default_policy())
            .into_iter()
            .filter(|e| !e.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The application acknowledged the message
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        !self.success_text().is_empty()
    }
}

impl PageModel for ContactPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "contact.htm"
    }

    fn is_loaded(&self) -> bool {
        self.engine
            .is_displayed(&self.marker, self.engine.short_policy())
    }
}
