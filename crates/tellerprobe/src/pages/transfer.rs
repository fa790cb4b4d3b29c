//! Transfer funds form.

use crate::engine::Engine;
use crate::locator::{Locator, LocatorSet};
use crate::page_object::PageModel;
use crate::result::{ProbeError, ProbeResult};
use tracing::{debug, info};

/// Transfer funds between two of the customer's accounts
#[derive(Debug)]
pub struct TransferPage<'e> {
    engine: &'e Engine,
    from_account: LocatorSet,
    to_account: LocatorSet,
    amount: LocatorSet,
    submit: LocatorSet,
    confirmation: LocatorSet,
    error: LocatorSet,
}

impl<'e> TransferPage<'e> {
    /// Transfer page driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            from_account: LocatorSet::single(Locator::id("fromAccountId")).named("from_account"),
            to_account: LocatorSet::single(Locator::id("toAccountId")).named("to_account"),
            amount: LocatorSet::single(Locator::id("amount")).named("transfer_amount"),
            submit: LocatorSet::single(Locator::xpath("//input[@value='Transfer' or @type='submit']"))
                .named("transfer_button"),
            confirmation: LocatorSet::single(Locator::css("#showResult .title"))
                .or(Locator::xpath("//div[contains(@class,'result')]//h1"))
                .named("transfer_confirmation"),
            error: LocatorSet::single(Locator::css("#rightPanel .error")).named("transfer_error"),
        }
    }

    /// Options of the destination dropdown
    ///
    /// # Errors
    ///
    /// [`ProbeError::NotFound`] if the dropdown is missing
    pub fn to_account_options(&self) -> ProbeResult<Vec<String>> {
        self.engine
            .option_texts(&self.to_account, self.engine.default_policy())
    }

    /// Move `amount` from the account starting with `from` to the one
    /// starting with `to`, or to the first other account when `to` is
    /// `None`. An empty `from` keeps the preselected source. `amount` is
    /// typed verbatim so that invalid input can be exercised.
    ///
    /// # Errors
    ///
    /// [`ProbeError::OptionNotFound`] if an account is not offered,
    /// [`ProbeError::PreconditionUnavailable`] if the destination would be
    /// the source, or an engine error if the form cannot be driven
    pub fn transfer(&self, amount: &str, from: &str, to: Option<&str>) -> ProbeResult<()> {
        self.open()?;
        let policy = self.engine.default_policy();
        let source = if from.is_empty() {
            String::new()
        } else {
            self.engine
                .select_option_starting_with(&self.from_account, from, policy)?
        };
        match to {
            Some(to) => {
                let options = self.to_account_options()?;
                let Some(destination) = options.iter().find(|o| o.starts_with(to)) else {
                    return Err(ProbeError::OptionNotFound {
                        option: to.to_string(),
                        diagnostic: Box::new(
                            self.engine
                                .snapshot(&format!("missing_option_{to}"))
                                .with_locators(self.to_account.to_string()),
                        ),
                    });
                };
                if !source.is_empty() && *destination == source {
                    return Err(ProbeError::precondition(format!(
                        "destination {destination} is the source account"
                    )));
                }
                self.engine.select_option(&self.to_account, destination, policy)?;
            }
            None => {
                let options = self.to_account_options()?;
                if let Some(other) = options.iter().find(|o| !source.is_empty() && **o != source) {
                    self.engine.select_option(&self.to_account, other, policy)?;
                } else if !source.is_empty() {
                    return Err(ProbeError::precondition(format!(
                        "no destination other than {source}"
                    )));
                } else {
                    debug!("keeping preselected destination");
                }
            }
        }
        self.engine.type_text(&self.amount, amount, policy)?;
        self.engine.click(&self.submit, policy)?;
        info!(amount, from = %source, "transfer submitted");
        Ok(())
    }

    /// Confirmation heading reads "Transfer Complete"
    #[must_use]
    pub fn is_transfer_confirmed(&self) -> bool {
        self.engine
            .read(&self.confirmation, self.engine.short_policy())
            .to_lowercase()
            .contains("transfer complete")
    }

    /// Confirmation heading; empty if none showed
    #[must_use]
    pub fn confirmation_text(&self) -> String {
        self.engine.read(&self.confirmation, self.engine.default_policy())
    }

    /// Validation error; empty if none showed
    #[must_use]
    pub fn error(&self) -> String {
        self.engine.read(&self.error, self.engine.default_policy())
    }
}

impl PageModel for TransferPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "transfer.htm"
    }

    fn is_loaded(&self) -> bool {
        let policy = self.engine.short_policy();
        self.engine.is_displayed(&self.from_account, policy)
            && self.engine.is_displayed(&self.to_account, policy)
            && self.engine.is_displayed(&self.submit, policy)
    }
}
