//! Left-hand services menu and header links.

use crate::engine::Engine;
use crate::locator::{xpath_string, Locator, LocatorSet};
use crate::page_object::PageModel;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Destinations in the services menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavLink {
    /// Accounts overview
    AccountsOverview,
    /// Transfer funds form
    TransferFunds,
    /// Loan request form
    RequestLoan,
    /// Customer care form
    ContactUs,
    /// Transaction search
    FindTransactions,
}

impl NavLink {
    /// Every menu destination
    pub const ALL: [Self; 5] = [
        Self::AccountsOverview,
        Self::TransferFunds,
        Self::RequestLoan,
        Self::ContactUs,
        Self::FindTransactions,
    ];

    /// Link text shown in the menu
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::AccountsOverview => "Accounts Overview",
            Self::TransferFunds => "Transfer Funds",
            Self::RequestLoan => "Request Loan",
            Self::ContactUs => "Contact Us",
            Self::FindTransactions => "Find Transactions",
        }
    }

    /// Page the link leads to
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::AccountsOverview => "overview.htm",
            Self::TransferFunds => "transfer.htm",
            Self::RequestLoan => "requestloan.htm",
            Self::ContactUs => "contact.htm",
            Self::FindTransactions => "findtrans.htm",
        }
    }
}

impl FromStr for NavLink {
    type Err = ProbeError;

    /// Accepts the link text or its snake_case name, ignoring case, spaces,
    /// `_` and `-`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squash = |text: &str| -> String {
            text.chars()
                .filter(|c| !matches!(c, ' ' | '_' | '-'))
                .flat_map(char::to_lowercase)
                .collect()
        };
        let wanted = squash(s);
        Self::ALL
            .into_iter()
            .find(|link| squash(link.text()) == wanted)
            .ok_or_else(|| ProbeError::invalid_config(format!("unknown menu link '{}'", s.trim())))
    }
}

impl fmt::Display for NavLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Site navigation
#[derive(Debug)]
pub struct NavigationPage<'e> {
    engine: &'e Engine,
    home: LocatorSet,
}

impl<'e> NavigationPage<'e> {
    /// Navigation driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            home: LocatorSet::single(Locator::css("div#headerPanel a[href*='index.htm']"))
                .or(Locator::xpath(
                    "//a[contains(@href,'index.htm') or contains(@class,'brand') or contains(@class,'logo')]",
                ))
                .named("home_link"),
        }
    }

    /// Follow a services menu link
    ///
    /// # Errors
    ///
    /// Returns error if the link is not clickable
    pub fn go_to(&self, link: NavLink) -> ProbeResult<()> {
        let set = LocatorSet::single(Locator::link_text(link.text()))
            .or(Locator::css(format!("a[href*='{}']", link.path())))
            .named(format!("nav_{}", link.path().trim_end_matches(".htm")));
        self.engine.click(&set, self.engine.default_policy())?;
        debug!(link = link.text(), "navigated");
        Ok(())
    }

    /// Click any link whose text contains `text`
    ///
    /// # Errors
    ///
    /// Returns error if no such link becomes clickable
    pub fn click_nav_link(&self, text: &str) -> ProbeResult<()> {
        let set = LocatorSet::single(Locator::xpath(format!(
            "//a[contains(normalize-space(.),{})]",
            xpath_string(text)
        )))
        .or(Locator::partial_link_text(text))
        .named(format!("nav_link_{text}"));
        self.engine.settle();
        self.engine.click(&set, self.engine.default_policy())
    }

    /// Back to the landing page through the logo
    ///
    /// # Errors
    ///
    /// Returns error if the home link is not clickable
    pub fn go_home(&self) -> ProbeResult<()> {
        self.engine.click(&self.home, self.engine.default_policy())
    }
}

impl PageModel for NavigationPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "index.htm"
    }

    fn is_loaded(&self) -> bool {
        self.engine
            .is_displayed(&self.home, self.engine.short_policy())
    }
}
