//! Accounts overview and per-account activity.

use super::{parse_amount, TransactionTable};
use crate::engine::{Backoff, Engine};
use crate::locator::{xpath_string, Locator, LocatorSet};
use crate::page_object::PageModel;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

const ACCOUNT_LINKS: &str = "//table[@id='accountTable']//tbody/tr/td[1]/a";
const ACCOUNT_BALANCES: &str = "//table[@id='accountTable']//tbody/tr[td/a]/td[2]";

/// Attempts to open new accounts before giving up on a precondition
const ACCOUNT_CREATION_ATTEMPTS: u32 = 3;

fn account_link(id: &str) -> LocatorSet {
    LocatorSet::single(Locator::xpath(format!(
        "//table[@id='accountTable']//a[normalize-space(.)={}]",
        xpath_string(id)
    )))
    .named(format!("account_link_{id}"))
}

fn balance_cell(id: &str) -> LocatorSet {
    LocatorSet::single(Locator::xpath(format!(
        "//table[@id='accountTable']//tr[td/a[normalize-space(.)={}]]/td[2]",
        xpath_string(id)
    )))
    .named(format!("balance_{id}"))
}

// =============================================================================
// OVERVIEW
// =============================================================================

/// Accounts overview: one row per account with its balance
#[derive(Debug)]
pub struct AccountOverviewPage<'e> {
    engine: &'e Engine,
    marker: LocatorSet,
    account_links: LocatorSet,
    balances: LocatorSet,
    first_account: LocatorSet,
    open_new_account: LocatorSet,
    open_account_button: LocatorSet,
    new_account_id: LocatorSet,
}

impl<'e> AccountOverviewPage<'e> {
    /// Overview page driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            marker: LocatorSet::single(Locator::id("accountTable"))
                .or(Locator::xpath("//h1[contains(normalize-space(.),'Accounts Overview')]"))
                .named("accounts_overview"),
            account_links: LocatorSet::single(Locator::xpath(ACCOUNT_LINKS)).named("account_links"),
            balances: LocatorSet::single(Locator::xpath(ACCOUNT_BALANCES)).named("account_balances"),
            first_account: LocatorSet::single(Locator::xpath(format!("({ACCOUNT_LINKS})[1]")))
                .named("first_account"),
            open_new_account: LocatorSet::single(Locator::link_text("Open New Account"))
                .named("open_new_account_link"),
            open_account_button: LocatorSet::single(Locator::css(
                "input[type='button'][value='Open New Account']",
            ))
            .named("open_account_button"),
            new_account_id: LocatorSet::single(Locator::id("newAccountId")).named("new_account_id"),
        }
    }

    /// Numeric account ids listed in the table
    #[must_use]
    pub fn account_ids(&self) -> Vec<String> {
        self.engine
            .read_all(&self.account_links, self.engine.default_policy())
            .into_iter()
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .collect()
    }

    /// Balance shown for `id`; `None` if the row is missing or unparseable
    #[must_use]
    pub fn balance_of(&self, id: &str) -> Option<f64> {
        let raw = self.engine.read(&balance_cell(id), self.engine.short_policy());
        let balance = parse_amount(&raw);
        debug!(account = id, raw = %raw, ?balance, "balance read");
        balance
    }

    /// Accounts whose balance is at least `min`
    #[must_use]
    pub fn usable_accounts(&self, min: f64) -> Vec<String> {
        self.account_ids()
            .into_iter()
            .filter(|id| self.balance_of(id).is_some_and(|b| b >= min))
            .collect()
    }

    /// Sum of all listed balances
    #[must_use]
    pub fn total_balance(&self) -> f64 {
        self.engine
            .read_all(&self.balances, self.engine.short_policy())
            .iter()
            .filter_map(|b| parse_amount(b))
            .sum()
    }

    /// Make sure at least `n` accounts exist, opening new ones if needed
    ///
    /// # Errors
    ///
    /// [`ProbeError::PreconditionUnavailable`] if the accounts could not be
    /// created
    pub fn ensure_accounts(&self, n: usize) -> ProbeResult<Vec<String>> {
        let mut accounts = self.account_ids();
        let mut attempts = 0;
        while accounts.len() < n && attempts < ACCOUNT_CREATION_ATTEMPTS {
            attempts += 1;
            info!(have = accounts.len(), want = n, attempt = attempts, "opening a new account");
            let opened = self.open_new_account();
            if let Err(err) = opened {
                if err.is_skip() {
                    return Err(err);
                }
                warn!(%err, "opening an account failed");
            }
            self.open()?;
            accounts = self.account_ids();
        }
        if accounts.len() < n {
            return Err(ProbeError::precondition(format!(
                "needed {n} accounts, found {} after {attempts} attempts",
                accounts.len()
            )));
        }
        Ok(accounts)
    }

    fn open_new_account(&self) -> ProbeResult<String> {
        let policy = self.engine.default_policy();
        self.engine.click(&self.open_new_account, policy)?;
        self.engine.click(&self.open_account_button, policy)?;
        self.engine.wait_for(&self.new_account_id, policy)?;
        Ok(self.engine.read(&self.new_account_id, policy))
    }

    /// Open the activity page of account `id`. With the fallback policy
    /// enabled, a missing account opens the first listed one instead.
    ///
    /// # Errors
    ///
    /// [`ProbeError::OptionNotFound`] if the account is not listed and no
    /// fallback applies
    pub fn open_account(&self, id: &str) -> ProbeResult<AccountActivityPage<'e>> {
        let link = account_link(id);
        let short = self.engine.short_policy();
        let opened = if self.engine.is_displayed(&link, short) {
            self.engine.click(&link, self.engine.default_policy())?;
            id.to_string()
        } else if self.engine.settings().fallback.is_enabled() && self.engine.exists(&self.first_account) {
            let first = self.engine.read(&self.first_account, short);
            warn!(wanted = id, fallback = %first, "account not listed, opening first account");
            self.engine.click(&self.first_account, self.engine.default_policy())?;
            first
        } else {
            return Err(ProbeError::OptionNotFound {
                option: id.to_string(),
                diagnostic: Box::new(
                    self.engine
                        .snapshot(&format!("account_missing_{id}"))
                        .with_locators(link.to_string()),
                ),
            });
        };
        let page = AccountActivityPage::new(self.engine, opened);
        if !page.is_loaded() {
            return Err(ProbeError::NotFound {
                waited_ms: short.timeout().as_millis() as u64,
                diagnostic: Box::new(self.engine.snapshot(&format!("activity_not_loaded_{id}"))),
            });
        }
        Ok(page)
    }
}

impl PageModel for AccountOverviewPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "overview.htm"
    }

    fn is_loaded(&self) -> bool {
        self.engine.is_displayed(&self.marker, self.engine.short_policy())
    }
}

// =============================================================================
// ACTIVITY
// =============================================================================

/// Sort direction of a transactions column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl FromStr for SortOrder {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(ProbeError::invalid_config(format!("unknown sort order '{other}'"))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("ascending"),
            Self::Descending => f.write_str("descending"),
        }
    }
}

/// Activity of a single account
#[derive(Debug)]
pub struct AccountActivityPage<'e> {
    engine: &'e Engine,
    account_id: String,
    path: String,
    marker: LocatorSet,
    balance: LocatorSet,
    from_date: LocatorSet,
    to_date: LocatorSet,
    filter: LocatorSet,
    table: TransactionTable,
}

impl<'e> AccountActivityPage<'e> {
    /// Activity page of `account_id`
    #[must_use]
    pub fn new(engine: &'e Engine, account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        Self {
            engine,
            path: format!("activity.htm?id={account_id}"),
            account_id,
            marker: LocatorSet::single(Locator::id("transactionTable"))
                .or(Locator::xpath("//h1[contains(normalize-space(.),'Account Details')]"))
                .named("account_activity"),
            balance: LocatorSet::single(Locator::id("balance"))
                .or(Locator::css(".balance"))
                .named("account_balance"),
            from_date: LocatorSet::single(Locator::id("fromDate")).named("from_date"),
            to_date: LocatorSet::single(Locator::id("toDate")).named("to_date"),
            filter: LocatorSet::single(Locator::xpath("//input[@value='Filter']")).named("filter_button"),
            table: TransactionTable::new("transactionTable"),
        }
    }

    /// Account shown
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Balance in the account details
    #[must_use]
    pub fn balance(&self) -> Option<f64> {
        parse_amount(&self.engine.read(&self.balance, self.engine.default_policy()))
    }

    /// Restrict the listing to `from..=to` (`MM/DD/YYYY`)
    ///
    /// # Errors
    ///
    /// Returns error if the date fields or the filter button are unusable
    pub fn filter_by_date(&self, from: &str, to: &str) -> ProbeResult<()> {
        let policy = self.engine.default_policy();
        self.engine.type_text(&self.from_date, from, policy)?;
        self.engine.type_text(&self.to_date, to, policy)?;
        self.engine
            .retry_action(
                "filter_by_date",
                3,
                Backoff::Fixed(self.engine.settings().settle_delay),
                |_| self.engine.click(&self.filter, policy),
            )
            .into_result()?;
        self.engine.wait_for(&self.table.presence(), policy)?;
        info!(account = %self.account_id, from, to, "transactions filtered");
        Ok(())
    }

    /// Dates column
    #[must_use]
    pub fn transaction_dates(&self) -> Vec<String> {
        self.table.dates(self.engine)
    }

    /// Signed amounts, credit minus debit
    #[must_use]
    pub fn transaction_amounts(&self) -> Vec<f64> {
        self.table.amounts(self.engine)
    }

    /// Sort by the column headed `field`; descending toggles a second time
    ///
    /// # Errors
    ///
    /// Returns error if the column header is not clickable
    pub fn sort_by(&self, field: &str, order: SortOrder) -> ProbeResult<()> {
        let header = LocatorSet::single(Locator::xpath(format!(
            "//th[contains(normalize-space(.),{})]",
            xpath_string(field)
        )))
        .or(Locator::link_text(field))
        .named(format!("sort_{field}"));
        let policy = self.engine.default_policy();
        self.engine.click(&header, policy)?;
        self.engine.settle();
        if order == SortOrder::Descending {
            self.engine.click(&header, policy)?;
            self.engine.settle();
        }
        debug!(field, %order, "transactions sorted");
        Ok(())
    }
}

impl PageModel for AccountActivityPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn is_loaded(&self) -> bool {
        self.engine.is_displayed(&self.marker, self.engine.short_policy())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::driver::{MockDriver, MockElement};
    use crate::engine::{EngineSettings, FallbackPolicy};
    use crate::wait::WaitPolicy;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn overview() -> MockDriver {
        MockDriver::new()
            .with_element(Locator::id("accountTable"), MockElement::new("table", ""))
            .with_element(Locator::xpath(ACCOUNT_LINKS), MockElement::new("a", "13344"))
            .with_element(Locator::xpath(ACCOUNT_LINKS), MockElement::new("a", "13455"))
            .with_element(Locator::xpath(ACCOUNT_BALANCES), MockElement::new("td", "$1,000.00"))
            .with_element(Locator::xpath(ACCOUNT_BALANCES), MockElement::new("td", "$0.50"))
            .with_element(balance_cell("13344").primary().clone(), MockElement::new("td", "$1,000.00"))
            .with_element(balance_cell("13455").primary().clone(), MockElement::new("td", "$0.50"))
    }

    fn engine(driver: MockDriver, dir: &TempDir, fallback: FallbackPolicy) -> (Engine, Arc<MockDriver>) {
        let shared = Arc::new(driver);
        let policy = WaitPolicy::from_millis(40, 5).unwrap();
        let engine = Engine::new(
            Box::new(Arc::clone(&shared)),
            EngineSettings {
                default_policy: policy.clone(),
                short_policy: policy,
                artifacts: ArtifactStore::new(dir.path()),
                settle_delay: Duration::from_millis(1),
                action_attempts: 1,
                fallback,
                ..EngineSettings::default()
            },
        );
        (engine, shared)
    }

    mod overview_tests {
        use super::*;

        #[test]
        fn test_ids_and_balances() {
            let dir = TempDir::new().unwrap();
            let (engine, _) = engine(overview(), &dir, FallbackPolicy::Disabled);
            let page = AccountOverviewPage::new(&engine);
            assert!(page.is_loaded());
            assert_eq!(page.account_ids(), vec!["13344", "13455"]);
            assert_eq!(page.balance_of("13344"), Some(1000.0));
            assert_eq!(page.balance_of("99999"), None);
            assert_eq!(page.usable_accounts(1.0), vec!["13344"]);
            assert!((page.total_balance() - 1000.5).abs() < 0.001);
        }

        #[test]
        fn test_ensure_accounts_already_satisfied() {
            let dir = TempDir::new().unwrap();
            let (engine, driver) = engine(overview(), &dir, FallbackPolicy::Disabled);
            let ids = AccountOverviewPage::new(&engine).ensure_accounts(2).unwrap();
            assert_eq!(ids.len(), 2);
            assert!(!driver.was_called("click"));
        }

        #[test]
        fn test_ensure_accounts_unavailable_is_skip() {
            let dir = TempDir::new().unwrap();
            let (engine, _) = engine(overview(), &dir, FallbackPolicy::Disabled);
            let err = AccountOverviewPage::new(&engine).ensure_accounts(5).unwrap_err();
            assert!(matches!(err, ProbeError::PreconditionUnavailable { .. }));
            assert!(err.is_skip());
        }

        #[test]
        fn test_missing_account_without_fallback() {
            let dir = TempDir::new().unwrap();
            let (engine, driver) = engine(overview(), &dir, FallbackPolicy::Disabled);
            let err = AccountOverviewPage::new(&engine).open_account("77777").unwrap_err();
            assert!(matches!(err, ProbeError::OptionNotFound { .. }));
            assert!(!driver.was_called("click"));
        }

        #[test]
        fn test_missing_account_with_fallback() {
            let dir = TempDir::new().unwrap();
            let first = Locator::xpath(format!("({ACCOUNT_LINKS})[1]"));
            let (engine, driver) = engine(
                overview()
                    .with_element(first.clone(), MockElement::new("a", "13344"))
                    .with_element(Locator::id("transactionTable"), MockElement::new("table", "")),
                &dir,
                FallbackPolicy::FirstAvailable,
            );
            let page = AccountOverviewPage::new(&engine).open_account("77777").unwrap();
            assert_eq!(page.account_id(), "13344");
            assert_eq!(driver.clicks_on(&first), 1);
        }
    }

    mod activity_tests {
        use super::*;

        #[test]
        fn test_sort_order_parse() {
            assert_eq!("Descending".parse::<SortOrder>().unwrap(), SortOrder::Descending);
            assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
            assert!("sideways".parse::<SortOrder>().is_err());
        }

        #[test]
        fn test_filter_types_dates_and_clicks() {
            let dir = TempDir::new().unwrap();
            let filter = Locator::xpath("//input[@value='Filter']");
            let (engine, driver) = engine(
                MockDriver::new()
                    .with_element(Locator::id("fromDate"), MockElement::new("input", ""))
                    .with_element(Locator::id("toDate"), MockElement::new("input", ""))
                    .with_element(filter.clone(), MockElement::new("input", "Filter"))
                    .with_element(Locator::id("transactionTable"), MockElement::new("table", "")),
                &dir,
                FallbackPolicy::Disabled,
            );
            let page = AccountActivityPage::new(&engine, "13344");
            page.filter_by_date("09/01/2025", "09/30/2025").unwrap();
            assert_eq!(driver.typed_text(&Locator::id("fromDate")).as_deref(), Some("09/01/2025"));
            assert_eq!(driver.clicks_on(&filter), 1);
            assert_eq!(page.path(), "activity.htm?id=13344");
        }

        #[test]
        fn test_descending_sort_clicks_twice() {
            let dir = TempDir::new().unwrap();
            let header = Locator::xpath("//th[contains(normalize-space(.),'Date')]");
            let (engine, driver) = engine(
                MockDriver::new().with_element(header.clone(), MockElement::new("th", "Date")),
                &dir,
                FallbackPolicy::Disabled,
            );
            let page = AccountActivityPage::new(&engine, "13344");
            page.sort_by("Date", SortOrder::Descending).unwrap();
            assert_eq!(driver.clicks_on(&header), 2);
        }

        #[test]
        fn test_amounts_combine_debit_and_credit() {
            let dir = TempDir::new().unwrap();
            let col = |i: usize| Locator::xpath(format!("//table[@id='transactionTable']//tbody/tr/td[{i}]"));
            let (engine, _) = engine(
                MockDriver::new()
                    .with_element(col(3), MockElement::new("td", "$100.00"))
                    .with_element(col(3), MockElement::new("td", ""))
                    .with_element(col(4), MockElement::new("td", ""))
                    .with_element(col(4), MockElement::new("td", "$25.00")),
                &dir,
                FallbackPolicy::Disabled,
            );
            let page = AccountActivityPage::new(&engine, "13344");
            assert_eq!(page.transaction_amounts(), vec![-100.0, 25.0]);
        }
    }
}
