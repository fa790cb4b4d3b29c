//! Find transactions.

use super::TransactionTable;
use crate::engine::Engine;
use crate::locator::{Locator, LocatorSet};
use crate::page_object::PageModel;
use crate::result::ProbeResult;
use tracing::info;

/// Transaction search across one account
#[derive(Debug)]
pub struct TransactionHistoryPage<'e> {
    engine: &'e Engine,
    account: LocatorSet,
    from_date: LocatorSet,
    to_date: LocatorSet,
    find_by_range: LocatorSet,
    table: TransactionTable,
}

impl<'e> TransactionHistoryPage<'e> {
    /// Find transactions page driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            account: LocatorSet::single(Locator::id("accountId")).named("history_account"),
            from_date: LocatorSet::single(Locator::id("fromDate")).named("history_from_date"),
            to_date: LocatorSet::single(Locator::id("toDate")).named("history_to_date"),
            find_by_range: LocatorSet::single(Locator::id("findByDateRange"))
                .or(Locator::xpath("//button[contains(normalize-space(.),'Find Transactions')]"))
                .named("find_by_date_range"),
            table: TransactionTable::new("transactionTable"),
        }
    }

    /// Choose the account to search
    ///
    /// # Errors
    ///
    /// [`crate::ProbeError::OptionNotFound`] if the account is not offered
    pub fn select_account(&self, id: &str) -> ProbeResult<()> {
        self.engine
            .select_option(&self.account, id, self.engine.default_policy())
    }

    /// Search transactions between `from` and `to` inclusive (`MM/DD/YYYY`)
    ///
    /// # Errors
    ///
    /// Returns error if the form cannot be driven or no results table shows
    pub fn find_by_date_range(&self, from: &str, to: &str) -> ProbeResult<()> {
        let policy = self.engine.default_policy();
        self.engine.type_text(&self.from_date, from, policy)?;
        self.engine.type_text(&self.to_date, to, policy)?;
        self.engine.click(&self.find_by_range, policy)?;
        let _ = self.engine.wait_for(&self.table.presence(), policy)?;
        info!(from, to, "transactions searched");
        Ok(())
    }

    /// Dates column of the results
    #[must_use]
    pub fn dates(&self) -> Vec<String> {
        self.table.dates(self.engine)
    }

    /// Signed amounts of the results
    #[must_use]
    pub fn amounts(&self) -> Vec<f64> {
        self.table.amounts(self.engine)
    }

    /// Transaction descriptions of the results
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.table.descriptions(self.engine)
    }
}

impl PageModel for TransactionHistoryPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "findtrans.htm"
    }

    fn is_loaded(&self) -> bool {
        self.engine
            .is_displayed(&self.account, self.engine.short_policy())
    }
}
