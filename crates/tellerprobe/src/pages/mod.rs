//! Page models for the ParaBank demo banking application.
//!
//! Every page borrows the [`Engine`](crate::Engine) of the worker that runs
//! it and is built purely from engine calls.

mod account;
mod contact;
mod history;
mod loan;
mod login;
mod navigation;
mod transfer;

pub use account::{AccountActivityPage, AccountOverviewPage, SortOrder};
pub use contact::ContactPage;
pub use history::TransactionHistoryPage;
pub use loan::LoanPage;
pub use login::LoginPage;
pub use navigation::{NavLink, NavigationPage};
pub use transfer::TransferPage;

use crate::engine::Engine;
use crate::locator::{Locator, LocatorSet};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Date format used throughout the application
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Minimum balance for an account to take part in a transfer
pub const MIN_USABLE_BALANCE: f64 = 1.00;

fn non_numeric() -> &'static Regex {
    static NON_NUMERIC: OnceLock<Regex> = OnceLock::new();
    NON_NUMERIC.get_or_init(|| Regex::new(r"[^\d.-]").unwrap_or_else(|_| unreachable!()))
}

/// Parse a displayed amount such as `$1,231.10` or `-$100.00`
///
/// Everything except digits, `.` and `-` is stripped first. Returns `None`
/// when nothing numeric remains.
#[must_use]
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned = non_numeric().replace_all(text.trim(), "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse an `MM/DD/YYYY` date
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Column-wise view of a transactions table
///
/// Columns are `Date | Transaction | Debit (-) | Credit (+)`.
#[derive(Debug, Clone)]
pub(crate) struct TransactionTable {
    table_id: &'static str,
}

impl TransactionTable {
    pub(crate) const fn new(table_id: &'static str) -> Self {
        Self { table_id }
    }

    pub(crate) fn presence(&self) -> LocatorSet {
        LocatorSet::single(Locator::id(self.table_id)).named("transaction_table")
    }

    fn column(&self, index: usize) -> LocatorSet {
        LocatorSet::single(Locator::xpath(format!(
            "//table[@id='{}']//tbody/tr/td[{index}]",
            self.table_id
        )))
        .named(format!("transaction_column_{index}"))
    }

    pub(crate) fn dates(&self, engine: &Engine) -> Vec<String> {
        engine.read_all(&self.column(1), engine.default_policy())
    }

    pub(crate) fn descriptions(&self, engine: &Engine) -> Vec<String> {
        engine.read_all(&self.column(2), engine.short_policy())
    }

    /// Signed amounts, credit minus debit per row
    pub(crate) fn amounts(&self, engine: &Engine) -> Vec<f64> {
        let debits = engine.read_all(&self.column(3), engine.short_policy());
        let credits = engine.read_all(&self.column(4), engine.short_policy());
        let rows = debits.len().max(credits.len());
        (0..rows)
            .map(|i| {
                let debit = debits.get(i).and_then(|d| parse_amount(d)).unwrap_or(0.0);
                let credit = credits.get(i).and_then(|c| parse_amount(c)).unwrap_or(0.0);
                credit - debit.abs()
            })
            .collect()
    }
}
