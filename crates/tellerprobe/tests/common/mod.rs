//! An in-memory ParaBank behind the `Driver` trait.
//!
//! Every screen renders exactly the locators the page models query, so whole
//! scenarios run end to end without a browser. Handles are keyed by element
//! role (`"login"`, `"link:13344"`) and stay valid while the element is on
//! screen.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::NaiveDate;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tellerprobe::prelude::*;
use tellerprobe::Script;
use tracing_subscriber::EnvFilter;

pub const BASE_URL: &str = "http://bank.test/parabank/";
pub const USERNAME: &str = "john";
pub const PASSWORD: &str = "demo";

const ACCOUNT_LINKS: &str = "//table[@id='accountTable']//tbody/tr/td[1]/a";
const ACCOUNT_BALANCES: &str = "//table[@id='accountTable']//tbody/tr[td/a]/td[2]";
const ACCOUNTS_HEADER: &str = "//h1[contains(translate(normalize-space(.),'abcdefghijklmnopqrstuvwxyz','ABCDEFGHIJKLMNOPQRSTUVWXYZ'),'ACCOUNTS')]";
const SORTABLE: [&str; 3] = ["Date", "Transaction", "Amount"];
const MENU: [(&str, &str); 4] = [
    ("Accounts Overview", "overview.htm"),
    ("Transfer Funds", "transfer.htm"),
    ("Request Loan", "requestloan.htm"),
    ("Find Transactions", "findtrans.htm"),
];

pub fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

fn money(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${amount:.2}")
    }
}

// =============================================================================
// LEDGER
// =============================================================================

#[derive(Debug, Clone)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    /// Credit positive, debit negative
    pub amount: f64,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: &str, amount: f64) -> Self {
        Self {
            date,
            description: description.to_string(),
            amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub balance: f64,
    pub transactions: Vec<Transaction>,
}

impl Account {
    pub fn new(id: &str, balance: f64, transactions: Vec<Transaction>) -> Self {
        Self {
            id: id.to_string(),
            balance,
            transactions,
        }
    }
}

/// John's accounts: two funded, one empty. 13344 lists its history out of
/// date order with rows on both edges of September.
pub fn seed_accounts() -> Vec<Account> {
    vec![
        Account::new(
            "13344",
            515.50,
            vec![
                Transaction::new(day(8, 13), "Funds Transfer Received", 100.00),
                Transaction::new(day(9, 14), "Bill Payment to Electric Co", -84.25),
                Transaction::new(day(9, 1), "Deposit", 250.00),
                Transaction::new(day(10, 2), "Funds Transfer Sent", -50.00),
                Transaction::new(day(9, 30), "ATM Withdrawal", -20.00),
                Transaction::new(day(8, 31), "Deposit", 10.00),
            ],
        ),
        Account::new(
            "13455",
            1231.10,
            vec![
                Transaction::new(day(9, 5), "Payroll Deposit", 1500.00),
                Transaction::new(day(9, 20), "Funds Transfer Sent", -268.90),
            ],
        ),
        Account::new("13566", 0.00, Vec::new()),
    ]
}

// =============================================================================
// SCREENS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Blank,
    Landing,
    Overview,
    Activity,
    Transfer,
    Loan,
    Contact,
    FindTransactions,
    OpenAccount,
    Unauthorized,
    NotFound,
}

#[derive(Debug, Clone)]
struct Node {
    key: String,
    tag: &'static str,
    text: String,
    options: Vec<String>,
}

#[derive(Default)]
struct Rendered(Vec<(Locator, Node)>);

impl Rendered {
    fn add(&mut self, locator: Locator, key: impl Into<String>, tag: &'static str, text: impl Into<String>) {
        self.0.push((
            locator,
            Node {
                key: key.into(),
                tag,
                text: text.into(),
                options: Vec::new(),
            },
        ));
    }

    fn select(&mut self, locator: Locator, key: &str, options: Vec<String>) {
        self.0.push((
            locator,
            Node {
                key: key.to_string(),
                tag: "select",
                text: options.join("\n"),
                options,
            },
        ));
    }

    fn table(&mut self, rows: &[Transaction]) {
        for (r, row) in rows.iter().enumerate() {
            let debit = if row.amount < 0.0 { money(-row.amount) } else { String::new() };
            let credit = if row.amount > 0.0 { money(row.amount) } else { String::new() };
            let cells = [row.date.format("%m/%d/%Y").to_string(), row.description.clone(), debit, credit];
            for (c, text) in cells.into_iter().enumerate() {
                self.add(
                    Locator::xpath(format!("//table[@id='transactionTable']//tbody/tr/td[{}]", c + 1)),
                    format!("cell:{r}:{c}"),
                    "td",
                    text,
                );
            }
        }
    }
}

struct State {
    url: String,
    screen: Screen,
    user: Option<String>,
    accounts: Vec<Account>,
    today: NaiveDate,
    fields: HashMap<String, String>,
    selected: HashMap<String, usize>,
    errors: Vec<String>,
    activity: Option<String>,
    filter: Option<(NaiveDate, NaiveDate)>,
    sort: Option<(String, bool)>,
    transfer_done: bool,
    loan_approved: Option<bool>,
    contact_sent: Option<String>,
    search_done: bool,
    new_account: Option<String>,
    closed: bool,
    ignore_date_filter: bool,
    overlay_on: Option<String>,
    empty_option_reads: u32,
    lose_session_on: Option<String>,
    panic_on: Option<String>,
    visited: Vec<String>,
}

impl State {
    fn alive(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::SessionLost("browser has disconnected".to_string()))
        } else {
            Ok(())
        }
    }

    fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    fn account_mut(&mut self, id: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }

    fn account_ids(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.id.clone()).collect()
    }

    fn field(&self, key: &str) -> String {
        self.fields.get(key).cloned().unwrap_or_default()
    }

    fn selected_account(&self, key: &str) -> Option<String> {
        let index = self.selected.get(key).copied().unwrap_or(0);
        self.accounts.get(index).map(|a| a.id.clone())
    }

    fn go(&mut self, url: &str) -> DriverResult<()> {
        let page = url.rsplit('/').next().unwrap_or_default().to_string();
        let (path, query) = page.split_once('?').unwrap_or((page.as_str(), ""));
        self.visited.push(path.to_string());
        if self.lose_session_on.as_deref() == Some(path) {
            self.closed = true;
            return Err(DriverError::SessionLost(format!("renderer crashed loading {path}")));
        }
        if self.panic_on.as_deref() == Some(path) {
            panic!("page script blew up on {path}");
        }

        self.fields.clear();
        self.selected.clear();
        self.errors.clear();
        self.activity = None;
        self.filter = None;
        self.sort = None;
        self.transfer_done = false;
        self.loan_approved = None;
        self.contact_sent = None;
        self.search_done = false;
        self.new_account = None;

        let mut landed = url.to_string();
        let logged_in = self.user.is_some();
        self.screen = match path {
            "about:blank" | "blank" => Screen::Blank,
            "" | "index.htm" => Screen::Landing,
            "logout.htm" => {
                self.user = None;
                landed = format!("{BASE_URL}index.htm");
                Screen::Landing
            }
            "contact.htm" => Screen::Contact,
            _ if !logged_in && path.ends_with(".htm") => Screen::Unauthorized,
            "overview.htm" => Screen::Overview,
            "activity.htm" => {
                let id = query.strip_prefix("id=").unwrap_or_default();
                if self.account(id).is_some() {
                    self.activity = Some(id.to_string());
                    Screen::Activity
                } else {
                    Screen::Unauthorized
                }
            }
            "transfer.htm" => Screen::Transfer,
            "requestloan.htm" => Screen::Loan,
            "findtrans.htm" => Screen::FindTransactions,
            "openaccount.htm" => Screen::OpenAccount,
            _ => Screen::NotFound,
        };
        if self.screen == Screen::Unauthorized {
            self.errors.push("An internal error has occurred and has been logged.".to_string());
        }
        self.url = landed;
        Ok(())
    }

    fn title(&self) -> &'static str {
        match self.screen {
            Screen::Blank => "",
            Screen::Landing => "ParaBank | Welcome | Online Banking",
            Screen::Overview => "ParaBank | Accounts Overview",
            Screen::Activity => "ParaBank | Account Activity",
            Screen::Transfer => "ParaBank | Transfer Funds",
            Screen::Loan => "ParaBank | Loan Request",
            Screen::Contact => "ParaBank | Customer Care",
            Screen::FindTransactions => "ParaBank | Find Transactions",
            Screen::OpenAccount => "ParaBank | Open Account",
            Screen::Unauthorized => "ParaBank | Error",
            Screen::NotFound => "404 Not Found",
        }
    }

    fn rows(&self, id: &str) -> Vec<Transaction> {
        let Some(account) = self.account(id) else {
            return Vec::new();
        };
        let mut rows: Vec<Transaction> = account
            .transactions
            .iter()
            .filter(|t| match self.filter {
                Some((from, to)) if !self.ignore_date_filter => from <= t.date && t.date <= to,
                _ => true,
            })
            .cloned()
            .collect();
        if let Some((field, ascending)) = &self.sort {
            rows.sort_by(|a, b| {
                let order = match field.as_str() {
                    "Date" => a.date.cmp(&b.date),
                    "Transaction" => a.description.cmp(&b.description),
                    _ => a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal),
                };
                if *ascending {
                    order
                } else {
                    order.reverse()
                }
            });
        }
        rows
    }

    fn render(&self) -> Vec<(Locator, Node)> {
        let mut page = Rendered::default();
        if self.screen == Screen::Blank {
            return page.0;
        }
        page.add(Locator::css("div#headerPanel a[href*='index.htm']"), "home", "a", "ParaBank");
        page.add(Locator::link_text("Contact Us"), "nav:contact.htm", "a", "Contact Us");
        if self.user.is_some() {
            page.add(Locator::link_text("Log Out"), "logout", "a", "Log Out");
            page.add(Locator::link_text("Open New Account"), "nav:openaccount.htm", "a", "Open New Account");
            for (text, path) in MENU {
                page.add(Locator::link_text(text), format!("nav:{path}"), "a", text);
            }
        }

        match self.screen {
            Screen::Blank | Screen::NotFound | Screen::Unauthorized => {}
            Screen::Landing => {
                if self.user.is_none() {
                    page.add(Locator::name("username"), "username", "input", "");
                    page.add(Locator::name("password"), "password", "input", "");
                    page.add(Locator::css("input[name='password'][type='password']"), "password", "input", "");
                    page.add(Locator::css("input[type='submit'][value='Log In']"), "login", "input", "");
                }
            }
            Screen::Overview => {
                page.add(Locator::id("accountTable"), "accountTable", "table", "");
                page.add(Locator::xpath(ACCOUNTS_HEADER), "heading", "h1", "Accounts Overview");
                page.add(
                    Locator::xpath("//h1[contains(normalize-space(.),'Accounts Overview')]"),
                    "heading",
                    "h1",
                    "Accounts Overview",
                );
                for account in &self.accounts {
                    page.add(Locator::xpath(ACCOUNT_LINKS), format!("link:{}", account.id), "a", &account.id);
                    page.add(
                        Locator::xpath(ACCOUNT_BALANCES),
                        format!("balance:{}", account.id),
                        "td",
                        money(account.balance),
                    );
                    page.add(
                        Locator::xpath(format!(
                            "//table[@id='accountTable']//a[normalize-space(.)='{}']",
                            account.id
                        )),
                        format!("link:{}", account.id),
                        "a",
                        &account.id,
                    );
                    page.add(
                        Locator::xpath(format!(
                            "//table[@id='accountTable']//tr[td/a[normalize-space(.)='{}']]/td[2]",
                            account.id
                        )),
                        format!("balance:{}", account.id),
                        "td",
                        money(account.balance),
                    );
                }
                if let Some(first) = self.accounts.first() {
                    page.add(
                        Locator::xpath(format!("({ACCOUNT_LINKS})[1]")),
                        format!("link:{}", first.id),
                        "a",
                        &first.id,
                    );
                }
            }
            Screen::Activity => {
                let id = self.activity.clone().unwrap_or_default();
                let balance = self.account(&id).map_or(0.0, |a| a.balance);
                page.add(Locator::id("transactionTable"), "transactionTable", "table", "");
                page.add(
                    Locator::xpath("//h1[contains(normalize-space(.),'Account Details')]"),
                    "heading",
                    "h1",
                    "Account Details",
                );
                page.add(Locator::id("balance"), "account_balance", "td", money(balance));
                page.add(Locator::id("fromDate"), "fromDate", "input", "");
                page.add(Locator::id("toDate"), "toDate", "input", "");
                page.add(Locator::xpath("//input[@value='Filter']"), "filter", "input", "");
                for header in SORTABLE {
                    page.add(
                        Locator::xpath(format!("//th[contains(normalize-space(.),'{header}')]")),
                        format!("sort:{header}"),
                        "th",
                        header,
                    );
                }
                page.table(&self.rows(&id));
            }
            Screen::Transfer => {
                if self.transfer_done {
                    page.add(Locator::css("#showResult .title"), "transfer_result", "h1", "Transfer Complete!");
                } else {
                    let options = if self.empty_option_reads > 0 {
                        Vec::new()
                    } else {
                        self.account_ids()
                    };
                    page.select(Locator::id("fromAccountId"), "fromAccountId", options.clone());
                    page.select(Locator::id("toAccountId"), "toAccountId", options);
                    page.add(Locator::id("amount"), "amount", "input", "");
                    page.add(
                        Locator::xpath("//input[@value='Transfer' or @type='submit']"),
                        "transfer",
                        "input",
                        "",
                    );
                }
            }
            Screen::Loan => match self.loan_approved {
                Some(approved) => {
                    let (status, selector, message) = if approved {
                        ("Approved", "#loanRequestApproved p", "Congratulations, your loan has been approved.")
                    } else {
                        (
                            "Denied",
                            "#loanRequestDenied p",
                            "We cannot grant a loan in that amount with your available funds.",
                        )
                    };
                    page.add(Locator::id("loanStatus"), "loan_status", "td", status);
                    page.add(Locator::css(selector), "loan_message", "p", message);
                }
                None => {
                    page.add(Locator::id("amount"), "amount", "input", "");
                    page.add(Locator::id("downPayment"), "downPayment", "input", "");
                    page.select(Locator::id("fromAccountId"), "fromAccountId", self.account_ids());
                    page.add(
                        Locator::xpath("//input[@value='Apply Now' or @type='submit']"),
                        "apply",
                        "input",
                        "",
                    );
                }
            },
            Screen::Contact => match &self.contact_sent {
                Some(name) => {
                    page.add(
                        Locator::xpath("//div[@id='rightPanel']/p[contains(.,'Thank you')]"),
                        "contact_thanks",
                        "p",
                        format!("Thank you {name}"),
                    );
                }
                None => {
                    page.add(Locator::id("contactForm"), "contactForm", "form", "");
                    page.add(
                        Locator::xpath("//h1[contains(normalize-space(.),'Customer Care')]"),
                        "heading",
                        "h1",
                        "Customer Care",
                    );
                    for field in ["name", "email", "phone"] {
                        page.add(Locator::id(field), field, "input", "");
                    }
                    page.add(Locator::id("message"), "message", "textarea", "");
                    page.add(
                        Locator::xpath("//input[@value='Send to Customer Care' or @value='Send' or @type='submit']"),
                        "send",
                        "input",
                        "",
                    );
                }
            },
            Screen::FindTransactions => {
                page.select(Locator::id("accountId"), "accountId", self.account_ids());
                page.add(Locator::id("fromDate"), "fromDate", "input", "");
                page.add(Locator::id("toDate"), "toDate", "input", "");
                page.add(Locator::id("findByDateRange"), "find", "button", "Find Transactions");
                if self.search_done {
                    page.add(Locator::id("transactionTable"), "transactionTable", "table", "");
                    if let Some(id) = self.selected_account("accountId") {
                        page.table(&self.rows(&id));
                    }
                }
            }
            Screen::OpenAccount => match &self.new_account {
                Some(id) => page.add(Locator::id("newAccountId"), "newAccountId", "a", id),
                None => page.add(
                    Locator::css("input[type='button'][value='Open New Account']"),
                    "open_account",
                    "input",
                    "",
                ),
            },
        }

        for (i, error) in self.errors.iter().enumerate() {
            page.add(Locator::css("#rightPanel .error"), format!("error:{i}"), "span", error);
        }
        page.0
    }

    fn node(&self, handle: &ElementHandle) -> DriverResult<Node> {
        self.render()
            .into_iter()
            .map(|(_, node)| node)
            .find(|node| node.key == handle.id)
            .ok_or_else(|| DriverError::NoSuchElement(handle.id.clone()))
    }

    fn activate(&mut self, key: &str) -> DriverResult<()> {
        if let Some(path) = key.strip_prefix("nav:") {
            return self.go(&format!("{BASE_URL}{path}"));
        }
        if let Some(id) = key.strip_prefix("link:") {
            return self.go(&format!("{BASE_URL}activity.htm?id={id}"));
        }
        if let Some(header) = key.strip_prefix("sort:") {
            let ascending = !matches!(&self.sort, Some((field, true)) if field == header);
            self.sort = Some((header.to_string(), ascending));
            return Ok(());
        }
        match key {
            "home" => self.go(&format!("{BASE_URL}index.htm")),
            "logout" => self.go(&format!("{BASE_URL}logout.htm")),
            "login" => self.login(),
            "filter" => {
                self.filter_dates();
                Ok(())
            }
            "find" => {
                self.filter_dates();
                self.search_done = self.errors.is_empty();
                Ok(())
            }
            "transfer" => {
                self.transfer();
                Ok(())
            }
            "apply" => {
                self.apply_for_loan();
                Ok(())
            }
            "send" => {
                self.send_contact();
                Ok(())
            }
            "open_account" => {
                self.open_account();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn login(&mut self) -> DriverResult<()> {
        let (username, password) = (self.field("username"), self.field("password"));
        if username == USERNAME && password == PASSWORD {
            self.user = Some(username);
            self.go(&format!("{BASE_URL}overview.htm"))
        } else {
            self.fields.clear();
            self.errors = vec!["The username and password could not be verified.".to_string()];
            Ok(())
        }
    }

    fn filter_dates(&mut self) {
        let parse = |raw: String| NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y").ok();
        match (parse(self.field("fromDate")), parse(self.field("toDate"))) {
            (Some(from), Some(to)) => {
                self.errors.clear();
                self.filter = Some((from, to));
            }
            _ => self.errors = vec!["Invalid date format.".to_string()],
        }
    }

    fn transfer(&mut self) {
        let raw = self.field("amount");
        let amount = match raw.trim() {
            "" => Err("The amount cannot be empty."),
            text => text.parse::<f64>().map_err(|_| "Please enter a valid amount."),
        };
        let (Some(from), Some(to)) = (self.selected_account("fromAccountId"), self.selected_account("toAccountId"))
        else {
            self.errors = vec!["No account selected.".to_string()];
            return;
        };
        match amount {
            Ok(amount) => {
                let today = self.today;
                if let Some(source) = self.account_mut(&from) {
                    source.balance -= amount;
                    source.transactions.push(Transaction::new(today, "Funds Transfer Sent", -amount));
                }
                if let Some(target) = self.account_mut(&to) {
                    target.balance += amount;
                    target.transactions.push(Transaction::new(today, "Funds Transfer Received", amount));
                }
                self.errors.clear();
                self.transfer_done = true;
            }
            Err(message) => self.errors = vec![message.to_string()],
        }
    }

    fn apply_for_loan(&mut self) {
        let amount = self.field("amount").trim().parse::<f64>();
        let down = self.field("downPayment").trim().parse::<f64>();
        match (amount, down, self.selected_account("fromAccountId")) {
            (Ok(_), Ok(down), Some(from)) => {
                let available = self.account(&from).map_or(0.0, |a| a.balance);
                self.errors.clear();
                self.loan_approved = Some(down <= available);
            }
            _ => self.errors = vec!["An internal error has occurred and has been logged.".to_string()],
        }
    }

    fn send_contact(&mut self) {
        let missing: Vec<String> = [("name", "Name"), ("email", "Email"), ("phone", "Phone"), ("message", "Message")]
            .into_iter()
            .filter(|(key, _)| self.field(key).trim().is_empty())
            .map(|(_, label)| format!("{label} is required."))
            .collect();
        if missing.is_empty() {
            self.contact_sent = Some(self.field("name"));
        }
        self.errors = missing;
    }

    fn open_account(&mut self) {
        let next = self
            .accounts
            .iter()
            .filter_map(|a| a.id.parse::<u64>().ok())
            .max()
            .map_or(13344, |max| max + 111)
            .to_string();
        if let Some(first) = self.accounts.first_mut() {
            first.balance -= 100.0;
        }
        self.accounts.push(Account::new(&next, 100.0, Vec::new()));
        self.new_account = Some(next);
    }

    fn script(&mut self, script: Script, node: &Node) -> DriverResult<Value> {
        match script {
            Script::Click => {
                self.activate(&node.key)?;
                Ok(json!(true))
            }
            Script::OptionTexts => {
                if node.tag != "select" {
                    return Err(DriverError::Script("options of a non-select".to_string()));
                }
                if self.empty_option_reads > 0 {
                    self.empty_option_reads -= 1;
                }
                Ok(json!(node.options))
            }
            Script::SelectByText(text) => match node.options.iter().position(|o| *o == text) {
                Some(index) => {
                    let _ = self.selected.insert(node.key.clone(), index);
                    Ok(json!(true))
                }
                None => Ok(json!(false)),
            },
            Script::SelectedText => {
                let index = self.selected.get(&node.key).copied().unwrap_or(0);
                Ok(json!(node.options.get(index).cloned().unwrap_or_default()))
            }
        }
    }
}

// =============================================================================
// DRIVER
// =============================================================================

pub struct FakeBank {
    state: Mutex<State>,
}

impl FakeBank {
    pub fn new() -> Self {
        Self::with_accounts(seed_accounts())
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                screen: Screen::Blank,
                user: None,
                accounts,
                today: day(10, 15),
                fields: HashMap::new(),
                selected: HashMap::new(),
                errors: Vec::new(),
                activity: None,
                filter: None,
                sort: None,
                transfer_done: false,
                loan_approved: None,
                contact_sent: None,
                search_done: false,
                new_account: None,
                closed: false,
                ignore_date_filter: false,
                overlay_on: None,
                empty_option_reads: 0,
                lose_session_on: None,
                panic_on: None,
                visited: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn configure(self, apply: impl FnOnce(&mut State)) -> Self {
        apply(&mut *self.state());
        self
    }

    /// Activity filter accepted but not applied
    pub fn ignoring_date_filter(self) -> Self {
        self.configure(|s| s.ignore_date_filter = true)
    }

    /// Native clicks on `key` land on an overlay
    pub fn with_overlay_on(self, key: &str) -> Self {
        self.configure(|s| s.overlay_on = Some(key.to_string()))
    }

    /// Transfer dropdowns stay empty for the first `reads` option reads
    pub fn with_slow_dropdowns(self, reads: u32) -> Self {
        self.configure(|s| s.empty_option_reads = reads)
    }

    /// The browser dies when loading `path`
    pub fn losing_session_on(self, path: &str) -> Self {
        self.configure(|s| s.lose_session_on = Some(path.to_string()))
    }

    /// Loading `path` panics inside the driver
    pub fn panicking_on(self, path: &str) -> Self {
        self.configure(|s| s.panic_on = Some(path.to_string()))
    }

    pub fn balance(&self, id: &str) -> Option<f64> {
        self.state().account(id).map(|a| a.balance)
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.state().account_ids()
    }

    pub fn user(&self) -> Option<String> {
        self.state().user.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state().visited.clone()
    }
}

impl Default for FakeBank {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for FakeBank {
    fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.state();
        state.alive()?;
        state.go(url)
    }

    fn refresh(&self) -> DriverResult<()> {
        let mut state = self.state();
        state.alive()?;
        let url = state.url.clone();
        state.go(&url)
    }

    fn find_candidates(&self, locator: &Locator) -> DriverResult<Vec<ElementHandle>> {
        let state = self.state();
        state.alive()?;
        Ok(state
            .render()
            .into_iter()
            .filter(|(l, _)| l == locator)
            .map(|(_, node)| ElementHandle::new(node.key, node.tag))
            .collect())
    }

    fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let state = self.state();
        state.alive()?;
        state.node(handle).map(|_| true)
    }

    fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.is_visible(handle)
    }

    fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        let mut state = self.state();
        state.alive()?;
        let node = state.node(handle)?;
        if state.overlay_on.as_deref() == Some(node.key.as_str()) {
            return Err(DriverError::Intercepted(format!("{} is covered by a spinner", node.key)));
        }
        state.activate(&node.key)
    }

    fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        let mut state = self.state();
        state.alive()?;
        let node = state.node(handle)?;
        if !matches!(node.tag, "input" | "textarea") {
            return Err(DriverError::Other(format!("{} is not editable", node.key)));
        }
        let _ = state.fields.insert(node.key, text.to_string());
        Ok(())
    }

    fn get_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        let state = self.state();
        state.alive()?;
        state.node(handle).map(|node| node.text)
    }

    fn execute_script(&self, script: &str, handle: Option<&ElementHandle>) -> DriverResult<Value> {
        let mut state = self.state();
        state.alive()?;
        let script = Script::recognize(script).ok_or_else(|| DriverError::Script("unsupported script".to_string()))?;
        let handle = handle.ok_or_else(|| DriverError::Script("script needs an element".to_string()))?;
        let node = state.node(handle)?;
        state.script(script, &node)
    }

    fn screenshot(&self) -> DriverResult<Screenshot> {
        let state = self.state();
        state.alive()?;
        let mut data = Screenshot::PNG_SIGNATURE.to_vec();
        data.extend_from_slice(state.title().as_bytes());
        Ok(Screenshot::new(data))
    }

    fn current_url(&self) -> DriverResult<String> {
        let state = self.state();
        state.alive()?;
        Ok(state.url.clone())
    }

    fn title(&self) -> DriverResult<String> {
        let state = self.state();
        state.alive()?;
        Ok(state.title().to_string())
    }

    fn close_session(&self) -> DriverResult<()> {
        self.state().closed = true;
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Route engine logs through the test harness's captured output.
/// `RUST_LOG` overrides the `warn` default; repeated calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Fast waits against the fake, screenshots under `dir`. Installs test
/// logging on first use.
pub fn settings(dir: &Path) -> EngineSettings {
    init_logging();
    EngineSettings {
        base_url: BASE_URL.to_string(),
        default_policy: WaitPolicy::from_millis(300, 5).unwrap(),
        short_policy: WaitPolicy::from_millis(40, 5).unwrap(),
        artifacts: ArtifactStore::new(dir),
        settle_delay: Duration::from_millis(1),
        ..EngineSettings::default()
    }
}

/// First scenario of a one-row YAML plan
pub fn scenario(yaml: &str) -> Scenario {
    let plan = ScenarioPlan::from_yaml_str(yaml).unwrap();
    assert!(plan.malformed.is_empty(), "unexpected malformed rows: {:?}", plan.malformed);
    plan.scenarios.into_iter().next().unwrap()
}
