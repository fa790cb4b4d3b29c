//! Data-driven scenarios.
//!
//! A scenario file is a JSON or YAML array of rows:
//!
//! ```yaml
//! - scenario: valid_login
//!   username: john
//!   password: demo
//! - scenario: Transfer
//!   amount: "100.00"
//!   from_account: "13344"
//! ```
//!
//! Labels match case-insensitively, ignoring spaces, `_` and `-`. An unknown
//! label rejects the whole file; a row missing a field its scenario needs is
//! set aside as malformed and the rest still run.

use crate::engine::Engine;
use crate::page_object::PageModel;
use crate::pages::{
    parse_amount, parse_date, AccountOverviewPage, ContactPage, LoanPage, LoginPage, NavLink,
    NavigationPage, SortOrder, TransactionHistoryPage, TransferPage, DATE_FORMAT, MIN_USABLE_BALANCE,
};
use crate::result::{ProbeError, ProbeResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Tolerance when comparing balances
pub const BALANCE_TOLERANCE: f64 = 0.01;

// =============================================================================
// KINDS
// =============================================================================

/// Scenario kinds understood by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Correct credentials reach the account view
    ValidLogin,
    /// Wrong credentials show an error
    InvalidLogin,
    /// Funds move between accounts
    Transfer,
    /// Transfer without an amount is rejected
    TransferEmptyAmount,
    /// Activity filtered by a date range
    FilterByDate,
    /// Activity sorted by a column
    SortTransactions,
    /// Overview lists accounts with balances
    AccountSummary,
    /// Loan request reaches a decision
    LoanApplication,
    /// Blank contact form is rejected
    ContactBlank,
    /// Complete contact form is accepted
    ContactForm,
    /// A services menu link reaches its page
    Navigation,
    /// Logging out returns to the login form
    Logout,
    /// Transaction search by date range
    FindTransactions,
    /// Login form hides the password
    PasswordMasked,
}

impl ScenarioKind {
    /// Every kind
    pub const ALL: [Self; 14] = [
        Self::ValidLogin,
        Self::InvalidLogin,
        Self::Transfer,
        Self::TransferEmptyAmount,
        Self::FilterByDate,
        Self::SortTransactions,
        Self::AccountSummary,
        Self::LoanApplication,
        Self::ContactBlank,
        Self::ContactForm,
        Self::Navigation,
        Self::Logout,
        Self::FindTransactions,
        Self::PasswordMasked,
    ];

    /// Canonical label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ValidLogin => "valid_login",
            Self::InvalidLogin => "invalid_login",
            Self::Transfer => "transfer",
            Self::TransferEmptyAmount => "transfer_empty_amount",
            Self::FilterByDate => "filter_by_date",
            Self::SortTransactions => "sort_transactions",
            Self::AccountSummary => "account_summary",
            Self::LoanApplication => "loan_application",
            Self::ContactBlank => "contact_blank",
            Self::ContactForm => "contact_form",
            Self::Navigation => "navigation",
            Self::Logout => "logout",
            Self::FindTransactions => "find_transactions",
            Self::PasswordMasked => "password_masked",
        }
    }

    /// Fields a row of this kind must carry
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::ValidLogin | Self::InvalidLogin => &["username", "password"],
            Self::Transfer => &["amount", "from_account"],
            Self::FilterByDate | Self::FindTransactions => &["account", "from_date", "to_date"],
            Self::SortTransactions => &["account", "sort_by", "order"],
            Self::LoanApplication => &["amount", "down_payment"],
            Self::ContactForm => &["name", "email", "phone", "message"],
            Self::Navigation => &["link"],
            Self::TransferEmptyAmount
            | Self::AccountSummary
            | Self::ContactBlank
            | Self::Logout
            | Self::PasswordMasked => &[],
        }
    }

    /// Match a label, ignoring case, spaces, `_` and `-`
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = normalize(label);
        Self::ALL.into_iter().find(|k| normalize(k.label()) == wanted)
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

// =============================================================================
// VERDICT
// =============================================================================

/// Terminal outcome of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Observed outcome matched
    Pass,
    /// Observed outcome differed, or the scenario broke
    Fail,
    /// The environment could not support the scenario
    Skip,
}

impl Verdict {
    /// Verdict for a scenario that ended with `err`
    #[must_use]
    pub const fn from_error(err: &ProbeError) -> Self {
        if err.is_skip() {
            Self::Skip
        } else {
            Self::Fail
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL"),
            Self::Skip => f.write_str("SKIP"),
        }
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

/// Inputs of one scenario, by kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// Log in and expect the account view
    ValidLogin {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Log in and expect an error
    InvalidLogin {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Transfer and check the source balance
    Transfer {
        /// Amount as typed
        amount: String,
        /// Source account id (prefix)
        from_account: String,
        /// Destination; any other account when absent
        to_account: Option<String>,
    },
    /// Transfer with a blank amount
    TransferEmptyAmount {
        /// Source account id (prefix)
        from_account: Option<String>,
    },
    /// Filter one account's activity
    FilterByDate {
        /// Account id
        account: String,
        /// First day, inclusive
        from_date: NaiveDate,
        /// Last day, inclusive
        to_date: NaiveDate,
    },
    /// Sort one account's activity
    SortTransactions {
        /// Account id
        account: String,
        /// Column header
        sort_by: String,
        /// Direction
        order: SortOrder,
    },
    /// Read the overview
    AccountSummary,
    /// Request a loan
    LoanApplication {
        /// Loan amount
        amount: String,
        /// Down payment
        down_payment: String,
        /// Collateral account (prefix)
        from_account: Option<String>,
        /// Whether a decision is expected
        expect_submitted: bool,
    },
    /// Send a blank contact form
    ContactBlank,
    /// Send a complete contact form
    ContactForm {
        /// Sender name
        name: String,
        /// Sender email
        email: String,
        /// Sender phone
        phone: String,
        /// Message body
        message: String,
    },
    /// Follow a menu link
    Navigation {
        /// Menu destination
        link: NavLink,
    },
    /// Log in, then out
    Logout,
    /// Search one account's transactions
    FindTransactions {
        /// Account id
        account: String,
        /// First day, inclusive
        from_date: NaiveDate,
        /// Last day, inclusive
        to_date: NaiveDate,
    },
    /// Inspect the password input
    PasswordMasked,
}

impl ScenarioAction {
    /// Kind of this action
    #[must_use]
    pub const fn kind(&self) -> ScenarioKind {
        match self {
            Self::ValidLogin { .. } => ScenarioKind::ValidLogin,
            Self::InvalidLogin { .. } => ScenarioKind::InvalidLogin,
            Self::Transfer { .. } => ScenarioKind::Transfer,
            Self::TransferEmptyAmount { .. } => ScenarioKind::TransferEmptyAmount,
            Self::FilterByDate { .. } => ScenarioKind::FilterByDate,
            Self::SortTransactions { .. } => ScenarioKind::SortTransactions,
            Self::AccountSummary => ScenarioKind::AccountSummary,
            Self::LoanApplication { .. } => ScenarioKind::LoanApplication,
            Self::ContactBlank => ScenarioKind::ContactBlank,
            Self::ContactForm { .. } => ScenarioKind::ContactForm,
            Self::Navigation { .. } => ScenarioKind::Navigation,
            Self::Logout => ScenarioKind::Logout,
            Self::FindTransactions { .. } => ScenarioKind::FindTransactions,
            Self::PasswordMasked => ScenarioKind::PasswordMasked,
        }
    }
}

/// One planned scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    /// Position of the row in the data file
    pub index: usize,
    /// Display name
    pub name: String,
    /// Extra runs after a failure
    pub retries: u32,
    /// What to do
    pub action: ScenarioAction,
}

/// Account used by scenarios that log in implicitly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "john".to_string(),
            password: "demo".to_string(),
        }
    }
}

impl Scenario {
    /// Kind of this scenario
    #[must_use]
    pub const fn kind(&self) -> ScenarioKind {
        self.action.kind()
    }

    /// Drive the pages and check the outcome. Steps taken are appended to
    /// `steps`.
    ///
    /// # Errors
    ///
    /// [`ProbeError::AssertionFailed`] when the outcome differs,
    /// [`ProbeError::PreconditionUnavailable`] when the environment cannot
    /// support the scenario, or any engine error on the way
    pub fn execute(&self, engine: &Engine, credentials: &Credentials, steps: &mut Vec<String>) -> ProbeResult<()> {
        let mut step = |text: String| {
            debug!(scenario = %self.name, step = %text, "step");
            steps.push(text);
        };
        match &self.action {
            ScenarioAction::ValidLogin { username, password } => {
                let login = LoginPage::new(engine);
                login.ensure_logged_out()?;
                step(format!("log in as {username}"));
                login.login(username, password)?;
                let overview = AccountOverviewPage::new(engine);
                check(overview.is_loaded(), "account view did not load after login")
            }
            ScenarioAction::InvalidLogin { username, password } => {
                let login = LoginPage::new(engine);
                login.ensure_logged_out()?;
                step(format!("log in as {username} with wrong password"));
                login.login(username, password)?;
                let error = login.error_message();
                step(format!("error shown: {error}"));
                check(!error.is_empty(), "no login error shown")?;
                check(
                    !AccountOverviewPage::new(engine).is_loaded(),
                    "account view loaded for invalid credentials",
                )
            }
            ScenarioAction::Transfer {
                amount,
                from_account,
                to_account,
            } => {
                let expected = parse_amount(amount)
                    .ok_or_else(|| ProbeError::invalid_config(format!("amount '{amount}' is not numeric")))?;
                sign_in(engine, credentials)?;
                step(format!("signed in as {}", credentials.username));
                let overview = AccountOverviewPage::new(engine);
                overview.open()?;
                let _ = overview.ensure_accounts(2)?;
                let source = usable_source(engine, &overview, from_account)?;
                let before = overview
                    .balance_of(&source)
                    .ok_or_else(|| ProbeError::precondition(format!("no balance for {source}")))?;
                step(format!("balance of {source} before: {before:.2}"));
                let transfer = TransferPage::new(engine);
                transfer.transfer(amount, &source, to_account.as_deref())?;
                step(format!("transferred {amount} from {source}"));
                check(transfer.is_transfer_confirmed(), "transfer was not confirmed")?;
                overview.open()?;
                let after = overview
                    .balance_of(&source)
                    .ok_or_else(|| ProbeError::assertion(format!("balance of {source} unreadable after transfer")))?;
                step(format!("balance of {source} after: {after:.2}"));
                check(
                    (before - expected - after).abs() <= BALANCE_TOLERANCE,
                    &format!("expected {:.2}, found {after:.2}", before - expected),
                )
            }
            ScenarioAction::TransferEmptyAmount { from_account } => {
                sign_in(engine, credentials)?;
                step(format!("signed in as {}", credentials.username));
                let transfer = TransferPage::new(engine);
                transfer.transfer("", from_account.as_deref().unwrap_or_default(), None)?;
                step("submitted transfer without amount".to_string());
                let error = transfer.error();
                step(format!("error shown: {error}"));
                check(!error.is_empty(), "no validation error for empty amount")?;
                check(!transfer.is_transfer_confirmed(), "empty transfer was confirmed")
            }
            ScenarioAction::FilterByDate {
                account,
                from_date,
                to_date,
            } => {
                sign_in(engine, credentials)?;
                let overview = AccountOverviewPage::new(engine);
                overview.open()?;
                let activity = overview.open_account(account)?;
                let (from, to) = (
                    from_date.format(DATE_FORMAT).to_string(),
                    to_date.format(DATE_FORMAT).to_string(),
                );
                activity.filter_by_date(&from, &to)?;
                step(format!("filtered {} from {from} to {to}", activity.account_id()));
                let dates = activity.transaction_dates();
                step(format!("{} rows listed", dates.len()));
                check_dates_within(&dates, *from_date, *to_date)
            }
            ScenarioAction::SortTransactions {
                account,
                sort_by,
                order,
            } => {
                sign_in(engine, credentials)?;
                let overview = AccountOverviewPage::new(engine);
                overview.open()?;
                let activity = overview.open_account(account)?;
                activity.sort_by(sort_by, *order)?;
                step(format!("sorted {} by {sort_by} {order}", activity.account_id()));
                if sort_by.to_lowercase().contains("date") {
                    let dates: Vec<NaiveDate> = activity
                        .transaction_dates()
                        .iter()
                        .filter_map(|d| parse_date(d))
                        .collect();
                    check(is_sorted(&dates, *order), &format!("dates not {order}"))
                } else {
                    let amounts = activity.transaction_amounts();
                    check(is_sorted(&amounts, *order), &format!("amounts not {order}"))
                }
            }
            ScenarioAction::AccountSummary => {
                sign_in(engine, credentials)?;
                let overview = AccountOverviewPage::new(engine);
                overview.open()?;
                let ids = overview.account_ids();
                step(format!("accounts listed: {}", ids.join(", ")));
                check(!ids.is_empty(), "no accounts listed")?;
                check(
                    ids.iter().any(|id| overview.balance_of(id).is_some()),
                    "no account shows a parseable balance",
                )
            }
            ScenarioAction::LoanApplication {
                amount,
                down_payment,
                from_account,
                expect_submitted,
            } => {
                sign_in(engine, credentials)?;
                let loan = LoanPage::new(engine);
                loan.apply(amount, down_payment, from_account.as_deref())?;
                let result = loan.result_text();
                step(format!("loan of {amount} with {down_payment} down: {result}"));
                check(
                    loan.is_submitted() == *expect_submitted,
                    &format!("expected submitted={expect_submitted}, result was '{result}'"),
                )
            }
            ScenarioAction::ContactBlank => {
                let contact = ContactPage::new(engine);
                contact.submit("", "", "", "")?;
                let response = contact.response();
                step(format!("response: {response}"));
                check(!response.is_empty(), "no validation message for blank form")?;
                check(!contact.is_submitted(), "blank form was accepted")
            }
            ScenarioAction::ContactForm {
                name,
                email,
                phone,
                message,
            } => {
                let contact = ContactPage::new(engine);
                contact.submit(name, email, phone, message)?;
                step(format!("response: {}", contact.response()));
                check(contact.is_submitted(), "contact form was not accepted")
            }
            ScenarioAction::Navigation { link } => {
                sign_in(engine, credentials)?;
                NavigationPage::new(engine).go_to(*link)?;
                let url = engine.current_url()?;
                step(format!("followed {link} to {url}"));
                check(
                    url.contains(link.path()),
                    &format!("{link} led to {url}, expected {}", link.path()),
                )
            }
            ScenarioAction::Logout => {
                sign_in(engine, credentials)?;
                step(format!("signed in as {}", credentials.username));
                let login = LoginPage::new(engine);
                login.logout()?;
                step("logged out".to_string());
                check(login.is_loaded(), "login form not shown after logout")?;
                check(
                    !AccountOverviewPage::new(engine).is_loaded(),
                    "account view still reachable after logout",
                )
            }
            ScenarioAction::FindTransactions {
                account,
                from_date,
                to_date,
            } => {
                sign_in(engine, credentials)?;
                NavigationPage::new(engine).go_to(NavLink::FindTransactions)?;
                let history = TransactionHistoryPage::new(engine);
                history.select_account(account)?;
                let (from, to) = (
                    from_date.format(DATE_FORMAT).to_string(),
                    to_date.format(DATE_FORMAT).to_string(),
                );
                history.find_by_date_range(&from, &to)?;
                let dates = history.dates();
                step(format!("searched {account} from {from} to {to}: {} rows", dates.len()));
                check_dates_within(&dates, *from_date, *to_date)
            }
            ScenarioAction::PasswordMasked => {
                let login = LoginPage::new(engine);
                login.ensure_logged_out()?;
                login.open()?;
                step("opened login form".to_string());
                check(login.is_password_masked(), "password input is not masked")
            }
        }
    }
}

fn check(condition: bool, message: &str) -> ProbeResult<()> {
    if condition {
        Ok(())
    } else {
        Err(ProbeError::assertion(message))
    }
}

/// Every row date parses and falls within `from..=to`
fn check_dates_within(dates: &[String], from: NaiveDate, to: NaiveDate) -> ProbeResult<()> {
    for raw in dates {
        let date = parse_date(raw)
            .ok_or_else(|| ProbeError::assertion(format!("unparseable row date '{raw}'")))?;
        check(
            from <= date && date <= to,
            &format!(
                "row dated {raw} outside {}..{}",
                from.format(DATE_FORMAT),
                to.format(DATE_FORMAT)
            ),
        )?;
    }
    Ok(())
}

fn is_sorted<T: PartialOrd>(values: &[T], order: SortOrder) -> bool {
    values.windows(2).all(|w| match order {
        SortOrder::Ascending => w[0] <= w[1],
        SortOrder::Descending => w[0] >= w[1],
    })
}

fn sign_in(engine: &Engine, credentials: &Credentials) -> ProbeResult<()> {
    let login = LoginPage::new(engine);
    login.ensure_logged_out()?;
    login.login(&credentials.username, &credentials.password)?;
    if login.is_login_successful() {
        Ok(())
    } else {
        Err(ProbeError::precondition(format!(
            "could not log in as {}",
            credentials.username
        )))
    }
}

/// The requested source account if it can fund a transfer; with the
/// fallback policy, the first usable account otherwise
fn usable_source(engine: &Engine, overview: &AccountOverviewPage<'_>, wanted: &str) -> ProbeResult<String> {
    let usable = overview.usable_accounts(MIN_USABLE_BALANCE);
    if usable.len() < 2 {
        return Err(ProbeError::precondition(format!(
            "needed 2 usable accounts, found {}",
            usable.len()
        )));
    }
    if let Some(id) = usable.iter().find(|id| id.starts_with(wanted)) {
        return Ok(id.clone());
    }
    if engine.settings().fallback.is_enabled() {
        warn!(wanted, fallback = %usable[0], "source account unusable, using first usable account");
        return Ok(usable[0].clone());
    }
    Err(ProbeError::precondition(format!(
        "account {wanted} is not listed or cannot fund a transfer"
    )))
}

// =============================================================================
// PLANNING
// =============================================================================

/// A data row that could not become a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedRow {
    /// Position of the row in the data file
    pub index: usize,
    /// Scenario label, if any
    pub label: String,
    /// What was wrong
    pub reason: String,
}

/// Scenarios planned from a data file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioPlan {
    /// Runnable scenarios in file order
    pub scenarios: Vec<Scenario>,
    /// Rows set aside
    pub malformed: Vec<MalformedRow>,
}

impl ScenarioPlan {
    /// Plan scenarios from parsed rows
    ///
    /// # Errors
    ///
    /// [`ProbeError::UnknownScenario`] if any row names an unknown scenario
    pub fn from_rows(rows: Vec<Value>) -> ProbeResult<Self> {
        let mut plan = Self::default();
        for (index, row) in rows.into_iter().enumerate() {
            let Value::Object(fields) = row else {
                plan.reject(index, "", "row is not an object");
                continue;
            };
            let Some(label) = text_field(&fields, "scenario") else {
                plan.reject(index, "", "missing 'scenario' label");
                continue;
            };
            let kind = ScenarioKind::from_label(&label)
                .ok_or_else(|| ProbeError::UnknownScenario { label: label.clone() })?;
            match build(index, kind, &fields) {
                Ok(scenario) => plan.scenarios.push(scenario),
                Err(reason) => plan.reject(index, &label, &reason),
            }
        }
        Ok(plan)
    }

    fn reject(&mut self, index: usize, label: &str, reason: &str) {
        warn!(row = index, label, reason, "skipping malformed scenario row");
        self.malformed.push(MalformedRow {
            index,
            label: label.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Plan from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a JSON array or names an unknown
    /// scenario
    pub fn from_json_str(text: &str) -> ProbeResult<Self> {
        Self::from_rows(serde_json::from_str(text)?)
    }

    /// Plan from YAML text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a YAML sequence or names an unknown
    /// scenario
    pub fn from_yaml_str(text: &str) -> ProbeResult<Self> {
        Self::from_rows(serde_yaml_ng::from_str(text)?)
    }

    /// Plan from a file; `.json` is JSON, anything else YAML
    ///
    /// # Errors
    ///
    /// [`ProbeError::DataSource`] if the file cannot be read, or any
    /// planning error
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ProbeError::DataSource {
            message: format!("{}: {e}", path.display()),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Number of runnable scenarios
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether nothing is runnable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Field as text; numbers and booleans are rendered, null counts as absent
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn build(index: usize, kind: ScenarioKind, fields: &Map<String, Value>) -> Result<Scenario, String> {
    let missing: Vec<&str> = kind
        .required_fields()
        .iter()
        .copied()
        .filter(|f| text_field(fields, f).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing {}", missing.join(", ")));
    }
    let get = |key: &str| text_field(fields, key).unwrap_or_default();
    let optional = |key: &str| text_field(fields, key).filter(|v| !v.is_empty());
    let date = |key: &str| {
        let raw = get(key);
        parse_date(&raw).ok_or_else(|| format!("{key} '{raw}' is not MM/DD/YYYY"))
    };

    let action = match kind {
        ScenarioKind::ValidLogin => ScenarioAction::ValidLogin {
            username: get("username"),
            password: get("password"),
        },
        ScenarioKind::InvalidLogin => ScenarioAction::InvalidLogin {
            username: get("username"),
            password: get("password"),
        },
        ScenarioKind::Transfer => {
            let amount = get("amount");
            if parse_amount(&amount).is_none() {
                return Err(format!("amount '{amount}' is not numeric"));
            }
            let from_account = get("from_account");
            let to_account = optional("to_account");
            if let Some(to) = &to_account {
                if to.starts_with(from_account.as_str()) || from_account.starts_with(to.as_str()) {
                    return Err(format!(
                        "to_account '{to}' must differ from from_account '{from_account}'"
                    ));
                }
            }
            ScenarioAction::Transfer {
                amount,
                from_account,
                to_account,
            }
        }
        ScenarioKind::TransferEmptyAmount => ScenarioAction::TransferEmptyAmount {
            from_account: optional("from_account"),
        },
        ScenarioKind::FilterByDate | ScenarioKind::FindTransactions => {
            let (from_date, to_date) = (date("from_date")?, date("to_date")?);
            if from_date > to_date {
                return Err(format!("from_date {from_date} is after to_date {to_date}"));
            }
            let account = get("account");
            if kind == ScenarioKind::FilterByDate {
                ScenarioAction::FilterByDate {
                    account,
                    from_date,
                    to_date,
                }
            } else {
                ScenarioAction::FindTransactions {
                    account,
                    from_date,
                    to_date,
                }
            }
        }
        ScenarioKind::SortTransactions => ScenarioAction::SortTransactions {
            account: get("account"),
            sort_by: get("sort_by"),
            order: get("order").parse().map_err(|e: ProbeError| e.to_string())?,
        },
        ScenarioKind::AccountSummary => ScenarioAction::AccountSummary,
        ScenarioKind::LoanApplication => ScenarioAction::LoanApplication {
            amount: get("amount"),
            down_payment: get("down_payment"),
            from_account: optional("from_account"),
            expect_submitted: match fields.get("expect_submitted") {
                None | Some(Value::Null) => true,
                Some(Value::Bool(b)) => *b,
                Some(other) => return Err(format!("expect_submitted '{other}' is not a boolean")),
            },
        },
        ScenarioKind::ContactBlank => ScenarioAction::ContactBlank,
        ScenarioKind::ContactForm => ScenarioAction::ContactForm {
            name: get("name"),
            email: get("email"),
            phone: get("phone"),
            message: get("message"),
        },
        ScenarioKind::Navigation => ScenarioAction::Navigation {
            link: get("link").parse().map_err(|e: ProbeError| e.to_string())?,
        },
        ScenarioKind::Logout => ScenarioAction::Logout,
        ScenarioKind::PasswordMasked => ScenarioAction::PasswordMasked,
    };

    let retries = match fields.get("retries") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| format!("retries '{n}' is not a small non-negative integer"))?,
        Some(other) => return Err(format!("retries '{other}' is not a number")),
    };

    Ok(Scenario {
        index,
        name: optional("name").unwrap_or_else(|| format!("{kind} #{}", index + 1)),
        retries,
        action,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    mod kind_tests {
        use super::*;

        #[test]
        fn test_label_normalization() {
            assert_eq!(ScenarioKind::from_label("VALID_LOGIN"), Some(ScenarioKind::ValidLogin));
            assert_eq!(ScenarioKind::from_label("Valid Login"), Some(ScenarioKind::ValidLogin));
            assert_eq!(
                ScenarioKind::from_label("transfer-empty-amount"),
                Some(ScenarioKind::TransferEmptyAmount)
            );
            assert_eq!(ScenarioKind::from_label("wire_fraud"), None);
        }

        #[test]
        fn test_every_label_round_trips() {
            for kind in ScenarioKind::ALL {
                assert_eq!(ScenarioKind::from_label(kind.label()), Some(kind));
            }
        }

        proptest! {
            #[test]
            fn prop_case_and_separators_ignored(idx in 0usize..ScenarioKind::ALL.len(), upper in any::<bool>(), sep in prop::sample::select(vec![" ", "-", "_", ""])) {
                let kind = ScenarioKind::ALL[idx];
                let mut label = kind.label().replace('_', sep);
                if upper {
                    label = label.to_uppercase();
                }
                prop_assert_eq!(ScenarioKind::from_label(&label), Some(kind));
            }
        }
    }

    mod verdict_tests {
        use super::*;

        #[test]
        fn test_verdict_from_error() {
            assert_eq!(Verdict::from_error(&ProbeError::precondition("one account")), Verdict::Skip);
            assert_eq!(
                Verdict::from_error(&ProbeError::SessionLost { message: "gone".into() }),
                Verdict::Skip
            );
            assert_eq!(Verdict::from_error(&ProbeError::assertion("mismatch")), Verdict::Fail);
        }

        #[test]
        fn test_sortedness() {
            assert!(is_sorted(&[1, 2, 2, 3], SortOrder::Ascending));
            assert!(!is_sorted(&[1, 3, 2], SortOrder::Ascending));
            assert!(is_sorted(&[3.0, 2.5, 2.5], SortOrder::Descending));
            assert!(is_sorted::<i32>(&[], SortOrder::Descending));
        }
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_seed_rows() {
            let plan = ScenarioPlan::from_rows(vec![
                json!({"scenario": "valid_login", "username": "john", "password": "demo"}),
                json!({"scenario": "invalid_login", "username": "john", "password": "wrong"}),
                json!({"scenario": "transfer", "amount": "100.00", "from_account": "13344"}),
                json!({"scenario": "transfer_empty_amount"}),
                json!({"scenario": "filter_by_date", "account": "13344", "from_date": "09/01/2025", "to_date": "09/30/2025"}),
                json!({"scenario": "contact_blank"}),
            ])
            .unwrap();
            assert_eq!(plan.len(), 6);
            assert!(plan.malformed.is_empty());
            assert_eq!(plan.scenarios[0].name, "valid_login #1");
            assert_eq!(
                plan.scenarios[4].action,
                ScenarioAction::FilterByDate {
                    account: "13344".into(),
                    from_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                    to_date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
                }
            );
        }

        #[test]
        fn test_unknown_label_fails_whole_plan() {
            let err = ScenarioPlan::from_rows(vec![
                json!({"scenario": "valid_login", "username": "john", "password": "demo"}),
                json!({"scenario": "mortgage"}),
            ])
            .unwrap_err();
            assert!(matches!(err, ProbeError::UnknownScenario { ref label } if label == "mortgage"));
        }

        #[test]
        fn test_malformed_rows_are_set_aside() {
            let plan = ScenarioPlan::from_rows(vec![
                json!({"scenario": "transfer", "amount": "100"}),
                json!({"scenario": "filter_by_date", "account": "1", "from_date": "2025-09-01", "to_date": "09/30/2025"}),
                json!("not a row"),
                json!({"username": "john"}),
                json!({"scenario": "account_summary"}),
            ])
            .unwrap();
            assert_eq!(plan.len(), 1);
            assert_eq!(plan.malformed.len(), 4);
            assert_eq!(plan.malformed[0].reason, "missing from_account");
            assert!(plan.malformed[1].reason.contains("from_date"));
            assert_eq!(plan.malformed[3].reason, "missing 'scenario' label");
        }

        #[test]
        fn test_session_and_menu_rows() {
            let plan = ScenarioPlan::from_rows(vec![
                json!({"scenario": "navigation", "link": "Find Transactions"}),
                json!({"scenario": "logout"}),
                json!({"scenario": "find_transactions", "account": "13455", "from_date": "09/01/2025", "to_date": "09/10/2025"}),
                json!({"scenario": "Password Masked"}),
                json!({"scenario": "navigation"}),
                json!({"scenario": "find_transactions", "account": "13455", "from_date": "09/10/2025", "to_date": "09/01/2025"}),
            ])
            .unwrap();
            assert_eq!(plan.len(), 4);
            assert_eq!(
                plan.scenarios[0].action,
                ScenarioAction::Navigation { link: NavLink::FindTransactions }
            );
            assert_eq!(plan.scenarios[1].action, ScenarioAction::Logout);
            assert_eq!(plan.scenarios[2].kind(), ScenarioKind::FindTransactions);
            assert_eq!(plan.scenarios[3].action, ScenarioAction::PasswordMasked);
            assert_eq!(plan.malformed[0].reason, "missing link");
            assert!(plan.malformed[1].reason.contains("after to_date"));
        }

        #[test]
        fn test_transfer_to_same_account_is_malformed() {
            let plan = ScenarioPlan::from_rows(vec![
                json!({"scenario": "transfer", "amount": "100", "from_account": "13344", "to_account": "13344"}),
                json!({"scenario": "transfer", "amount": "100", "from_account": "13344", "to_account": "133"}),
                json!({"scenario": "transfer", "amount": "100", "from_account": "133", "to_account": "13344"}),
                json!({"scenario": "transfer", "amount": "100", "from_account": "13344", "to_account": "13455"}),
            ])
            .unwrap();
            assert_eq!(plan.len(), 1);
            assert_eq!(plan.malformed.len(), 3);
            assert_eq!(
                plan.malformed[0].reason,
                "to_account '13344' must differ from from_account '13344'"
            );
            assert!(plan.malformed.iter().all(|row| row.reason.contains("must differ")));
        }

        #[test]
        fn test_numbers_name_and_retries() {
            let plan = ScenarioPlan::from_rows(vec![json!({
                "scenario": "Loan Application",
                "name": "small loan",
                "amount": 1000,
                "down_payment": 100,
                "expect_submitted": false,
                "retries": 2
            })])
            .unwrap();
            let scenario = &plan.scenarios[0];
            assert_eq!(scenario.name, "small loan");
            assert_eq!(scenario.retries, 2);
            assert_eq!(
                scenario.action,
                ScenarioAction::LoanApplication {
                    amount: "1000".into(),
                    down_payment: "100".into(),
                    from_account: None,
                    expect_submitted: false,
                }
            );
        }

        #[test]
        fn test_yaml_source() {
            let plan = ScenarioPlan::from_yaml_str(
                "- scenario: sort transactions\n  account: \"13344\"\n  sort_by: Date\n  order: Descending\n",
            )
            .unwrap();
            assert_eq!(plan.scenarios[0].kind(), ScenarioKind::SortTransactions);
        }

        #[test]
        fn test_load_json_file() {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("rows.json");
            std::fs::write(&path, r#"[{"scenario": "contact_blank"}]"#).unwrap();
            let plan = ScenarioPlan::load(&path).unwrap();
            assert_eq!(plan.scenarios[0].action, ScenarioAction::ContactBlank);
            let missing = ScenarioPlan::load(&dir.path().join("none.yaml")).unwrap_err();
            assert!(matches!(missing, ProbeError::DataSource { .. }));
        }
    }
}
