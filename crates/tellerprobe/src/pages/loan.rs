//! Loan request form.

use crate::engine::Engine;
use crate::locator::{Locator, LocatorSet};
use crate::page_object::PageModel;
use crate::result::ProbeResult;
use tracing::info;

const SUBMITTED_MARKERS: [&str; 4] = ["approved", "denied", "rejected", "submitted"];

/// Request a loan against a down payment
#[derive(Debug)]
pub struct LoanPage<'e> {
    engine: &'e Engine,
    amount: LocatorSet,
    down_payment: LocatorSet,
    from_account: LocatorSet,
    submit: LocatorSet,
    status: LocatorSet,
    message: LocatorSet,
    error: LocatorSet,
}

impl<'e> LoanPage<'e> {
    /// Loan page driven by `engine`
    #[must_use]
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            amount: LocatorSet::single(Locator::id("amount")).named("loan_amount"),
            down_payment: LocatorSet::single(Locator::id("downPayment")).named("down_payment"),
            from_account: LocatorSet::single(Locator::id("fromAccountId")).named("loan_from_account"),
            submit: LocatorSet::single(Locator::xpath("//input[@value='Apply Now' or @type='submit']"))
                .named("apply_button"),
            status: LocatorSet::single(Locator::id("loanStatus")).named("loan_status"),
            message: LocatorSet::single(Locator::css("#loanRequestApproved p"))
                .or(Locator::css("#loanRequestDenied p"))
                .named("loan_message"),
            error: LocatorSet::single(Locator::css("#rightPanel .error")).named("loan_error"),
        }
    }

    /// Fill and submit the form. `from` selects the collateral account by
    /// prefix; `None` keeps the preselected one.
    ///
    /// # Errors
    ///
    /// Returns error if the form cannot be driven
    pub fn apply(&self, amount: &str, down_payment: &str, from: Option<&str>) -> ProbeResult<()> {
        self.open()?;
        let policy = self.engine.default_policy();
        self.engine.type_text(&self.amount, amount, policy)?;
        self.engine.type_text(&self.down_payment, down_payment, policy)?;
        if let Some(from) = from {
            let _ = self
                .engine
                .select_option_starting_with(&self.from_account, from, policy)?;
        }
        self.engine.click(&self.submit, policy)?;
        info!(amount, down_payment, "loan requested");
        Ok(())
    }

    /// Status and explanation, space-joined; empty if no result showed
    #[must_use]
    pub fn result_text(&self) -> String {
        let status = self.engine.read(&self.status, self.engine.default_policy());
        let message = self.engine.read(&self.message, self.engine.short_policy());
        format!("{status} {message}").trim().to_string()
    }

    /// Result mentions approval
    #[must_use]
    pub fn is_loan_approved(&self) -> bool {
        let result = self.result_text().to_lowercase();
        result.contains("approved") || result.contains("congratulations")
    }

    /// The application reached a decision
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        let result = self.result_text().to_lowercase();
        SUBMITTED_MARKERS.iter().any(|m| result.contains(m))
    }

    /// Validation error; empty if none showed
    #[must_use]
    pub fn error(&self) -> String {
        self.engine.read(&self.error, self.engine.short_policy())
    }
}

impl PageModel for LoanPage<'_> {
    fn engine(&self) -> &Engine {
        self.engine
    }

    fn path(&self) -> &str {
        "requestloan.htm"
    }

    fn is_loaded(&self) -> bool {
        let policy = self.engine.short_policy();
        self.engine.is_displayed(&self.amount, policy)
            && self.engine.is_displayed(&self.down_payment, policy)
            && self.engine.is_displayed(&self.from_account, policy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::driver::{MockDriver, MockElement};
    use crate::engine::EngineSettings;
    use crate::wait::WaitPolicy;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine(driver: MockDriver, dir: &TempDir) -> (Engine, Arc<MockDriver>) {
        let shared = Arc::new(driver);
        let policy = WaitPolicy::from_millis(40, 5).unwrap();
        let engine = Engine::new(
            Box::new(Arc::clone(&shared)),
            EngineSettings {
                default_policy: policy.clone(),
                short_policy: policy,
                artifacts: ArtifactStore::new(dir.path()),
                action_attempts: 1,
                ..EngineSettings::default()
            },
        );
        (engine, shared)
    }

    #[test]
    fn test_apply_fills_form() {
        let dir = TempDir::new().unwrap();
        let (engine, driver) = engine(
            MockDriver::new()
                .with_element(Locator::id("amount"), MockElement::new("input", ""))
                .with_element(Locator::id("downPayment"), MockElement::new("input", ""))
                .with_element(Locator::id("fromAccountId"), MockElement::select(["13344"]))
                .with_element(
                    Locator::xpath("//input[@value='Apply Now' or @type='submit']"),
                    MockElement::new("input", "Apply Now"),
                ),
            &dir,
        );
        LoanPage::new(&engine).apply("1000", "100", Some("133")).unwrap();
        assert_eq!(driver.typed_text(&Locator::id("downPayment")).as_deref(), Some("100"));
        assert_eq!(driver.selected_option(&Locator::id("fromAccountId")).as_deref(), Some("13344"));
    }

    #[test]
    fn test_result_classification() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine(
            MockDriver::new()
                .with_element(Locator::id("loanStatus"), MockElement::new("td", "Denied"))
                .with_element(
                    Locator::css("#loanRequestDenied p"),
                    MockElement::new("p", "We cannot grant a loan in that amount with your available funds."),
                ),
            &dir,
        );
        let page = LoanPage::new(&engine);
        assert!(page.result_text().starts_with("Denied We cannot"));
        assert!(page.is_submitted());
        assert!(!page.is_loan_approved());
    }

    #[test]
    fn test_no_result_is_not_submitted() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine(MockDriver::new(), &dir);
        let page = LoanPage::new(&engine);
        assert_eq!(page.result_text(), "");
        assert!(!page.is_submitted());
    }
}
