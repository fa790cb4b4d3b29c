//! Locators: declarative descriptions of where an element lives.
//!
//! A [`Locator`] is a plain value. A [`LocatorSet`] is an ordered, non-empty
//! list of alternatives for the same logical element, tried front to back.
//!
//! ```
//! use tellerprobe::{Locator, LocatorSet};
//!
//! let submit = LocatorSet::single(Locator::css("input[type='submit'][value='Log In']"))
//!     .or(Locator::xpath("//input[@value='Log In']"));
//! assert_eq!(submit.len(), 2);
//! ```

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How to find one element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// `id` attribute
    Id(String),
    /// `name` attribute
    Name(String),
    /// Link whose visible text equals the value
    LinkText(String),
    /// Link whose visible text contains the value
    PartialLinkText(String),
    /// Structural path
    #[serde(rename = "xpath")]
    XPath(String),
    /// Style selector
    Css(String),
}

/// Query form a driver can execute directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
}

impl Locator {
    /// Locate by `id`
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self::Id(value.into())
    }

    /// Locate by `name`
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::Name(value.into())
    }

    /// Locate a link by exact text
    #[must_use]
    pub fn link_text(value: impl Into<String>) -> Self {
        Self::LinkText(value.into())
    }

    /// Locate a link by partial text
    #[must_use]
    pub fn partial_link_text(value: impl Into<String>) -> Self {
        Self::PartialLinkText(value.into())
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::XPath(value.into())
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::Css(value.into())
    }

    /// The raw value, without the strategy
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Id(v)
            | Self::Name(v)
            | Self::LinkText(v)
            | Self::PartialLinkText(v)
            | Self::XPath(v)
            | Self::Css(v) => v,
        }
    }

    /// Strategy name used in reports
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::Id(_) => "id",
            Self::Name(_) => "name",
            Self::LinkText(_) => "link",
            Self::PartialLinkText(_) => "partial-link",
            Self::XPath(_) => "xpath",
            Self::Css(_) => "css",
        }
    }

    /// Translate into a CSS or XPath query
    #[must_use]
    pub fn to_query(&self) -> Query {
        match self {
            Self::Id(v) => Query::Css(format!("[id={}]", css_string(v))),
            Self::Name(v) => Query::Css(format!("[name={}]", css_string(v))),
            Self::LinkText(v) => Query::XPath(format!("//a[normalize-space(.)={}]", xpath_string(v))),
            Self::PartialLinkText(v) => {
                Query::XPath(format!("//a[contains(normalize-space(.), {})]", xpath_string(v)))
            }
            Self::XPath(v) => Query::XPath(v.clone()),
            Self::Css(v) => Query::Css(v.clone()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Quote a value as a CSS string literal
fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote a value as an XPath string literal; XPath 1.0 has no escapes
pub(crate) fn xpath_string(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Ordered, non-empty alternatives for one logical element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Locator>", into = "Vec<Locator>")]
pub struct LocatorSet {
    locators: Vec<Locator>,
    label: Option<String>,
}

impl LocatorSet {
    /// A set with one locator
    #[must_use]
    pub fn single(locator: Locator) -> Self {
        Self {
            locators: vec![locator],
            label: None,
        }
    }

    /// Build from a list
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::InvalidConfig`] if `locators` is empty
    pub fn new(locators: Vec<Locator>) -> ProbeResult<Self> {
        if locators.is_empty() {
            return Err(ProbeError::invalid_config("locator set must not be empty"));
        }
        Ok(Self {
            locators,
            label: None,
        })
    }

    /// Name the logical element; used to tag diagnostics
    #[must_use]
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Diagnostic label, falling back to the primary locator
    #[must_use]
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.primary().to_string())
    }

    /// Append an alternative, tried after the existing ones
    #[must_use]
    pub fn or(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, Locator> {
        self.locators.iter()
    }

    /// Number of alternatives (always at least one)
    #[must_use]
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    /// Always false; present for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The preferred locator
    #[must_use]
    pub fn primary(&self) -> &Locator {
        &self.locators[0]
    }
}

impl From<Locator> for LocatorSet {
    fn from(locator: Locator) -> Self {
        Self::single(locator)
    }
}

impl TryFrom<Vec<Locator>> for LocatorSet {
    type Error = ProbeError;

    fn try_from(locators: Vec<Locator>) -> ProbeResult<Self> {
        Self::new(locators)
    }
}

impl From<LocatorSet> for Vec<Locator> {
    fn from(set: LocatorSet) -> Self {
        set.locators
    }
}

impl<'a> IntoIterator for &'a LocatorSet {
    type Item = &'a Locator;
    type IntoIter = std::slice::Iter<'a, Locator>;

    fn into_iter(self) -> Self::IntoIter {
        self.locators.iter()
    }
}

impl fmt::Display for LocatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, locator) in self.locators.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{locator}")?;
        }
        Ok(())
    }
}
