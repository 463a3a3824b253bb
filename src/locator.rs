//! Text-based element location
//!
//! The ordering site has no stable ids or test attributes, so elements are
//! found by their visible text. A [`Locator`] tries an ordered list of
//! [`LocatorStrategy`] values and stops at the first one that produces an
//! element. Errors inside a strategy count as "no match".

use crate::driver::{Driver, ElementInfo, ElementQuery};
use crate::error::{Error, Result};

/// Tags a user would normally click
pub const INTERACTIVE_TAGS: &str =
    "button, a, [role='button'], input[type='submit'], input[type='button']";

/// Interactive tags plus the containers sites wrap clickable text in
pub const CONTAINER_TAGS: &str = "button, a, [role='button'], [role='option'], label, \
     span, div, p, li, h1, h2, h3, h4, h5, h6, td";

/// One way of turning a label into an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorStrategy {
    /// Whole text equals the label, ignoring case and surrounding whitespace
    ExactText { selector: &'static str },
    /// Text contains the label, ignoring case; the most specific match wins
    ContainsText { selector: &'static str },
    /// XPath search over direct text nodes
    XPathContains,
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::ExactText { .. } => "exact-text",
            LocatorStrategy::ContainsText { .. } => "contains-text",
            LocatorStrategy::XPathContains => "xpath-contains",
        }
    }

    /// The query this strategy issues for `label`
    pub fn query(&self, label: &str) -> ElementQuery {
        match self {
            LocatorStrategy::ExactText { selector } | LocatorStrategy::ContainsText { selector } => {
                ElementQuery::css(*selector)
            }
            LocatorStrategy::XPathContains => ElementQuery::xpath(text_contains_xpath(label)),
        }
    }

    /// Pick this strategy's element out of the query results
    pub fn select(&self, label: &str, candidates: Vec<ElementInfo>) -> Option<ElementInfo> {
        let wanted = normalize(label);
        let mut visible = candidates.into_iter().filter(|el| el.visible);

        match self {
            LocatorStrategy::ExactText { .. } => {
                visible.find(|el| normalize(el.display_text()) == wanted)
            }
            LocatorStrategy::ContainsText { .. } => visible
                .filter(|el| normalize(el.display_text()).contains(&wanted))
                // min_by_key keeps the first of equal keys, so ties go to document order
                .min_by_key(|el| el.display_text().chars().count()),
            LocatorStrategy::XPathContains => visible.next(),
        }
    }

    /// Run this strategy once
    pub async fn attempt(&self, driver: &dyn Driver, label: &str) -> Result<Option<ElementInfo>> {
        let candidates = driver.query(&self.query(label)).await?;
        Ok(self.select(label, candidates))
    }
}

/// Ordered strategy list; first success wins
#[derive(Debug, Clone)]
pub struct Locator {
    strategies: Vec<LocatorStrategy>,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            strategies: vec![
                LocatorStrategy::ExactText {
                    selector: INTERACTIVE_TAGS,
                },
                LocatorStrategy::ContainsText {
                    selector: CONTAINER_TAGS,
                },
                LocatorStrategy::XPathContains,
            ],
        }
    }
}

impl Locator {
    pub fn new(strategies: Vec<LocatorStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }

    /// Resolve `label` to one element, or fail with `ElementNotFound`
    pub async fn locate(&self, driver: &dyn Driver, label: &str) -> Result<ElementInfo> {
        if normalize(label).is_empty() {
            return Err(Error::ElementNotFound(label.to_string()));
        }

        for strategy in &self.strategies {
            match strategy.attempt(driver, label).await {
                Ok(Some(element)) => {
                    tracing::debug!(
                        label,
                        strategy = strategy.name(),
                        tag = %element.tag,
                        "located element"
                    );
                    return Ok(element);
                }
                Ok(None) => {
                    tracing::debug!(label, strategy = strategy.name(), "no match");
                }
                Err(e) => {
                    tracing::debug!(label, strategy = strategy.name(), error = %e, "strategy failed");
                }
            }
        }

        Err(Error::ElementNotFound(label.to_string()))
    }

    /// Locate and click. A click failure is not retried with later strategies.
    pub async fn activate(&self, driver: &dyn Driver, label: &str) -> Result<ElementInfo> {
        let element = self.locate(driver, label).await?;
        driver.click(&element.handle).await?;
        Ok(element)
    }

    /// Like [`Locator::activate`] but `Ok(false)` when nothing matched
    pub async fn try_activate(&self, driver: &dyn Driver, label: &str) -> Result<bool> {
        match self.activate(driver, label).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// First visible element from `query` satisfying `predicate`
pub async fn find_where<P>(
    driver: &dyn Driver,
    query: &ElementQuery,
    predicate: P,
) -> Result<Option<ElementInfo>>
where
    P: Fn(&ElementInfo) -> bool,
{
    let candidates = driver.query(query).await?;
    Ok(candidates
        .into_iter()
        .find(|el| el.visible && predicate(el)))
}

/// Lowercase with internal whitespace collapsed
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `//*[text()[contains(lowercase(.), needle)]]`, with the needle quoted safely
pub fn text_contains_xpath(label: &str) -> String {
    const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
    format!(
        "//*[text()[contains(translate(normalize-space(.), '{UPPER}', '{LOWER}'), {})]]",
        xpath_literal(&normalize(label))
    )
}

fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
