//! Order submission and confirmation scraping
//!
//! Submitting must succeed. Scraping the confirmation page never fails the
//! order: each field falls back to a fixed default when no rule matches.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::OrderConfig;
use crate::driver::{settle, wait_for_text, Driver};
use crate::error::{Error, Result};
use crate::locator::Locator;

pub const PLACE_ORDER_LABEL: &str = "Place Order";

/// Text that shows the order went through
pub const CONFIRMATION_MARKERS: &[&str] = &["Order Placed", "Order Confirmed"];

/// Reported when the confirmation page shows no recognizable order number
pub const ORDER_NUMBER_SENTINEL: &str = "PENDING";

/// Reported when the confirmation page shows no pickup estimate
pub const DEFAULT_PICKUP_ESTIMATE: &str = "20-30 minutes";

/// A named pattern whose first capture group is the extracted value
#[derive(Debug)]
pub struct ExtractionRule {
    pub name: &'static str,
    pattern: Regex,
}

impl ExtractionRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid extraction pattern"),
        }
    }

    /// Trimmed first capture group, if the pattern matches
    pub fn capture(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

pub static ORDER_NUMBER_RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    vec![
        ExtractionRule::new(
            "order-number-label",
            r"(?i)order\s*(?:number|no\.?|id)\s*[:#]?\s*#?\s*([a-z0-9-]*\d[a-z0-9-]*)",
        ),
        ExtractionRule::new("order-hash", r"(?i)order\s*#\s*([a-z0-9-]*\d[a-z0-9-]*)"),
        ExtractionRule::new(
            "confirmation-label",
            r"(?i)confirmation\s*(?:number|code|#)?\s*[:#]?\s*#?\s*([a-z0-9-]*\d[a-z0-9-]*)",
        ),
        ExtractionRule::new("bare-hash", r"#\s*(\d{3,})"),
    ]
});

pub static PICKUP_TIME_RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    vec![
        ExtractionRule::new(
            "ready-in",
            r"(?i)ready\s+(?:for\s+pick\s*up\s+)?in\s+(?:about\s+)?(\d+\s*(?:-|–|to)\s*\d+\s*min(?:ute)?s?|\d+\s*min(?:ute)?s?)",
        ),
        ExtractionRule::new(
            "ready-at",
            r"(?i)(?:ready|pick\s*up)\s+(?:time\s*:?\s*|at\s+|by\s+)(\d{1,2}:\d{2}\s*(?:[ap]\.?m\.?)?)",
        ),
        ExtractionRule::new(
            "minute-range",
            r"(?i)(\d+\s*(?:-|–|to)\s*\d+\s*min(?:ute)?s?)",
        ),
        ExtractionRule::new("clock-time", r"(?i)(\d{1,2}:\d{2}\s*[ap]\.?m\.?)"),
    ]
});

pub static TOTAL_RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    vec![
        ExtractionRule::new(
            "total-label",
            r"(?i)\b(?:order\s+)?total\s*:?\s*(\$\s?\d[\d,]*(?:\.\d{2})?)",
        ),
        ExtractionRule::new("amount", r"(\$\d[\d,]*\.\d{2})"),
    ]
});

/// First capture among `rules`, tried in order
pub fn first_match(rules: &[ExtractionRule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        let value = rule.capture(text)?;
        tracing::debug!(rule = rule.name, value = %value, "extraction rule matched");
        Some(value)
    })
}

/// Fields scraped from the confirmation page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub order_number: String,
    pub pickup_estimate: String,
    pub total: Option<String>,
}

impl Confirmation {
    /// Scrape confirmation text, substituting defaults for missing fields
    pub fn extract(text: &str) -> Self {
        let order_number = first_match(&ORDER_NUMBER_RULES, text).unwrap_or_else(|| {
            tracing::warn!("no order number on confirmation page");
            ORDER_NUMBER_SENTINEL.to_string()
        });
        let pickup_estimate = first_match(&PICKUP_TIME_RULES, text).unwrap_or_else(|| {
            tracing::warn!("no pickup estimate on confirmation page");
            DEFAULT_PICKUP_ESTIMATE.to_string()
        });
        let total = first_match(&TOTAL_RULES, text);
        if total.is_none() {
            tracing::warn!("no total on confirmation page");
        }

        Self {
            order_number,
            pickup_estimate,
            total,
        }
    }
}

/// Places the order and reads back the confirmation
pub struct Finalizer<'a> {
    driver: &'a dyn Driver,
    locator: &'a Locator,
    config: &'a OrderConfig,
}

impl<'a> Finalizer<'a> {
    pub fn new(driver: &'a dyn Driver, locator: &'a Locator, config: &'a OrderConfig) -> Self {
        Self {
            driver,
            locator,
            config,
        }
    }

    /// Click "Place Order" and wait for the confirmation marker
    pub async fn submit(&self) -> Result<()> {
        self.locator
            .activate(self.driver, PLACE_ORDER_LABEL)
            .await
            .map_err(|e| Error::OrderSubmissionFailed(format!("could not place order: {e}")))?;
        settle(self.config.settle_delay).await;

        let marker = wait_for_text(
            self.driver,
            CONFIRMATION_MARKERS,
            self.config.confirmation_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|e| Error::OrderSubmissionFailed(format!("no confirmation: {e}")))?;

        tracing::info!(marker = %marker, "order confirmed");
        Ok(())
    }

    /// Scrape the confirmation page. Never fails.
    pub async fn extract(&self) -> Confirmation {
        let text = match self.driver.page_text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "could not read confirmation page");
                String::new()
            }
        };
        Confirmation::extract(&text)
    }
}
