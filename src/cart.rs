//! Cart building
//!
//! Items are added strictly one after another: the site's cart is a single
//! piece of shared state. Finding the item and confirming the add must
//! succeed; everything in between (required defaults, modifications, extra
//! quantity) is best-effort because the customization modal varies the most
//! from item to item.

use crate::config::OrderConfig;
use crate::diagnostics::Recorder;
use crate::driver::{settle, Driver, ElementInfo, ElementQuery};
use crate::error::{Error, Result};
use crate::locator::{find_where, normalize, Locator, INTERACTIVE_TAGS};
use crate::parser::ParsedLineItem;

/// Text the modal shows when a choice must be made before adding
pub const REQUIRED_SELECTION_MARKERS: &[&str] = &["choose a minimum of", "required"];

/// Option chosen when a required selection is present
pub const DEFAULT_OPTION_TEXT: &str = "regular";

/// The customization modal itself
pub const MODAL_SURFACE: &str = "[role='dialog'], .modal";

/// Clickable controls inside the customization modal
pub const MODAL_CONTROLS: &str = "[role='dialog'] label, [role='dialog'] button, \
     [role='dialog'] [role='option'], [role='dialog'] input[type='radio'], \
     [role='dialog'] input[type='checkbox'], .modal label, .modal button";

/// Button text prefixes that confirm the add
const ADD_CONFIRM_PREFIXES: &[&str] = &["add to cart", "add to order", "add to bag", "add item"];

/// Structural fallbacks for the add button, tried in order
pub const ADD_CONFIRM_FALLBACKS: &[&str] = &[
    "[role='dialog'] button[type='submit']",
    "[data-testid*='add-to-cart']",
    "button[class*='add-to-cart']",
    ".modal-footer button",
    "[role='dialog'] footer button",
];

/// Adds parsed items to the cart through the page
pub struct CartBuilder<'a> {
    driver: &'a dyn Driver,
    locator: &'a Locator,
    config: &'a OrderConfig,
}

impl<'a> CartBuilder<'a> {
    pub fn new(driver: &'a dyn Driver, locator: &'a Locator, config: &'a OrderConfig) -> Self {
        Self {
            driver,
            locator,
            config,
        }
    }

    /// Add every item in order. The first item that cannot be added stops
    /// the whole cart; later items are never attempted.
    pub async fn add_items(&self, items: &[ParsedLineItem], recorder: &mut Recorder) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            tracing::info!(
                item = %item.canonical_name,
                quantity = item.quantity,
                position = index + 1,
                total = items.len(),
                "adding item to cart"
            );
            self.add_item(item)
                .await
                .map_err(|e| Error::cart_addition(&item.canonical_name, e))?;
            recorder
                .capture(self.driver, &format!("item-added-{}", index + 1))
                .await;
        }
        Ok(())
    }

    /// Add a single item, including its customizations
    pub async fn add_item(&self, item: &ParsedLineItem) -> Result<()> {
        self.locator
            .activate(self.driver, &item.canonical_name)
            .await?;
        settle(self.config.modal_settle_delay).await;

        if let Err(e) = self.select_required_default().await {
            tracing::warn!(item = %item.canonical_name, error = %e, "default selection failed");
        }

        for modification in &item.modifications {
            match self.apply_modification(modification).await {
                Ok(true) => {
                    tracing::debug!(item = %item.canonical_name, modification, "applied modification")
                }
                Ok(false) => {
                    tracing::warn!(item = %item.canonical_name, modification, "modification not offered")
                }
                Err(e) => {
                    tracing::warn!(item = %item.canonical_name, modification, error = %e, "modification failed")
                }
            }
        }

        if item.quantity > 1 {
            let reached = self.increment_quantity(item.quantity - 1).await;
            if reached + 1 < item.quantity {
                tracing::warn!(
                    item = %item.canonical_name,
                    requested = item.quantity,
                    reached = reached + 1,
                    "could not raise quantity"
                );
            }
        }

        self.confirm_add(&item.canonical_name).await?;
        settle(self.config.settle_delay).await;
        Ok(())
    }

    /// When the modal demands a choice, pick the "regular" option.
    /// Returns whether anything was clicked.
    async fn select_required_default(&self) -> Result<bool> {
        let surface = self.driver.query(&ElementQuery::css(MODAL_SURFACE)).await?;
        if !surface
            .iter()
            .filter(|el| el.visible)
            .any(|el| demands_selection(&el.text))
        {
            return Ok(false);
        }

        let option = find_where(self.driver, &ElementQuery::css(MODAL_CONTROLS), |el| {
            normalize(el.own_name()).contains(DEFAULT_OPTION_TEXT)
        })
        .await?
        .ok_or_else(|| Error::ElementNotFound(DEFAULT_OPTION_TEXT.into()))?;

        self.driver.click(&option.handle).await?;
        settle(self.config.settle_delay).await;
        tracing::debug!(option = %option.display_text(), "selected required default");
        Ok(true)
    }

    async fn apply_modification(&self, modification: &str) -> Result<bool> {
        let wanted = normalize(modification);
        let control = find_where(self.driver, &ElementQuery::css(MODAL_CONTROLS), |el| {
            let text = normalize(el.display_text());
            !text.is_empty() && text.contains(&wanted)
        })
        .await?;

        match control {
            Some(control) => {
                self.driver.click(&control.handle).await?;
                settle(self.config.settle_delay).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Press "+" up to `times` times; stops at the first failure.
    /// Returns how many presses went through.
    async fn increment_quantity(&self, times: u32) -> u32 {
        for done in 0..times {
            let pressed = match find_where(
                self.driver,
                &ElementQuery::css(MODAL_CONTROLS),
                is_increment_control,
            )
            .await
            {
                Ok(Some(plus)) => self.driver.click(&plus.handle).await,
                Ok(None) => Err(Error::ElementNotFound("+".into())),
                Err(e) => Err(e),
            };

            if let Err(e) = pressed {
                tracing::warn!(error = %e, "quantity increment failed");
                return done;
            }
            settle(self.config.settle_delay).await;
        }
        times
    }

    async fn confirm_add(&self, item: &str) -> Result<()> {
        let primary = find_where(self.driver, &ElementQuery::css(INTERACTIVE_TAGS), |el| {
            let text = normalize(el.display_text());
            ADD_CONFIRM_PREFIXES.iter().any(|p| text.starts_with(p))
        })
        .await;

        match primary {
            Ok(Some(button)) => {
                tracing::debug!(item, text = %button.display_text(), "confirming add");
                return self.driver.click(&button.handle).await;
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(item, error = %e, "add button text search failed"),
        }

        for selector in ADD_CONFIRM_FALLBACKS {
            match find_where(self.driver, &ElementQuery::css(*selector), |_| true).await {
                Ok(Some(button)) => {
                    tracing::debug!(item, selector, "confirming add via fallback selector");
                    return self.driver.click(&button.handle).await;
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(item, selector, error = %e, "fallback selector failed"),
            }
        }

        Err(Error::AddToCartFailed(item.to_string()))
    }
}

fn demands_selection(text: &str) -> bool {
    let text = text.to_lowercase();
    REQUIRED_SELECTION_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

/// A "+" style button sitting next to a numeric counter
fn is_increment_control(el: &ElementInfo) -> bool {
    let text = el.text.trim();
    let label = el.label.as_deref().unwrap_or("").to_lowercase();
    let looks_like_plus = text == "+"
        || text == "\u{ff0b}"
        || label.contains("increase")
        || label.contains("increment")
        || label.contains("add one");
    looks_like_plus && el.context.chars().any(|c| c.is_ascii_digit())
}
