//! Checkout flow
//!
//! A straight line of stages from a loaded menu to an order that is ready to
//! submit. Each transition is a locate-and-click or locate-and-fill followed
//! by a settle delay; the first unrecoverable failure ends the flow.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::OrderConfig;
use crate::diagnostics::Recorder;
use crate::driver::{settle, wait_for_text, Driver, ElementInfo, ElementQuery};
use crate::error::{Error, Result};
use crate::locator::{find_where, normalize, Locator};

/// Where the session is in the ordering flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    MenuLoaded,
    CartFilled,
    CheckoutInitiated,
    GuestSelected,
    GuestInfoFilled,
    GuestFormSubmitted,
    NotesAdded,
    PaymentVerified,
    ReadyToSubmit,
    OrderPlaced,
}

impl CheckoutStage {
    /// Kebab-case name used for logs and snapshot labels
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStage::MenuLoaded => "menu-loaded",
            CheckoutStage::CartFilled => "cart-filled",
            CheckoutStage::CheckoutInitiated => "checkout-initiated",
            CheckoutStage::GuestSelected => "guest-selected",
            CheckoutStage::GuestInfoFilled => "guest-info-filled",
            CheckoutStage::GuestFormSubmitted => "guest-form-submitted",
            CheckoutStage::NotesAdded => "notes-added",
            CheckoutStage::PaymentVerified => "payment-verified",
            CheckoutStage::ReadyToSubmit => "ready-to-submit",
            CheckoutStage::OrderPlaced => "order-placed",
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels of the buttons that move the flow forward
pub const CHECKOUT_LABEL: &str = "Checkout";
pub const GUEST_LABEL: &str = "Continue as Guest";
pub const GUEST_SUBMIT_LABEL: &str = "Continue";

/// Text that shows the guest form was accepted
pub const CHECKOUT_PAGE_MARKERS: &[&str] = &["Checkout", "Payment Details"];

/// Text inputs on the guest form
const FORM_INPUTS: &str = "input, textarea";

/// Fields for special instructions, matched by placeholder or label
const INSTRUCTION_HINTS: &[&str] = &["instruction", "special request", "note"];

const PAYMENT_RADIOS: &str = "input[type='radio'], [role='radio']";

/// Guest form field, identified by placeholder text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestField {
    FirstName,
    LastName,
    Email,
    Phone,
}

impl GuestField {
    /// Fill order on the form
    pub const ALL: [GuestField; 4] = [
        GuestField::FirstName,
        GuestField::LastName,
        GuestField::Email,
        GuestField::Phone,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GuestField::FirstName => "first name",
            GuestField::LastName => "last name",
            GuestField::Email => "email",
            GuestField::Phone => "phone",
        }
    }

    /// Placeholder fragments that identify the field
    fn hints(&self) -> &'static [&'static str] {
        match self {
            GuestField::FirstName => &["first name", "first"],
            GuestField::LastName => &["last name", "last"],
            GuestField::Email => &["email", "e-mail"],
            GuestField::Phone => &["phone", "mobile"],
        }
    }

    fn matches(&self, el: &ElementInfo) -> bool {
        let placeholder = el.placeholder.as_deref().map(normalize).unwrap_or_default();
        !placeholder.is_empty() && self.hints().iter().any(|h| placeholder.contains(h))
    }
}

/// What gets typed into the guest form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl GuestInfo {
    /// First name is the first word of the customer's name; the last name is
    /// the configured bot tag so automated orders stand out.
    pub fn new(customer_name: &str, customer_phone: &str, config: &OrderConfig) -> Self {
        Self {
            first_name: customer_name
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            last_name: config.bot_last_name.clone(),
            email: config.contact_email.clone(),
            phone: normalize_phone(customer_phone),
        }
    }

    pub fn value(&self, field: GuestField) -> &str {
        match field {
            GuestField::FirstName => &self.first_name,
            GuestField::LastName => &self.last_name,
            GuestField::Email => &self.email,
            GuestField::Phone => &self.phone,
        }
    }
}

/// Keep only the digits
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Drives the session from a filled cart to an order ready to submit
pub struct CheckoutFlow<'a> {
    driver: &'a dyn Driver,
    locator: &'a Locator,
    config: &'a OrderConfig,
    stage: CheckoutStage,
}

impl<'a> CheckoutFlow<'a> {
    pub fn new(driver: &'a dyn Driver, locator: &'a Locator, config: &'a OrderConfig) -> Self {
        Self {
            driver,
            locator,
            config,
            stage: CheckoutStage::CartFilled,
        }
    }

    /// Last stage reached
    pub fn stage(&self) -> CheckoutStage {
        self.stage
    }

    /// Stage the next transition is trying to reach
    pub fn next_stage(&self) -> CheckoutStage {
        match self.stage {
            CheckoutStage::MenuLoaded => CheckoutStage::CartFilled,
            CheckoutStage::CartFilled => CheckoutStage::CheckoutInitiated,
            CheckoutStage::CheckoutInitiated => CheckoutStage::GuestSelected,
            CheckoutStage::GuestSelected => CheckoutStage::GuestInfoFilled,
            CheckoutStage::GuestInfoFilled => CheckoutStage::GuestFormSubmitted,
            CheckoutStage::GuestFormSubmitted => CheckoutStage::NotesAdded,
            CheckoutStage::NotesAdded => CheckoutStage::PaymentVerified,
            CheckoutStage::PaymentVerified => CheckoutStage::ReadyToSubmit,
            CheckoutStage::ReadyToSubmit | CheckoutStage::OrderPlaced => CheckoutStage::OrderPlaced,
        }
    }

    fn advance(&mut self, stage: CheckoutStage) {
        tracing::info!(stage = %stage, "checkout stage reached");
        self.stage = stage;
    }

    /// Open checkout from the menu
    pub async fn initiate_checkout(&mut self) -> Result<()> {
        self.locator.activate(self.driver, CHECKOUT_LABEL).await?;
        settle(self.config.settle_delay).await;
        self.advance(CheckoutStage::CheckoutInitiated);
        Ok(())
    }

    /// Choose guest checkout
    pub async fn select_guest(&mut self) -> Result<()> {
        self.locator.activate(self.driver, GUEST_LABEL).await?;
        settle(self.config.settle_delay).await;
        self.advance(CheckoutStage::GuestSelected);
        Ok(())
    }

    /// Fill first name, last name, email, and phone, in that order.
    /// Every field must be present.
    pub async fn fill_guest_info(&mut self, guest: &GuestInfo) -> Result<()> {
        for field in GuestField::ALL {
            let input = find_where(self.driver, &ElementQuery::css(FORM_INPUTS), |el| {
                field.matches(el)
            })
            .await
            .ok()
            .flatten()
            .ok_or_else(|| Error::RequiredFieldMissing(field.name().to_string()))?;

            self.driver
                .type_text(&input.handle, guest.value(field), self.config.keystroke_delay)
                .await?;
            tracing::debug!(field = field.name(), "filled guest field");
        }
        self.advance(CheckoutStage::GuestInfoFilled);
        Ok(())
    }

    /// Submit the guest form and wait for the checkout page
    pub async fn submit_guest_form(&mut self) -> Result<()> {
        self.locator
            .activate(self.driver, GUEST_SUBMIT_LABEL)
            .await?;
        settle(self.config.settle_delay).await;

        let timeout = self.config.transition_timeout;
        wait_for_text(
            self.driver,
            CHECKOUT_PAGE_MARKERS,
            timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|_| Error::StateTransitionTimeout {
            stage: CheckoutStage::GuestFormSubmitted,
            markers: CHECKOUT_PAGE_MARKERS.iter().map(|m| m.to_string()).collect(),
            timeout_ms: timeout.as_millis() as u64,
        })?;

        self.advance(CheckoutStage::GuestFormSubmitted);
        Ok(())
    }

    /// Type special instructions if the site offers a field. Never fails.
    pub async fn add_instructions(&mut self, instructions: Option<&str>) -> bool {
        let Some(instructions) = instructions else {
            return false;
        };

        let field = find_where(self.driver, &ElementQuery::css(FORM_INPUTS), |el| {
            let hint = normalize(
                el.placeholder
                    .as_deref()
                    .or(el.label.as_deref())
                    .unwrap_or_default(),
            );
            INSTRUCTION_HINTS.iter().any(|h| hint.contains(h))
        })
        .await;

        let typed = match field {
            Ok(Some(field)) => {
                self.driver
                    .type_text(&field.handle, instructions, self.config.keystroke_delay)
                    .await
            }
            Ok(None) => Err(Error::ElementNotFound("special instructions".into())),
            Err(e) => Err(e),
        };

        match typed {
            Ok(()) => {
                settle(self.config.settle_delay).await;
                self.advance(CheckoutStage::NotesAdded);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "special instructions not entered");
                false
            }
        }
    }

    /// Make sure "cash at restaurant" is the selected payment. Failures are
    /// logged and the site's default is trusted.
    pub async fn verify_payment(&mut self) -> bool {
        let verified = match self.select_cash_payment().await {
            Ok(verified) => verified,
            Err(e) => {
                tracing::warn!(error = %e, "payment method check failed");
                false
            }
        };
        if !verified {
            tracing::warn!("cash payment not confirmed; relying on site default");
        }
        self.advance(CheckoutStage::PaymentVerified);
        verified
    }

    async fn select_cash_payment(&self) -> Result<bool> {
        let Some(radio) =
            find_where(self.driver, &ElementQuery::css(PAYMENT_RADIOS), is_cash_at_restaurant)
                .await?
        else {
            return Ok(false);
        };

        if radio.checked == Some(true) {
            tracing::debug!("cash payment already selected");
            return Ok(true);
        }

        self.driver.click(&radio.handle).await?;
        settle(self.config.settle_delay).await;
        tracing::info!("selected cash payment");
        Ok(true)
    }

    /// Run every stage from a filled cart to ready-to-submit, snapshotting
    /// after each transition
    pub async fn run(
        &mut self,
        guest: &GuestInfo,
        instructions: Option<&str>,
        recorder: &mut Recorder,
    ) -> Result<()> {
        self.initiate_checkout().await?;
        recorder.capture(self.driver, self.stage.as_str()).await;
        self.select_guest().await?;
        recorder.capture(self.driver, self.stage.as_str()).await;
        self.fill_guest_info(guest).await?;
        recorder.capture(self.driver, self.stage.as_str()).await;
        self.submit_guest_form().await?;
        recorder.capture(self.driver, self.stage.as_str()).await;
        if self.add_instructions(instructions).await {
            recorder.capture(self.driver, self.stage.as_str()).await;
        }
        self.verify_payment().await;
        self.advance(CheckoutStage::ReadyToSubmit);
        recorder.capture(self.driver, self.stage.as_str()).await;
        Ok(())
    }
}

fn is_cash_at_restaurant(el: &ElementInfo) -> bool {
    let name = el.own_name().to_lowercase();
    name.contains("cash") && name.contains("restaurant")
}
