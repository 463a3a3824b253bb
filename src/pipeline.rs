//! Order placement pipeline
//!
//! Runs parse, menu load, cart, checkout, and submission strictly in
//! sequence against one [`Driver`]. Whatever happens, the caller gets an
//! [`OrderResult`] back; errors never escape this module.

use crate::browser::ChromeDriver;
use crate::cart::CartBuilder;
use crate::checkout::{CheckoutFlow, CheckoutStage, GuestInfo};
use crate::config::OrderConfig;
use crate::diagnostics::Recorder;
use crate::driver::{settle, Driver};
use crate::error::{Error, Result};
use crate::finalize::{Confirmation, Finalizer};
use crate::locator::Locator;
use crate::order::{OrderRequest, OrderResult};
use crate::parser::parse_items;

/// Snapshot label for the capture taken after an abort
pub const ERROR_SNAPSHOT_LABEL: &str = "error";

/// Places pickup orders on one restaurant's site
#[derive(Debug, Clone)]
pub struct OrderPilot {
    config: OrderConfig,
    locator: Locator,
}

impl OrderPilot {
    pub fn new(config: OrderConfig) -> Self {
        Self {
            config,
            locator: Locator::default(),
        }
    }

    /// Replace the default locator strategies
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    /// Launch Chrome, place the order, and close Chrome again.
    /// The browser is closed on every path, including failures.
    pub async fn place_order(&self, request: &OrderRequest) -> OrderResult {
        if let Err(e) = request.validate() {
            return rejected(e);
        }

        let driver = match ChromeDriver::launch(&self.config).await {
            Ok(driver) => driver,
            Err(e) => {
                let e = Error::automation(CheckoutStage::MenuLoaded, e);
                tracing::error!(error = %e, "could not start browser");
                let mut result = OrderResult::default();
                result.fail(&e);
                return result;
            }
        };

        let result = self.place_order_with(&driver, request).await;

        if let Err(e) = driver.close().await {
            tracing::warn!(error = %e, "browser teardown failed");
        }
        result
    }

    /// Place the order through an already open driver. The driver is left
    /// open; closing it is the caller's job.
    pub async fn place_order_with(&self, driver: &dyn Driver, request: &OrderRequest) -> OrderResult {
        if let Err(e) = request.validate() {
            return rejected(e);
        }

        let mut result = OrderResult::default();
        let mut recorder = Recorder::new(
            self.config.screenshot_dir.clone(),
            self.config.page_state_limit,
        );

        match self.run(driver, request, &mut result, &mut recorder).await {
            Ok(confirmation) => {
                tracing::info!(
                    confirmation = %confirmation.order_number,
                    pickup = %confirmation.pickup_estimate,
                    total = ?confirmation.total,
                    "order placed"
                );
                result.confirmation_number = Some(confirmation.order_number);
                result.estimated_pickup_time = Some(confirmation.pickup_estimate);
                result.total_amount = confirmation.total;
                result.succeed();
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    cause = %e.root_cause(),
                    "order automation aborted"
                );
                if self.config.screenshot_on_error {
                    result.page_state = recorder.capture_failure(driver, ERROR_SNAPSHOT_LABEL).await;
                }
                result.fail(&e);
            }
        }

        result.diagnostics = recorder.into_records();
        result
    }

    /// Every error returned here is an `AutomationFailure` naming the stage
    /// that was being attempted
    async fn run(
        &self,
        driver: &dyn Driver,
        request: &OrderRequest,
        result: &mut OrderResult,
        recorder: &mut Recorder,
    ) -> Result<Confirmation> {
        let config = &self.config;

        let items = parse_items(&request.order_items);
        if items.is_empty() {
            return Err(Error::automation(
                CheckoutStage::MenuLoaded,
                Error::InvalidRequest("order_items contains no items".into()),
            ));
        }
        tracing::info!(items = items.len(), customer = %request.customer_name, "placing order");
        result.items = items.clone();

        driver
            .goto(&config.restaurant_url, config.navigation_timeout)
            .await
            .map_err(|e| Error::automation(CheckoutStage::MenuLoaded, e))?;
        settle(config.settle_delay).await;
        tracing::info!(stage = %CheckoutStage::MenuLoaded, url = %config.restaurant_url, "menu loaded");
        recorder
            .capture(driver, CheckoutStage::MenuLoaded.as_str())
            .await;

        CartBuilder::new(driver, &self.locator, config)
            .add_items(&items, recorder)
            .await
            .map_err(|e| Error::automation(CheckoutStage::CartFilled, e))?;
        tracing::info!(stage = %CheckoutStage::CartFilled, "cart filled");
        recorder
            .capture(driver, CheckoutStage::CartFilled.as_str())
            .await;

        let guest = GuestInfo::new(&request.customer_name, &request.customer_phone, config);
        let mut flow = CheckoutFlow::new(driver, &self.locator, config);
        if let Err(e) = flow.run(&guest, request.instructions(), recorder).await {
            return Err(Error::automation(flow.next_stage(), e));
        }

        let finalizer = Finalizer::new(driver, &self.locator, config);
        finalizer
            .submit()
            .await
            .map_err(|e| Error::automation(CheckoutStage::OrderPlaced, e))?;
        recorder
            .capture(driver, CheckoutStage::OrderPlaced.as_str())
            .await;

        Ok(finalizer.extract().await)
    }
}

/// Result for a request that failed validation; nothing was touched
fn rejected(error: Error) -> OrderResult {
    tracing::warn!(error = %error, "rejecting order request");
    let mut result = OrderResult::default();
    result.fail(&error);
    result
}
