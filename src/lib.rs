//! # Orderpilot
//!
//! Places restaurant pickup orders by driving the restaurant's own ordering
//! website in a browser.
//!
//! The site offers no API and no stable selectors, so every step works from
//! visible text: items are found by name, modals are handled by their
//! labels, and the confirmation page is scraped with ordered regex rules.
//!
//! ## Pipeline
//!
//! - **Parse** free-text items (`"2 burgers with no onion, garlic bread"`)
//!   into canonical menu names, quantities, and modifications
//! - **Cart**: open each item, satisfy required choices, apply
//!   modifications, raise the quantity, and add it
//! - **Checkout** as a guest, fill the contact form, add notes, and check
//!   that payment is cash at pickup
//! - **Submit** and read back the confirmation number, pickup estimate, and
//!   total
//!
//! Snapshots are captured after every stage and once more on failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orderpilot::{OrderConfig, OrderPilot, OrderRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OrderConfig::new("https://order.example.com/menu", "orders@example.com");
//!     let pilot = OrderPilot::new(config);
//!
//!     let request = OrderRequest::new("2 burgers with no onion, garlic bread", "John Smith", "416-555-1234")
//!         .with_instructions("extra napkins");
//!
//!     let result = pilot.place_order(&request).await;
//!     if result.success {
//!         println!("confirmation {:?}", result.confirmation_number);
//!     } else {
//!         eprintln!("failed at {:?}: {:?}", result.failed_stage, result.error);
//!     }
//! }
//! ```
//!
//! ## Custom drivers
//!
//! The pipeline only needs the [`Driver`] trait. [`OrderPilot::place_order_with`]
//! runs against any implementation, such as a scripted site in tests.

pub mod browser;
pub mod cart;
pub mod cdp;
pub mod checkout;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod finalize;
pub mod locator;
pub mod order;
pub mod parser;
pub mod pipeline;

// Re-exports
pub use browser::ChromeDriver;
pub use checkout::{CheckoutStage, GuestInfo};
pub use config::OrderConfig;
pub use diagnostics::SnapshotRecord;
pub use driver::{wait_for_text, Driver, ElementHandle, ElementInfo, ElementQuery};
pub use error::{Error, Result};
pub use finalize::{Confirmation, DEFAULT_PICKUP_ESTIMATE, ORDER_NUMBER_SENTINEL};
pub use locator::{Locator, LocatorStrategy};
pub use order::{OrderRequest, OrderResult};
pub use parser::{canonicalize, parse_items, ParsedLineItem};
pub use pipeline::OrderPilot;
