//! Pipeline configuration
//!
//! [`OrderConfig`] is passed explicitly into [`crate::OrderPilot`]; nothing is
//! read from globals once the pipeline is running.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for one ordering deployment
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Menu page of the restaurant's ordering site
    pub restaurant_url: String,
    /// Email entered on the guest checkout form
    pub contact_email: String,
    /// Last name entered for every order, marking it as automated
    pub bot_last_name: String,
    /// Headless mode
    pub headless: bool,
    /// Path to Chrome/Chromium binary (None = search common locations)
    pub chrome_path: Option<String>,
    /// Bound on the initial page load
    pub navigation_timeout: Duration,
    /// Bound on waiting for checkout after the guest form is submitted
    pub transition_timeout: Duration,
    /// Bound on waiting for the confirmation page
    pub confirmation_timeout: Duration,
    /// Pause after clicks the site does not signal completion for
    pub settle_delay: Duration,
    /// Pause for the customization modal to render after picking an item
    pub modal_settle_delay: Duration,
    /// Delay between keystrokes when filling fields
    pub keystroke_delay: Duration,
    /// Polling interval for bounded waits
    pub poll_interval: Duration,
    /// Take a final snapshot when the pipeline aborts
    pub screenshot_on_error: bool,
    /// Also write snapshots to this directory
    pub screenshot_dir: Option<PathBuf>,
    /// Maximum characters of page HTML kept for postmortem
    pub page_state_limit: usize,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            restaurant_url: String::new(),
            contact_email: String::new(),
            bot_last_name: "OrderBot".into(),
            headless: true,
            chrome_path: None,
            navigation_timeout: Duration::from_secs(30),
            transition_timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(1000),
            modal_settle_delay: Duration::from_millis(1500),
            keystroke_delay: Duration::from_millis(50),
            poll_interval: Duration::from_millis(100),
            screenshot_on_error: true,
            screenshot_dir: None,
            page_state_limit: 5000,
        }
    }
}

impl OrderConfig {
    /// Config for the given restaurant with default timings
    pub fn new(restaurant_url: impl Into<String>, contact_email: impl Into<String>) -> Self {
        Self {
            restaurant_url: restaurant_url.into(),
            contact_email: contact_email.into(),
            ..Default::default()
        }
    }

    /// No settle delays and short timeouts, for scripted sites and dry runs
    pub fn fast() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(500),
            transition_timeout: Duration::from_millis(200),
            confirmation_timeout: Duration::from_millis(200),
            settle_delay: Duration::ZERO,
            modal_settle_delay: Duration::ZERO,
            keystroke_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Visible (non-headless) browser
    pub fn visible(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Load from `ORDERPILOT_*` environment variables, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Build from an arbitrary variable lookup. Unset variables keep their
    /// defaults; the restaurant URL and contact email are required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        let defaults = Self::default();

        let require = |var: &str| -> Result<String> {
            lookup(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::config(var, "is required"))
        };

        let millis = |var: &str, default: Duration| -> Result<Duration> {
            match lookup(var) {
                Ok(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| Error::config(var, e.to_string())),
                Err(_) => Ok(default),
            }
        };

        let flag = |var: &str, default: bool| -> Result<bool> {
            match lookup(var) {
                Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Ok(true),
                    "0" | "false" | "no" | "off" => Ok(false),
                    other => Err(Error::config(var, format!("not a boolean: {other}"))),
                },
                Err(_) => Ok(default),
            }
        };

        let page_state_limit = match lookup("ORDERPILOT_PAGE_STATE_LIMIT") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| Error::config("ORDERPILOT_PAGE_STATE_LIMIT", e.to_string()))?,
            Err(_) => defaults.page_state_limit,
        };

        Ok(Self {
            restaurant_url: require("ORDERPILOT_RESTAURANT_URL")?,
            contact_email: require("ORDERPILOT_CONTACT_EMAIL")?,
            bot_last_name: lookup("ORDERPILOT_BOT_LAST_NAME").unwrap_or(defaults.bot_last_name),
            headless: flag("ORDERPILOT_HEADLESS", defaults.headless)?,
            chrome_path: lookup("ORDERPILOT_CHROME_PATH").ok(),
            navigation_timeout: millis(
                "ORDERPILOT_NAVIGATION_TIMEOUT_MS",
                defaults.navigation_timeout,
            )?,
            transition_timeout: millis(
                "ORDERPILOT_TRANSITION_TIMEOUT_MS",
                defaults.transition_timeout,
            )?,
            confirmation_timeout: millis(
                "ORDERPILOT_CONFIRMATION_TIMEOUT_MS",
                defaults.confirmation_timeout,
            )?,
            settle_delay: millis("ORDERPILOT_SETTLE_DELAY_MS", defaults.settle_delay)?,
            modal_settle_delay: millis(
                "ORDERPILOT_MODAL_SETTLE_DELAY_MS",
                defaults.modal_settle_delay,
            )?,
            keystroke_delay: millis("ORDERPILOT_KEYSTROKE_DELAY_MS", defaults.keystroke_delay)?,
            poll_interval: millis("ORDERPILOT_POLL_INTERVAL_MS", defaults.poll_interval)?,
            screenshot_on_error: flag(
                "ORDERPILOT_SCREENSHOT_ON_ERROR",
                defaults.screenshot_on_error,
            )?,
            screenshot_dir: lookup("ORDERPILOT_SCREENSHOT_DIR").ok().map(PathBuf::from),
            page_state_limit,
        })
    }
}
