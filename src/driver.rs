//! Browser automation capability
//!
//! The ordering pipeline only talks to the page through [`Driver`]. The
//! Chrome-backed implementation lives in [`crate::browser`]; tests supply
//! scripted sites.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque reference to an element returned by [`Driver::query`].
/// Only valid until the next query on the same driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

/// How to look for elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementQuery {
    /// CSS selector list, e.g. `"button, a, [role='button']"`
    Css(String),
    /// XPath expression evaluated against the document
    XPath(String),
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }
}

/// Snapshot of one matched element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub handle: ElementHandle,
    /// Lowercase tag name
    pub tag: String,
    /// Visible text, or the value for inputs
    pub text: String,
    pub placeholder: Option<String>,
    /// Text of the associated `<label>` or `aria-label`
    pub label: Option<String>,
    /// Checked state for checkboxes and radios
    pub checked: Option<bool>,
    /// Rendered with a non-empty box
    pub visible: bool,
    /// Text of the parent element, truncated
    pub context: String,
}

impl ElementInfo {
    /// Text used for label matching: own text, then label, then placeholder
    pub fn display_text(&self) -> &str {
        let text = self.text.trim();
        if !text.is_empty() {
            return text;
        }
        self.label
            .as_deref()
            .or(self.placeholder.as_deref())
            .map(str::trim)
            .unwrap_or("")
    }

    /// Name of a choice control: its label, then its own text. The parent's
    /// text is used only when the control has neither, since sibling
    /// options share it.
    pub fn own_name(&self) -> &str {
        [self.label.as_deref().unwrap_or(""), &self.text, &self.context]
            .into_iter()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or("")
    }
}

/// The automation primitives the pipeline is built on
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate and wait for the document to finish loading
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// All elements matching the query, in document order
    async fn query(&self, query: &ElementQuery) -> Result<Vec<ElementInfo>>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Focus, clear, and type `text` one key at a time
    async fn type_text(
        &self,
        element: &ElementHandle,
        text: &str,
        keystroke_delay: Duration,
    ) -> Result<()>;

    /// Rendered text of the whole page
    async fn page_text(&self) -> Result<String>;

    /// Serialized HTML of the whole page
    async fn page_html(&self) -> Result<String>;

    /// Full-page PNG
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Tear down the session and release the browser
    async fn close(&self) -> Result<()>;
}

/// Poll the page text until any of `markers` appears (case-insensitive).
/// Returns the marker that matched.
pub async fn wait_for_text(
    driver: &dyn Driver,
    markers: &[&str],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<String> {
    let start = Instant::now();
    let lowered: Vec<String> = markers.iter().map(|m| m.to_lowercase()).collect();

    loop {
        match driver.page_text().await {
            Ok(text) => {
                let text = text.to_lowercase();
                if let Some(idx) = lowered.iter().position(|m| text.contains(m.as_str())) {
                    return Ok(markers[idx].to_string());
                }
            }
            Err(e) => {
                // Page may be mid-navigation
                tracing::trace!("page text unavailable while waiting: {}", e);
            }
        }

        if start.elapsed() >= timeout {
            return Err(Error::Timeout(format!(
                "None of {:?} appeared within {}ms",
                markers,
                timeout.as_millis()
            )));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Fixed pause for UI updates the site does not signal
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
