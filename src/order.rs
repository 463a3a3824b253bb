//! Order request and result types exchanged with callers

use serde::{Deserialize, Serialize};

use crate::checkout::CheckoutStage;
use crate::diagnostics::SnapshotRecord;
use crate::error::{Error, Result};
use crate::parser::ParsedLineItem;

/// A pickup order to place, as received from the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Free-text items, e.g. `"2 burgers with no onion, garlic bread"`
    pub order_items: String,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

impl OrderRequest {
    pub fn new(
        order_items: impl Into<String>,
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
    ) -> Self {
        Self {
            order_items: order_items.into(),
            customer_name: customer_name.into(),
            customer_phone: customer_phone.into(),
            special_instructions: None,
        }
    }

    /// Set special instructions for the kitchen
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }

    /// Special instructions, if any non-blank text was supplied
    pub fn instructions(&self) -> Option<&str> {
        self.special_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Presence check on the required fields
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("order_items", &self.order_items),
            ("customer_name", &self.customer_name),
            ("customer_phone", &self.customer_phone),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidRequest(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Outcome of one order attempt. Built up while the pipeline runs and
/// returned exactly once, whether the order went through or not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    pub confirmation_number: Option<String>,
    pub estimated_pickup_time: Option<String>,
    pub total_amount: Option<String>,
    /// Human-readable failure; set exactly when `success` is false
    pub error: Option<String>,
    /// Stage being attempted when the pipeline aborted
    pub failed_stage: Option<CheckoutStage>,
    /// Items as understood from the request text
    #[serde(default)]
    pub items: Vec<ParsedLineItem>,
    #[serde(default)]
    pub diagnostics: Vec<SnapshotRecord>,
    /// Truncated page HTML captured at the failure point
    pub page_state: Option<String>,
}

impl OrderResult {
    pub(crate) fn fail(&mut self, error: &Error) {
        self.success = false;
        self.error = Some(error.to_string());
        if let Error::AutomationFailure { stage, .. } = error {
            self.failed_stage = Some(*stage);
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.success = true;
        self.error = None;
        self.failed_stage = None;
    }

    /// Labels of the captured snapshots, in capture order
    pub fn snapshot_labels(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|s| s.label.as_str()).collect()
    }
}
