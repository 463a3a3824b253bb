//! Error types for orderpilot

use thiserror::Error;

use crate::checkout::CheckoutStage;

/// Result type for orderpilot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for orderpilot
#[derive(Debug, Error)]
pub enum Error {
    /// No locator strategy produced an element for the label
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A must-fill guest form field could not be located
    #[error("Required field missing: {0}")]
    RequiredFieldMissing(String),

    /// An item could not be added to the cart; remaining items were not attempted
    #[error("Could not add '{item}' to cart: {source}")]
    CartAdditionFailed {
        item: String,
        #[source]
        source: Box<Error>,
    },

    /// No add-confirmation control could be activated in the customization modal
    #[error("Add to cart confirmation failed for '{0}'")]
    AddToCartFailed(String),

    /// The page never showed the marker text expected after a transition
    #[error("Timed out after {timeout_ms}ms waiting for {stage} (expected one of {markers:?})")]
    StateTransitionTimeout {
        stage: CheckoutStage,
        markers: Vec<String>,
        timeout_ms: u64,
    },

    /// Placing the order, or confirming it was placed, failed
    #[error("Order submission failed: {0}")]
    OrderSubmissionFailed(String),

    /// Umbrella for any failure that aborted the pipeline
    #[error("Automation failed at {stage}: {source}")]
    AutomationFailure {
        stage: CheckoutStage,
        #[source]
        source: Box<Error>,
    },

    /// Invalid order request
    #[error("Invalid order request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value
    #[error("Invalid configuration for {var}: {reason}")]
    Config { var: String, reason: String },

    /// Failed to launch Chrome
    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// JavaScript evaluation error
    #[error("Script error: {0}")]
    Script(String),

    /// Navigation error
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decode error (e.g., base64)
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Chrome not found
    #[error("Chrome not found")]
    ChromeNotFound,
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Wrap a per-item failure
    pub fn cart_addition(item: impl Into<String>, source: Error) -> Self {
        Self::CartAdditionFailed {
            item: item.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure that escaped a pipeline stage
    pub fn automation(stage: CheckoutStage, source: Error) -> Self {
        match source {
            already @ Error::AutomationFailure { .. } => already,
            source => Self::AutomationFailure {
                stage,
                source: Box::new(source),
            },
        }
    }

    pub fn config(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Innermost error beneath the pipeline and cart wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::AutomationFailure { source, .. } | Error::CartAdditionFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Errors a locator strategy treats as "no match" rather than a fault
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ElementNotFound(_) => true,
            Error::Cdp { message, .. } => {
                message.contains("box model") || message.contains("Could not find node")
            }
            _ => false,
        }
    }
}
