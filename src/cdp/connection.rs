//! CDP Connection/Session Management
//!
//! [`Connection`] talks to the browser target; [`Session`] talks to one page
//! over the same socket using flattened session ids.

use std::sync::Arc;

use base64::Engine;
use serde_json::Value;

use super::transport::Transport;
use super::types::*;
use crate::error::{Error, Result};

/// A CDP connection to Chrome
pub struct Connection {
    transport: Arc<Transport>,
}

impl Connection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Product string, e.g. `HeadlessChrome/120.0.6099.71`
    pub async fn version(&self) -> Result<String> {
        let result: BrowserGetVersionResult = self
            .transport
            .call(None, "Browser.getVersion", &BrowserGetVersion {})
            .await?;
        Ok(result.product)
    }

    /// Open a blank tab and attach a session to it
    pub async fn open_page(&self) -> Result<Session> {
        let target: TargetCreateTargetResult = self
            .transport
            .call(
                None,
                "Target.createTarget",
                &TargetCreateTarget {
                    url: "about:blank".into(),
                },
            )
            .await?;

        let attached: TargetAttachToTargetResult = self
            .transport
            .call(
                None,
                "Target.attachToTarget",
                &TargetAttachToTarget {
                    target_id: target.target_id,
                    flatten: true,
                },
            )
            .await?;

        let session = Session {
            transport: Arc::clone(&self.transport),
            session_id: attached.session_id,
        };
        session.send::<_, Value>("Page.enable", &PageEnable {}).await?;
        Ok(session)
    }

    /// Ask Chrome to exit, then tear down the process regardless
    pub async fn close(&self) -> Result<()> {
        if let Err(e) = self
            .transport
            .call::<_, Value>(None, "Browser.close", &BrowserClose {})
            .await
        {
            tracing::debug!(error = %e, "Browser.close failed; killing process");
        }
        self.transport.close().await
    }
}

/// A CDP session attached to one page
pub struct Session {
    transport: Arc<Transport>,
    session_id: String,
}

impl Session {
    pub async fn send<C, R>(&self, method: &str, params: &C) -> Result<R>
    where
        C: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        self.transport
            .call(Some(&self.session_id), method, params)
            .await
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result: PageNavigateResult = self
            .send("Page.navigate", &PageNavigate { url: url.into() })
            .await?;
        match result.error_text {
            Some(error) => Err(Error::Navigation(format!("{url}: {error}"))),
            None => Ok(()),
        }
    }

    /// Full-page PNG
    pub async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        let result: PageCaptureScreenshotResult = self
            .send(
                "Page.captureScreenshot",
                &PageCaptureScreenshot {
                    format: "png",
                    capture_beyond_viewport: true,
                },
            )
            .await?;

        base64::engine::general_purpose::STANDARD
            .decode(&result.data)
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Evaluate an expression and return its JSON value. Thrown exceptions
    /// become [`Error::Script`].
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result: RuntimeEvaluateResult = self
            .send(
                "Runtime.evaluate",
                &RuntimeEvaluate {
                    expression: expression.to_string(),
                    return_by_value: true,
                    await_promise: true,
                },
            )
            .await?;

        if let Some(details) = result.exception_details {
            return Err(Error::Script(details.message()));
        }
        Ok(result.result.value.unwrap_or(Value::Null))
    }

    /// Node id of the first match for `selector`, or `ElementNotFound`
    pub async fn query_selector(&self, selector: &str) -> Result<i32> {
        let document: DomGetDocumentResult =
            self.send("DOM.getDocument", &DomGetDocument {}).await?;
        let found: DomQuerySelectorResult = self
            .send(
                "DOM.querySelector",
                &DomQuerySelector {
                    node_id: document.root.node_id,
                    selector: selector.to_string(),
                },
            )
            .await?;

        if found.node_id == 0 {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        Ok(found.node_id)
    }

    pub async fn get_box_model(&self, node_id: i32) -> Result<BoxModel> {
        let result: DomGetBoxModelResult = self
            .send("DOM.getBoxModel", &DomNodeRef { node_id })
            .await?;
        Ok(result.model)
    }

    pub async fn focus(&self, node_id: i32) -> Result<()> {
        self.send::<_, Value>("DOM.focus", &DomNodeRef { node_id })
            .await?;
        Ok(())
    }

    pub async fn dispatch_mouse_event(
        &self,
        event_type: MouseEventType,
        x: f64,
        y: f64,
    ) -> Result<()> {
        let (button, click_count) = match event_type {
            MouseEventType::MouseMoved => (None, None),
            _ => (Some(MouseButton::Left), Some(1)),
        };
        self.send::<_, Value>(
            "Input.dispatchMouseEvent",
            &InputDispatchMouseEvent {
                r#type: event_type,
                x,
                y,
                button,
                click_count,
            },
        )
        .await?;
        Ok(())
    }

    pub async fn dispatch_key_event(
        &self,
        event_type: KeyEventType,
        key: Option<&str>,
        text: Option<&str>,
    ) -> Result<()> {
        self.send::<_, Value>(
            "Input.dispatchKeyEvent",
            &InputDispatchKeyEvent {
                r#type: event_type,
                key: key.map(String::from),
                text: text.map(String::from),
            },
        )
        .await?;
        Ok(())
    }
}
