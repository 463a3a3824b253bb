//! Chrome backend
//!
//! Handles Chrome discovery and launch, and implements [`Driver`] over the
//! CDP session of a single page.
//!
//! Query results are tagged in the DOM with a `data-orderpilot-ref`
//! attribute; an [`ElementHandle`] is the CSS selector for that tag, so it
//! stays valid until the element is re-tagged or removed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

use crate::cdp::transport::launch_chrome;
use crate::cdp::types::{KeyEventType, MouseEventType};
use crate::cdp::{Connection, Session, Transport};
use crate::config::OrderConfig;
use crate::driver::{Driver, ElementHandle, ElementInfo, ElementQuery};
use crate::error::{Error, Result};

/// Unique user data directories per launch
static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique ref prefixes per query
static QUERY_COUNTER: AtomicU64 = AtomicU64::new(0);

const REF_ATTR: &str = "data-orderpilot-ref";

/// Longest text kept per element; page-sized containers are cut here
const MAX_ELEMENT_TEXT: usize = 1000;

const READY_POLL: Duration = Duration::from_millis(50);

/// Look for Chrome or Chromium in the usual install locations
pub fn find_chrome() -> Result<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[]
    };

    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
        .ok_or(Error::ChromeNotFound)
}

fn chrome_args(config: &OrderConfig, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--no-sandbox".into(),
        "--disable-dev-shm-usage".into(),
        "--disable-popup-blocking".into(),
        "--disable-sync".into(),
        "--disable-translate".into(),
        "--password-store=basic".into(),
        "--window-size=1366,900".into(),
        format!("--user-data-dir={}", user_data_dir.display()),
    ];
    if config.headless {
        args.push("--headless=new".into());
    }
    args
}

/// One Chrome process driving one page
pub struct ChromeDriver {
    connection: Connection,
    session: Session,
    /// Removed on close or drop
    user_data_dir: PathBuf,
    closed: AtomicBool,
}

impl ChromeDriver {
    /// Launch Chrome and open a blank page
    pub async fn launch(config: &OrderConfig) -> Result<Self> {
        let instance = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "orderpilot-{}-{}",
            std::process::id(),
            instance
        ));
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        let chrome_path = match &config.chrome_path {
            Some(path) => PathBuf::from(path),
            None => find_chrome()?,
        };

        tracing::info!(path = %chrome_path.display(), headless = config.headless, "launching Chrome");
        let (child, ws_url) = launch_chrome(&chrome_path, &chrome_args(config, &user_data_dir))?;
        let connection = Connection::new(Transport::connect(child, &ws_url)?);

        let version = connection.version().await?;
        tracing::info!(version = %version, "connected to Chrome");

        let session = connection.open_page().await?;

        Ok(Self {
            connection,
            session,
            user_data_dir,
            closed: AtomicBool::new(false),
        })
    }

    async fn evaluate_string(&self, expression: &str) -> Result<String> {
        match self.session.evaluate(expression).await? {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }

    async fn wait_until_loaded(&self, url: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            // readyState is unavailable mid-navigation; keep polling
            if let Ok(Value::String(state)) = self.session.evaluate("document.readyState").await {
                if state == "complete" {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "{url} did not finish loading within {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tracing::debug!(url, "navigating");
        self.session.navigate(url).await?;
        self.wait_until_loaded(url, timeout).await
    }

    async fn query(&self, query: &ElementQuery) -> Result<Vec<ElementInfo>> {
        let prefix = format!("q{}", QUERY_COUNTER.fetch_add(1, Ordering::Relaxed));
        let value = self.session.evaluate(&query_script(query, &prefix)?).await?;
        let raw: Vec<RawElement> = serde_json::from_value(value)?;
        tracing::trace!(?query, matches = raw.len(), "element query");
        Ok(raw.into_iter().map(RawElement::into_info).collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let selector = serde_json::to_string(&element.0)?;
        self.session
            .evaluate(&format!(
                "document.querySelector({selector})?.scrollIntoView({{block: 'center'}})"
            ))
            .await?;

        let node_id = self.session.query_selector(&element.0).await?;
        let (x, y) = self
            .session
            .get_box_model(node_id)
            .await?
            .center()
            .ok_or_else(|| Error::cdp("DOM.getBoxModel", -1, "element has no box model"))?;

        self.session
            .dispatch_mouse_event(MouseEventType::MouseMoved, x, y)
            .await?;
        self.session
            .dispatch_mouse_event(MouseEventType::MousePressed, x, y)
            .await?;
        self.session
            .dispatch_mouse_event(MouseEventType::MouseReleased, x, y)
            .await?;
        Ok(())
    }

    async fn type_text(
        &self,
        element: &ElementHandle,
        text: &str,
        keystroke_delay: Duration,
    ) -> Result<()> {
        let node_id = self.session.query_selector(&element.0).await?;
        self.session.focus(node_id).await?;

        let selector = serde_json::to_string(&element.0)?;
        self.session
            .evaluate(&format!(
                "(() => {{ const el = document.querySelector({selector}); \
                 if (el && 'value' in el) {{ el.select?.(); el.value = ''; \
                 el.dispatchEvent(new Event('input', {{bubbles: true}})); }} }})()"
            ))
            .await?;

        let jitter_ms = keystroke_delay.as_millis() as u64 / 2;
        for ch in text.chars() {
            let key = ch.to_string();
            self.session
                .dispatch_key_event(KeyEventType::KeyDown, Some(&key), None)
                .await?;
            self.session
                .dispatch_key_event(KeyEventType::Char, Some(&key), Some(&key))
                .await?;
            self.session
                .dispatch_key_event(KeyEventType::KeyUp, Some(&key), None)
                .await?;

            if !keystroke_delay.is_zero() {
                let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
                tokio::time::sleep(keystroke_delay + Duration::from_millis(jitter)).await;
            }
        }
        Ok(())
    }

    async fn page_text(&self) -> Result<String> {
        self.evaluate_string("document.body ? document.body.innerText : ''")
            .await
    }

    async fn page_html(&self) -> Result<String> {
        self.evaluate_string("document.documentElement.outerHTML")
            .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.session.capture_screenshot().await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("closing Chrome");
        let closed = self.connection.close().await;
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        closed
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        // The transport kills Chrome on drop
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

/// Element descriptor as returned by [`query_script`]
#[derive(Debug, Deserialize)]
struct RawElement {
    r#ref: String,
    tag: String,
    #[serde(default)]
    text: String,
    placeholder: Option<String>,
    label: Option<String>,
    checked: Option<bool>,
    visible: bool,
    #[serde(default)]
    context: String,
}

impl RawElement {
    fn into_info(self) -> ElementInfo {
        ElementInfo {
            handle: ElementHandle(format!("[{REF_ATTR}=\"{}\"]", self.r#ref)),
            tag: self.tag,
            text: self.text,
            placeholder: self.placeholder,
            label: self.label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            checked: self.checked,
            visible: self.visible,
            context: self.context,
        }
    }
}

/// JavaScript that collects the matches for `query`, tags each with
/// `<prefix>-<index>`, and returns their descriptors
fn query_script(query: &ElementQuery, prefix: &str) -> Result<String> {
    let collect = match query {
        ElementQuery::Css(selector) => format!(
            "Array.from(document.querySelectorAll({}))",
            serde_json::to_string(selector)?
        ),
        ElementQuery::XPath(expression) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out; }})()",
            serde_json::to_string(expression)?
        ),
    };

    Ok(format!(
        r#"(() => {{
    const cut = (s) => (s || '').trim().slice(0, {MAX_ELEMENT_TEXT});
    return {collect}.filter((el) => el instanceof Element).map((el, i) => {{
        const ref = '{prefix}-' + i;
        el.setAttribute('{REF_ATTR}', ref);
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        const visible = rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
        let label = el.getAttribute('aria-label');
        if (!label && el.labels && el.labels.length) label = el.labels[0].innerText;
        if (!label && el.closest('label')) label = el.closest('label').innerText;
        const isInput = el.tagName === 'INPUT';
        const toggles = isInput && (el.type === 'radio' || el.type === 'checkbox');
        const aria = el.getAttribute('aria-checked');
        return {{
            ref,
            tag: el.tagName.toLowerCase(),
            text: cut(toggles ? '' : isInput ? el.value : (el.innerText || el.textContent)),
            placeholder: el.getAttribute('placeholder'),
            label: label || null,
            checked: toggles ? el.checked : (aria === null ? null : aria === 'true'),
            visible,
            context: cut(el.parentElement ? el.parentElement.innerText : ''),
        }};
    }});
}})()"#
    ))
}
