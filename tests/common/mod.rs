//! Scripted restaurant site for pipeline tests
//!
//! Models the ordering flow as a small state machine: menu (with item
//! modals), guest choice, guest form, payment, confirmation. Elements are
//! rebuilt from the current state on every query. A CSS query matches an
//! element when any comma-separated part equals one of the element's
//! selector tokens; an XPath query matches on the quoted needle.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use orderpilot::locator::normalize;
use orderpilot::{Driver, ElementHandle, ElementInfo, ElementQuery, Error, OrderConfig, Result};

pub const MENU_URL: &str = "https://order.example.test/menu";

pub const DEFAULT_CONFIRMATION: &str = "Order Confirmed!\nThanks for ordering.\nOrder #A1B2\n\
     Your order will be ready in 15-20 minutes\nSubtotal: $13.00\nTotal: $14.69";

pub fn test_config() -> OrderConfig {
    OrderConfig {
        restaurant_url: MENU_URL.into(),
        contact_email: "orders@example.com".into(),
        ..OrderConfig::fast()
    }
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub name: &'static str,
    /// Rendered as a button; otherwise as a heading inside the menu
    pub button: bool,
    /// Modal demands a size choice before adding
    pub required_choice: bool,
    pub modifiers: Vec<&'static str>,
}

impl MenuItem {
    pub fn button(name: &'static str) -> Self {
        Self {
            name,
            button: true,
            required_choice: false,
            modifiers: Vec::new(),
        }
    }

    pub fn heading(name: &'static str) -> Self {
        Self {
            button: false,
            ..Self::button(name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteOptions {
    pub menu: Vec<MenuItem>,
    pub confirmation_text: String,
    /// Placeholders on the guest form, in page order
    pub guest_fields: Vec<&'static str>,
    pub guest_submit_works: bool,
    pub confirmation_appears: bool,
    pub cash_preselected: bool,
    pub instructions_field: bool,
    pub quantity_controls: bool,
    pub fail_screenshots: bool,
    pub reachable: bool,
    /// Extra paragraph on the menu page, outside any modal
    pub menu_notice: Option<&'static str>,
    /// Payment radios sit in one container, so each one's parent text
    /// names every option
    pub shared_payment_group: bool,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            menu: vec![
                MenuItem::button("Bruschetta"),
                MenuItem {
                    required_choice: true,
                    modifiers: vec!["No Onion", "Extra Sauce", "Add Bacon"],
                    ..MenuItem::heading("Angus Burger")
                },
                MenuItem::button("Garlic Bread"),
                MenuItem::heading("Wings (1lb)"),
            ],
            confirmation_text: DEFAULT_CONFIRMATION.into(),
            guest_fields: vec!["First Name", "Last Name", "Email", "Phone Number"],
            guest_submit_works: true,
            confirmation_appears: true,
            cash_preselected: true,
            instructions_field: true,
            quantity_controls: true,
            fail_screenshots: false,
            reachable: true,
            menu_notice: None,
            shared_payment_group: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Blank,
    Menu,
    GuestChoice,
    GuestForm,
    Payment,
    Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub quantity: u32,
    pub selected: Vec<String>,
}

#[derive(Debug, Clone)]
struct Modal {
    item: MenuItem,
    quantity: u32,
    selected: Vec<String>,
}

#[derive(Debug)]
pub struct State {
    pub screen: Screen,
    modal: Option<Modal>,
    pub cart: Vec<CartLine>,
    /// (placeholder, value) in typing order
    pub typed: Vec<(String, String)>,
    /// Keys of every clicked element
    pub clicks: Vec<String>,
    pub cash_selected: bool,
    pub instructions: Option<String>,
    pub visited: Vec<String>,
    pub closed: bool,
}

pub struct FakeSite {
    options: SiteOptions,
    state: Mutex<State>,
}

struct Fake {
    key: String,
    tag: &'static str,
    text: String,
    placeholder: Option<String>,
    label: Option<String>,
    checked: Option<bool>,
    tokens: Vec<&'static str>,
    context: String,
}

impl Fake {
    fn new(key: impl Into<String>, tag: &'static str, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tag,
            text: text.into(),
            placeholder: None,
            label: None,
            checked: None,
            tokens: vec![tag],
            context: String::new(),
        }
    }

    fn tokens(mut self, tokens: &[&'static str]) -> Self {
        self.tokens.extend_from_slice(tokens);
        self
    }

    fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            handle: ElementHandle(self.key.clone()),
            tag: self.tag.into(),
            text: self.text.clone(),
            placeholder: self.placeholder.clone(),
            label: self.label.clone(),
            checked: self.checked,
            visible: true,
            context: self.context.clone(),
        }
    }
}

const DIALOG_BUTTON: &str = "[role='dialog'] button";
const DIALOG_LABEL: &str = "[role='dialog'] label";
const RADIO: &str = "input[type='radio']";
const DIALOG: &str = "[role='dialog']";

/// Elements that wrap others and are left out of page text and XPath hits
const WRAPPERS: &[&str] = &["menu", "modal"];

impl FakeSite {
    pub fn new(options: SiteOptions) -> Self {
        let cash_selected = options.cash_preselected;
        Self {
            options,
            state: Mutex::new(State {
                screen: Screen::Blank,
                modal: None,
                cart: Vec::new(),
                typed: Vec::new(),
                clicks: Vec::new(),
                cash_selected,
                instructions: None,
                visited: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn clicked(&self, key: &str) -> bool {
        self.state().clicks.iter().any(|k| k == key)
    }

    /// Header text plus every element's text for the current screen
    fn text(&self, state: &State) -> String {
        let header = match state.screen {
            Screen::Blank => "",
            Screen::Menu => "Giovanni's Trattoria\nMenu",
            Screen::GuestChoice => "Sign in or continue as a guest",
            Screen::GuestForm => "Guest Details",
            Screen::Payment => "Checkout\nPayment Details",
            Screen::Confirmation => return self.options.confirmation_text.clone(),
        };
        let mut lines = vec![header.to_string()];
        lines.extend(
            self.elements(state)
                .into_iter()
                .filter(|el| !WRAPPERS.contains(&el.key.as_str()))
                .map(|el| el.text)
                .filter(|t| !t.is_empty()),
        );
        lines.join("\n")
    }

    fn elements(&self, state: &State) -> Vec<Fake> {
        let mut els = Vec::new();
        match state.screen {
            Screen::Blank | Screen::Confirmation => {}
            Screen::Menu => {
                let names: Vec<&str> = self.options.menu.iter().map(|m| m.name).collect();
                els.push(Fake::new("menu", "div", format!("Menu {}", names.join(" $12.00 "))));
                for item in &self.options.menu {
                    let tag = if item.button { "button" } else { "h3" };
                    els.push(
                        Fake::new(format!("item:{}", item.name), tag, item.name)
                            .context(format!("{} $12.00", item.name)),
                    );
                }
                els.push(Fake::new("checkout", "button", "Checkout"));
                if let Some(notice) = self.options.menu_notice {
                    els.push(Fake::new("notice", "p", notice));
                }

                if let Some(modal) = &state.modal {
                    let first = els.len();
                    els.push(Fake::new("modal:title", "h2", modal.item.name));
                    if modal.item.required_choice {
                        els.push(Fake::new("modal:required", "p", "Size: Choose a minimum of 1 (Required)"));
                        for size in ["Large", "Regular"] {
                            els.push(
                                Fake::new(format!("opt:{size}"), "label", size)
                                    .tokens(&[DIALOG_LABEL]),
                            );
                        }
                    }
                    for modifier in &modal.item.modifiers {
                        els.push(
                            Fake::new(format!("opt:{modifier}"), "label", *modifier)
                                .tokens(&[DIALOG_LABEL]),
                        );
                    }
                    if self.options.quantity_controls {
                        let counter = format!("- {} +", modal.quantity);
                        els.push(
                            Fake::new("qty:minus", "button", "-")
                                .tokens(&[DIALOG_BUTTON])
                                .context(counter.clone()),
                        );
                        els.push(
                            Fake::new("qty:plus", "button", "+")
                                .tokens(&[DIALOG_BUTTON])
                                .context(counter),
                        );
                    }
                    els.push(Fake::new("add", "button", "Add to Cart - $12.00").tokens(&[DIALOG_BUTTON]));

                    let surface = els[first..]
                        .iter()
                        .map(|el| el.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    els.push(Fake::new("modal", "section", surface).tokens(&[DIALOG]));
                }
            }
            Screen::GuestChoice => {
                els.push(Fake::new("signin", "button", "Sign In"));
                els.push(Fake::new("guest", "button", "Continue as Guest"));
            }
            Screen::GuestForm => {
                for placeholder in &self.options.guest_fields {
                    let mut input = Fake::new(format!("field:{placeholder}"), "input", "");
                    input.placeholder = Some(placeholder.to_string());
                    els.push(input);
                }
                els.push(Fake::new("continue", "button", "Continue"));
            }
            Screen::Payment => {
                if self.options.instructions_field {
                    let mut notes = Fake::new("instructions", "textarea", "");
                    notes.placeholder = Some("Special instructions".into());
                    els.push(notes);
                }
                let options = [
                    ("radio:card", "Pay online with card", !state.cash_selected),
                    ("radio:cash", "Pay cash at restaurant", state.cash_selected),
                ];
                let group = options.map(|(_, label, _)| label).join("\n");
                for (key, label, checked) in options {
                    let context = if self.options.shared_payment_group { group.as_str() } else { label };
                    let mut radio = Fake::new(key, "input", "").tokens(&[RADIO]).context(context);
                    radio.label = Some(label.into());
                    radio.checked = Some(checked);
                    els.push(radio);
                }
                els.push(Fake::new("place", "button", "Place Order"));
            }
        }
        els
    }
}

/// Needle of `contains(..., 'needle')` in a generated XPath
fn xpath_needle(expression: &str) -> Option<&str> {
    let end = expression.rfind('\'')?;
    let start = expression[..end].rfind('\'')?;
    Some(&expression[start + 1..end])
}

#[async_trait]
impl Driver for FakeSite {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        if !self.options.reachable {
            return Err(Error::Navigation(format!("{url}: net::ERR_NAME_NOT_RESOLVED")));
        }
        let mut state = self.state();
        state.visited.push(url.to_string());
        state.screen = Screen::Menu;
        Ok(())
    }

    async fn query(&self, query: &ElementQuery) -> Result<Vec<ElementInfo>> {
        let state = self.state();
        let elements = self.elements(&state);
        let matched = match query {
            ElementQuery::Css(selector) => {
                let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
                elements
                    .iter()
                    .filter(|el| el.tokens.iter().any(|t| parts.contains(t)))
                    .map(Fake::info)
                    .collect()
            }
            ElementQuery::XPath(expression) => {
                let needle = xpath_needle(expression).unwrap_or_default();
                elements
                    .iter()
                    .filter(|el| {
                        !WRAPPERS.contains(&el.key.as_str()) && normalize(&el.text).contains(needle)
                    })
                    .map(Fake::info)
                    .collect()
            }
        };
        Ok(matched)
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state();
        let key = element.0.clone();
        state.clicks.push(key.clone());

        if let Some(name) = key.strip_prefix("item:") {
            if state.modal.is_none() {
                let item = self.options.menu.iter().find(|m| m.name == name).cloned();
                state.modal = item.map(|item| Modal {
                    item,
                    quantity: 1,
                    selected: Vec::new(),
                });
            }
            return Ok(());
        }
        if let Some(option) = key.strip_prefix("opt:") {
            if let Some(modal) = state.modal.as_mut() {
                modal.selected.push(option.to_string());
            }
            return Ok(());
        }

        match key.as_str() {
            "qty:plus" => {
                if let Some(modal) = state.modal.as_mut() {
                    modal.quantity += 1;
                }
            }
            "add" => {
                if let Some(modal) = state.modal.take() {
                    state.cart.push(CartLine {
                        name: modal.item.name.to_string(),
                        quantity: modal.quantity,
                        selected: modal.selected,
                    });
                }
            }
            "checkout" => state.screen = Screen::GuestChoice,
            "guest" => state.screen = Screen::GuestForm,
            "continue" if self.options.guest_submit_works => state.screen = Screen::Payment,
            "radio:cash" => state.cash_selected = true,
            "radio:card" => state.cash_selected = false,
            "place" if self.options.confirmation_appears => state.screen = Screen::Confirmation,
            _ => {}
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str, _delay: Duration) -> Result<()> {
        let mut state = self.state();
        if let Some(placeholder) = element.0.strip_prefix("field:") {
            state.typed.push((placeholder.to_string(), text.to_string()));
        } else if element.0 == "instructions" {
            state.instructions = Some(text.to_string());
        }
        Ok(())
    }

    async fn page_text(&self) -> Result<String> {
        let state = self.state();
        Ok(self.text(&state))
    }

    async fn page_html(&self) -> Result<String> {
        let text = self.page_text().await?;
        Ok(format!("<html><body>{text}</body></html>"))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        if self.options.fail_screenshots {
            return Err(Error::cdp("Page.captureScreenshot", -32000, "Unable to capture screenshot"));
        }
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}
