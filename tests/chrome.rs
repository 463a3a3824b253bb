//! Chrome driver tests
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test chrome -- --ignored

use std::time::Duration;

use orderpilot::{ChromeDriver, Driver, ElementQuery, OrderConfig, OrderPilot, OrderRequest};

const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

fn chrome_available() -> bool {
    orderpilot::browser::find_chrome().is_ok()
}

fn data_url(html: &str) -> String {
    let encoded = html
        .replace('%', "%25")
        .replace('#', "%23")
        .replace('\n', "%0A");
    format!("data:text/html,{encoded}")
}

async fn launch() -> ChromeDriver {
    ChromeDriver::launch(&OrderConfig::fast())
        .await
        .expect("Failed to launch Chrome")
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn launch_and_close() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let driver = launch().await;
    driver.close().await.expect("Failed to close Chrome");
    // Second close is a no-op
    driver.close().await.expect("Repeated close failed");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn page_text_and_html() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let driver = launch().await;
    driver
        .goto(&data_url("<h1>Hello</h1><p>Menu</p>"), LOAD_TIMEOUT)
        .await
        .expect("Failed to navigate");

    let text = driver.page_text().await.expect("Failed to read text");
    assert!(text.contains("Hello"));
    let html = driver.page_html().await.expect("Failed to read HTML");
    assert!(html.contains("<h1>Hello</h1>"));

    driver.close().await.expect("Failed to close Chrome");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn query_describes_elements() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let driver = launch().await;
    let html = r#"
        <div><button>Add to Cart</button><button style="display:none">Hidden</button></div>
        <input placeholder="First Name">
        <label><input type="radio" name="pay" checked>Pay cash at restaurant</label>
    "#;
    driver
        .goto(&data_url(html), LOAD_TIMEOUT)
        .await
        .expect("Failed to navigate");

    let buttons = driver
        .query(&ElementQuery::css("button"))
        .await
        .expect("Query failed");
    assert_eq!(buttons.len(), 2);
    assert_eq!(buttons[0].text, "Add to Cart");
    assert!(buttons[0].visible);
    assert!(!buttons[1].visible);

    let inputs = driver
        .query(&ElementQuery::css("input[type='radio'], input"))
        .await
        .expect("Query failed");
    assert_eq!(inputs[0].placeholder.as_deref(), Some("First Name"));
    let radio = inputs.iter().find(|el| el.checked.is_some()).expect("No radio");
    assert_eq!(radio.checked, Some(true));
    assert_eq!(radio.label.as_deref(), Some("Pay cash at restaurant"));

    let by_xpath = driver
        .query(&ElementQuery::xpath("//button[contains(., 'Add')]"))
        .await
        .expect("XPath query failed");
    assert_eq!(by_xpath.len(), 1);

    driver.close().await.expect("Failed to close Chrome");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn click_and_type() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let driver = launch().await;
    let html = r#"
        <input placeholder="Phone" oninput="document.getElementById('echo').innerText = this.value">
        <button onclick="document.getElementById('clicked').innerText = 'clicked'">Go</button>
        <p id="echo"></p><p id="clicked"></p>
    "#;
    driver
        .goto(&data_url(html), LOAD_TIMEOUT)
        .await
        .expect("Failed to navigate");

    let input = driver.query(&ElementQuery::css("input")).await.expect("Query failed");
    driver
        .type_text(&input[0].handle, "4165551234", Duration::ZERO)
        .await
        .expect("Failed to type");

    let button = driver.query(&ElementQuery::css("button")).await.expect("Query failed");
    driver.click(&button[0].handle).await.expect("Failed to click");

    let text = driver.page_text().await.expect("Failed to read text");
    assert!(text.contains("4165551234"));
    assert!(text.contains("clicked"));

    driver.close().await.expect("Failed to close Chrome");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn screenshot_is_png() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let driver = launch().await;
    driver
        .goto(&data_url("<h1>Snapshot</h1>"), LOAD_TIMEOUT)
        .await
        .expect("Failed to navigate");

    let png = driver.screenshot().await.expect("Failed to capture screenshot");
    assert_eq!(&png[..4], b"\x89PNG");

    driver.close().await.expect("Failed to close Chrome");
}

const ORDER_SITE: &str = r#"<html><body>
<h1>Trattoria</h1>
<div id="menu">
  <button onclick="document.getElementById('modal').style.display = 'block'">Bruschetta</button>
  <button onclick="show('guest')">Checkout</button>
</div>
<div id="modal" role="dialog" style="display:none">
  <p>Choose a minimum of 1</p>
  <label><input type="radio" name="size">Regular</label>
  <button onclick="document.getElementById('modal').style.display = 'none'">Add to Cart</button>
</div>
<div id="guest" style="display:none"><button onclick="show('form')">Continue as Guest</button></div>
<div id="form" style="display:none">
  <input placeholder="First Name"><input placeholder="Last Name">
  <input placeholder="Email"><input placeholder="Phone">
  <button onclick="show('pay')">Continue</button>
</div>
<div id="pay" style="display:none">
  <h2>Payment Details</h2>
  <label><input type="radio" name="pay" checked>Pay online</label>
  <label><input type="radio" name="pay">Pay cash at restaurant</label>
  <button onclick="show('done')">Place Order</button>
</div>
<div id="done" style="display:none">
  <h2>Order Placed</h2><p>Order Number: 5512</p><p>Ready in 25 minutes</p><p>Total: $13.50</p>
</div>
<script>
function show(id) {
  for (const section of ['menu', 'modal', 'guest', 'form', 'pay', 'done']) {
    document.getElementById(section).style.display = section === id ? 'block' : 'none';
  }
}
</script>
</body></html>"#;

#[tokio::test]
#[ignore = "requires Chrome"]
async fn places_order_on_local_site() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let config = OrderConfig {
        restaurant_url: data_url(ORDER_SITE),
        contact_email: "orders@example.com".into(),
        transition_timeout: Duration::from_secs(3),
        confirmation_timeout: Duration::from_secs(3),
        ..OrderConfig::fast()
    };
    let driver = launch().await;

    let result = OrderPilot::new(config)
        .place_order_with(&driver, &OrderRequest::new("bruschetta", "John Smith", "416-555-1234"))
        .await;

    assert!(result.success, "order failed: {:?}", result.error);
    assert_eq!(result.confirmation_number.as_deref(), Some("5512"));
    assert_eq!(result.estimated_pickup_time.as_deref(), Some("25 minutes"));
    assert_eq!(result.total_amount.as_deref(), Some("$13.50"));

    driver.close().await.expect("Failed to close Chrome");
}
