//! Place one pickup order from the command line
//!
//! Reads `ORDERPILOT_*` settings from the environment (or `.env`) and
//! prints the order result as JSON.
//!
//! Run with:
//!   cargo run --example place_order -- "2 burgers with no onion, garlic bread" "John Smith" 416-555-1234 ["extra napkins"]

use orderpilot::{OrderConfig, OrderPilot, OrderRequest, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orderpilot=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [items, name, phone, rest @ ..] = args.as_slice() else {
        eprintln!("usage: place_order <items> <customer name> <phone> [instructions]");
        std::process::exit(2);
    };

    let mut request = OrderRequest::new(items.as_str(), name.as_str(), phone.as_str());
    if let Some(instructions) = rest.first() {
        request = request.with_instructions(instructions.as_str());
    }

    let config = OrderConfig::from_env()?;
    println!("Ordering from {}...", config.restaurant_url);

    let result = OrderPilot::new(config).place_order(&request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
