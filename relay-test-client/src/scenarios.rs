use crate::api_client::ApiClient;
use crate::output::TestResult;
use crate::ws_client::Connection;
use anyhow::Result;
use colored::*;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

/// Open a relay socket, confirm it stays up, then close it cleanly.
pub async fn test_connection(base_url: &str) -> Result<TestResult> {
    let name = "connection-test";
    let start = Instant::now();
    println!("\n{} Running {}", "→".blue(), name.bold());

    let connection = match Connection::establish(base_url, "Client A".to_string()).await {
        Ok(connection) => connection,
        Err(e) => return Ok(TestResult::fail(name, e.to_string(), start.elapsed())),
    };
    println!("{} {} connected", "✓".green(), connection.label);

    tokio::time::sleep(Duration::from_secs(2)).await;
    if !connection.is_open() {
        return Ok(TestResult::fail(
            name,
            "Relay closed an idle connection",
            start.elapsed(),
        ));
    }

    if let Err(e) = connection.close().await {
        return Ok(TestResult::fail(name, e.to_string(), start.elapsed()));
    }
    println!("{} Closed cleanly", "✓".green());

    Ok(TestResult::pass(name, start.elapsed()))
}

/// Two sockets must both receive the next sale, with identical payloads.
pub async fn test_fan_out(base_url: &str, event_timeout: Duration) -> Result<TestResult> {
    let name = "fan-out-test";
    let start = Instant::now();
    println!("\n{} Running {}", "→".blue(), name.bold());

    let mut first = Connection::establish(base_url, "Client A".to_string()).await?;
    let mut second = Connection::establish(base_url, "Client B".to_string()).await?;
    println!(
        "{} Waiting up to {}s for the next sale...",
        "→".blue(),
        event_timeout.as_secs()
    );

    let received = match first.wait_for_event("INSERT", event_timeout).await {
        Ok(event) => event,
        Err(e) => return Ok(TestResult::fail(name, format!("{}: {e}", first.label), start.elapsed())),
    };
    println!(
        "{} {} received sale {}",
        "✓".green(),
        first.label,
        received.data["record"]["id"]
    );

    let mirrored = match second.wait_for_event("INSERT", Duration::from_secs(5)).await {
        Ok(event) => event,
        Err(e) => return Ok(TestResult::fail(name, format!("{}: {e}", second.label), start.elapsed())),
    };

    if mirrored.raw != received.raw {
        return Ok(TestResult::fail(
            name,
            format!("Payloads differ: {} vs {}", received.raw, mirrored.raw),
            start.elapsed(),
        ));
    }
    println!(
        "{} {} received the same payload {} ms later",
        "✓".green(),
        second.label,
        mirrored
            .timestamp
            .saturating_duration_since(received.timestamp)
            .as_millis()
    );

    for field in ["id", "product_id", "quantity", "amount", "date"] {
        if received.data["record"].get(field).is_none() {
            return Ok(TestResult::fail(
                name,
                format!("Sale record is missing `{field}`"),
                start.elapsed(),
            ));
        }
    }

    first.close().await?;
    second.close().await?;

    Ok(TestResult::pass(name, start.elapsed()))
}

/// Exercise the REST surface: list products, create and delete an order,
/// and check the sales filter validation.
pub async fn test_orders(api_client: &ApiClient) -> Result<TestResult> {
    let name = "orders-test";
    let start = Instant::now();
    println!("\n{} Running {}", "→".blue(), name.bold());

    let products = api_client.list_products().await?;
    let Some(product_id) = products.first().and_then(|p| p["id"].as_i64()) else {
        return Ok(TestResult::fail(
            name,
            "No products found; run seed_db first",
            start.elapsed(),
        ));
    };
    println!("{} {} product(s) listed", "✓".green(), products.len());

    let order_id = api_client.create_order(product_id, 3).await?;
    println!("{} Order {} created", "✓".green(), order_id);

    let orders = api_client.list_orders().await?;
    if !orders.iter().any(|o| o["id"].as_i64() == Some(order_id)) {
        return Ok(TestResult::fail(
            name,
            format!("Order {order_id} missing from the order list"),
            start.elapsed(),
        ));
    }

    let status = api_client.delete_order(order_id).await?;
    if status != StatusCode::OK {
        return Ok(TestResult::fail(
            name,
            format!("Deleting order {order_id} returned {status}"),
            start.elapsed(),
        ));
    }
    let status = api_client.delete_order(order_id).await?;
    if status != StatusCode::NOT_FOUND {
        return Ok(TestResult::fail(
            name,
            format!("Deleting order {order_id} twice returned {status}, expected 404"),
            start.elapsed(),
        ));
    }
    println!("{} Order {} deleted", "✓".green(), order_id);

    let (status, _) = api_client.list_sales("all").await?;
    if status != StatusCode::OK {
        return Ok(TestResult::fail(
            name,
            format!("Listing all sales returned {status}"),
            start.elapsed(),
        ));
    }
    let (status, _) = api_client.list_sales("not-a-product").await?;
    if status != StatusCode::UNPROCESSABLE_ENTITY {
        return Ok(TestResult::fail(
            name,
            format!("Invalid product_id returned {status}, expected 422"),
            start.elapsed(),
        ));
    }
    println!("{} Sales filter validated", "✓".green());

    Ok(TestResult::pass(name, start.elapsed()))
}
