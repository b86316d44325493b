use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod api_client;
mod output;
mod scenarios;
mod ws_client;

use api_client::ApiClient;
use output::print_test_summary;

#[derive(Parser)]
#[command(name = "relay-test-client")]
#[command(about = "Sales relay integration testing tool")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:8080)
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Seconds to wait for a live sale in the fan-out test; should exceed
    /// the server's simulation interval
    #[arg(long, default_value_t = 45)]
    event_timeout_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Open and cleanly close a relay connection
    ConnectionTest,
    /// Two relay connections receive the same live sale
    FanOutTest,
    /// REST round trip over products, orders and the sales filter
    OrdersTest,
    /// Run every scenario
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let api_client = ApiClient::new(reqwest::Client::new(), cli.base_url.clone());
    api_client.health().await?;
    println!("{} Backend is healthy at {}", "✓".green(), cli.base_url);

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let event_timeout = Duration::from_secs(cli.event_timeout_secs);
    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&cli.base_url).await?);
        }
        ScenarioChoice::FanOutTest => {
            results.push(scenarios::test_fan_out(&cli.base_url, event_timeout).await?);
        }
        ScenarioChoice::OrdersTest => {
            results.push(scenarios::test_orders(&api_client).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&cli.base_url).await?);
            results.push(scenarios::test_orders(&api_client).await?);
            results.push(scenarios::test_fan_out(&cli.base_url, event_timeout).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
