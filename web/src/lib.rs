//! HTTP surface of the sales dashboard: REST endpoints for sales, orders
//! and products, plus the `/ws/sales` relay endpoint.

use log::*;
use tokio::net::TcpListener;

pub use service::AppState;

mod controller;
mod error;
mod middleware;
mod params;
mod ws;
mod router;

pub use error::{Error, Result};
pub use router::define_routes;

/// Bind the configured interface and port and serve until the shared
/// shutdown token fires. Open relay sessions close on the same token, so
/// the graceful drain does not wait on them.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let host = format!("{}:{}", interface, app_state.config.port);

    let listener = TcpListener::bind(&host).await?;
    info!("Server starting... listening for connections on http://{host}");

    let shutdown = app_state.shutdown.clone();
    let app = define_routes(app_state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped accepting connections");
    Ok(())
}
