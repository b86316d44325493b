use events::{EventHandler, EventPublisher};
use log::*;
use relay::{forward, EventSource, Hub, PgConnector};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting sales relay ({:?}) on {}:{}",
        config.runtime_env(),
        config.interface.as_deref().unwrap_or("127.0.0.1"),
        config.port
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let settings = config.relay_settings();
    let shutdown = CancellationToken::new();
    let hub = Arc::new(Hub::new(settings.queue_capacity));
    let publisher =
        EventPublisher::new().with_handler(Arc::clone(&hub) as Arc<dyn EventHandler>);

    // The upstream subscription must exist before clients are accepted;
    // later drops are retried inside the event stream.
    let source = EventSource::new(
        PgConnector::new(config.database_url()),
        &settings,
        shutdown.child_token(),
    );
    let events = match source.subscribe().await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to subscribe to notification channel {}: {e}", settings.channel);
            std::process::exit(1);
        }
    };

    let mut background = JoinSet::new();
    background.spawn(forward(events, publisher));

    if config.simulation_enabled {
        background.spawn(domain::simulation::run(
            Arc::clone(&db),
            settings.channel.clone(),
            config.simulation_interval(),
            shutdown.child_token(),
        ));
    } else {
        info!("Sale simulation disabled");
    }

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let shutdown_timeout = config.shutdown_timeout();
    let app_state = AppState::new(config, &db, hub, shutdown.clone());

    if let Err(e) = web::init_server(app_state).await {
        error!("Server error: {e}");
        shutdown.cancel();
    }

    let drain = async { while background.join_next().await.is_some() {} };
    if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
        warn!("Background tasks did not stop within {shutdown_timeout:?}, aborting them");
        background.abort_all();
    }

    info!("Sales relay stopped");
}

/// Cancel `shutdown` on Ctrl+C, or on SIGTERM where the platform has it.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
