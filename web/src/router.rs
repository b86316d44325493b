use crate::controller::{
    health_check_controller, order_controller, product_controller, sale_controller,
};
use crate::middleware::request_log::log_request;
use crate::ws::handler as relay_handler;
use crate::{params, AppState};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{delete, get},
    Router,
};
use log::*;
use service::config::Config;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Sales Relay API"
        ),
        paths(
            health_check_controller::health_check,
            order_controller::index,
            order_controller::create,
            order_controller::delete,
            product_controller::index,
            sale_controller::index,
            relay_handler::relay_handler,
        ),
        components(
            schemas(
                domain::orders::Model,
                domain::products::Model,
                domain::sales::Model,
            )
        ),
        tags(
            (name = "sales_relay", description = "Sales dashboard API and live sales relay")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(health_routes())
        .merge(order_routes(app_state.clone()))
        .merge(product_routes(app_state.clone()))
        .merge(sale_routes(app_state.clone()))
        .merge(relay_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(from_fn(log_request))
        .layer(CatchPanicLayer::new())
        .layer(cors)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();
    info!("CORS allowed origins: {:?}", config.allowed_origins);

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn order_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/orders",
            get(order_controller::index).post(order_controller::create),
        )
        .route("/api/orders/:id", delete(order_controller::delete))
        .with_state(app_state)
}

fn product_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/products", get(product_controller::index))
        .with_state(app_state)
}

fn sale_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sales", get(sale_controller::index))
        .with_state(app_state)
}

// Any origin may open the relay socket.
fn relay_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws/sales", get(relay_handler::relay_handler))
        .with_state(app_state)
}
