use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::{order as OrderApi, orders::Model, Id};

use serde_json::json;

use log::*;

/// GET all Orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Successfully retrieved all Orders", body = [domain::orders::Model]),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn index(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let orders = OrderApi::find_all(app_state.db_conn_ref()).await?;

    Ok(Json(orders))
}

/// POST create a new Order
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = domain::orders::Model,
    responses(
        (status = 201, description = "Successfully Created a New Order"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Json(order_model): Json<Model>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Create a New Order from: {order_model:?}");

    let order = OrderApi::create(app_state.db_conn_ref(), order_model).await?;

    debug!("New Order: {order:?}");

    Ok((
        StatusCode::CREATED,
        Json(json!({"id": order.id, "message": "Order created successfully"})),
    ))
}

/// DELETE an Order specified by its id
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(
        ("id" = Id, Path, description = "Order id to delete")
    ),
    responses(
        (status = 200, description = "Successfully deleted the Order"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    info!("DELETE Order by id: {id}");

    OrderApi::delete_by_id(app_state.db_conn_ref(), id).await?;

    Ok(Json(json!({"message": "Order deleted successfully"})))
}
