use crate::{AppState, Error};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use domain::product as ProductApi;

/// GET the product catalogue
#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Successfully retrieved all Products", body = [domain::products::Model]),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn index(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let products = ProductApi::find_all(app_state.db_conn_ref()).await?;

    Ok(Json(products))
}
