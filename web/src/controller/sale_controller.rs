use crate::params::sale::IndexParams;
use crate::{AppState, Error};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use domain::sale as SaleApi;

use log::*;

/// GET sales, newest first, optionally for one product
#[utoipa::path(
    get,
    path = "/api/sales",
    params(IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved sales", body = [domain::sales::Model]),
        (status = 422, description = "product_id is neither 'all' nor a numeric id"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all Sales with params: {params:?}");

    let filter = SaleApi::product_filter(params.product_id.as_deref())?;
    let sales = SaleApi::find(app_state.db_conn_ref(), filter).await?;

    debug!("Found {} Sales for {filter:?}", sales.len());

    Ok(Json(sales))
}
