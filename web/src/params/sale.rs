use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct IndexParams {
    /// `all`, or the id of a single product. Omitted means `all`.
    #[param(example = "all")]
    pub(crate) product_id: Option<String>,
}
