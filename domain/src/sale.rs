use crate::error::Error;
use crate::sales::Model;
use entity_api::sale;
use sea_orm::DatabaseConnection;

pub use entity_api::sale::ProductFilter;

/// Parse the optional `product_id` query term; absent means every product.
pub fn product_filter(term: Option<&str>) -> Result<ProductFilter, Error> {
    match term {
        Some(term) => Ok(term.parse::<ProductFilter>()?),
        None => Ok(ProductFilter::All),
    }
}

/// Sales newest first, narrowed by `filter`.
pub async fn find(db: &DatabaseConnection, filter: ProductFilter) -> Result<Vec<Model>, Error> {
    Ok(sale::find_by_product(db, filter).await?)
}

/// Records a sale and announces it on `channel` once committed.
pub async fn record(db: &DatabaseConnection, channel: &str, model: Model) -> Result<Model, Error> {
    Ok(sale::create_and_notify(db, channel, model).await?)
}
