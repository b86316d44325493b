use crate::error::Error;
use crate::products::Model;
use entity_api::product;
use sea_orm::DatabaseConnection;

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(product::find_all(db).await?)
}
