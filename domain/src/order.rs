use crate::error::Error;
use crate::orders::Model;
use crate::Id;
use entity_api::order;
use sea_orm::DatabaseConnection;

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(order::find_all(db).await?)
}

pub async fn create(db: &DatabaseConnection, model: Model) -> Result<Model, Error> {
    Ok(order::create(db, model).await?)
}

pub async fn delete_by_id(db: &DatabaseConnection, id: Id) -> Result<(), Error> {
    Ok(order::delete_by_id(db, id).await?)
}
