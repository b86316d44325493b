use super::error::Error;
use entity::products::{Column, Entity, Model};
use sea_orm::{entity::prelude::*, DatabaseConnection, QueryOrder};

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find().order_by_asc(Column::Id).all(db).await?)
}
