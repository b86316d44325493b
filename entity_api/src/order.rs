use super::error::Error;
use entity::orders::{ActiveModel, Column, Entity, Model};
use entity::Id;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder};

use log::*;

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?)
}

/// Inserts a new order and returns the stored row, including the id and
/// timestamp assigned by the database.
pub async fn create(db: &DatabaseConnection, order_model: Model) -> Result<Model, Error> {
    debug!("New Order Model to be inserted: {:?}", order_model);

    let order_active_model = ActiveModel {
        product_id: Set(order_model.product_id),
        quantity: Set(order_model.quantity),
        status: Set(order_model.status),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    Ok(order_active_model.insert(db).await?)
}

pub async fn delete_by_id(db: &DatabaseConnection, id: Id) -> Result<(), Error> {
    let result = Entity::delete_by_id(id).exec(db).await?;

    if result.rows_affected == 0 {
        debug!("Order with id {} not found", id);
        return Err(Error::record_not_found());
    }

    Ok(())
}
