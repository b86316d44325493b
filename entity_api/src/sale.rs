use super::error::Error;
use crate::id_parse_str;
use entity::sales::{ActiveModel, Column, Entity, Model};
use entity::Id;
use events::ChangeNotification;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    QueryOrder, Statement, TransactionTrait,
};
use std::str::FromStr;

use log::*;

/// Which sales a listing covers: every product, or a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFilter {
    All,
    Product(Id),
}

impl FromStr for ProductFilter {
    type Err = Error;

    fn from_str(term: &str) -> Result<Self, Self::Err> {
        if term.trim().eq_ignore_ascii_case("all") {
            Ok(ProductFilter::All)
        } else {
            id_parse_str(term).map(ProductFilter::Product)
        }
    }
}

pub async fn find_by_product(db: &DatabaseConnection, filter: ProductFilter) -> Result<Vec<Model>, Error> {
    match filter {
        ProductFilter::All => find_all(db).await,
        ProductFilter::Product(product_id) => find_by_product_id(db, product_id).await,
    }
}

/// All sales, newest first.
pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .order_by_desc(Column::Date)
        .all(db)
        .await?)
}

/// Sales for one product, newest first.
pub async fn find_by_product_id(db: &DatabaseConnection, product_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::ProductId.eq(product_id))
        .order_by_desc(Column::Date)
        .all(db)
        .await?)
}

/// Inserts a sale and notifies `channel` about it in the same transaction.
///
/// Postgres only delivers the notification when the transaction commits, so
/// listeners never hear about a sale that was rolled back.
pub async fn create_and_notify(
    db: &DatabaseConnection,
    channel: &str,
    sale_model: Model,
) -> Result<Model, Error> {
    debug!("New Sale Model to be inserted: {:?}", sale_model);

    let txn = db.begin().await?;

    let sale = ActiveModel {
        product_id: Set(sale_model.product_id),
        quantity: Set(sale_model.quantity),
        amount: Set(sale_model.amount),
        date: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let payload = ChangeNotification::insert(&sale).to_event()?;
    txn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        "SELECT pg_notify($1, $2)",
        [channel.into(), payload.as_str().into()],
    ))
    .await?;

    txn.commit().await?;

    Ok(sale)
}
