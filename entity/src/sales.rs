//! SeaORM Entity for the sales table.
//! Rows are only ever inserted by the synthetic sale generator.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, ToSchema, Serialize, Deserialize)]
#[schema(as = entity::sales::Model)] // OpenAPI schema
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    pub product_id: Id,
    pub quantity: i32,
    /// Total sale amount (quantity times unit price)
    #[sea_orm(column_type = "Double")]
    pub amount: f64,
    #[schema(value_type = String, format = DateTime)] // Applies to OpenAPI schema
    pub date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Products,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
