use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, ToSchema, Serialize, Deserialize)]
#[schema(as = entity::orders::Model)] // OpenAPI schema
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    pub product_id: Id,
    pub quantity: i32,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)] // Applies to OpenAPI schema
    pub created_at: DateTimeWithTimeZone,
}

/// Orders are placed as "pending" unless the client says otherwise.
pub const DEFAULT_STATUS: &str = "pending";

fn default_status() -> String {
    DEFAULT_STATUS.to_owned()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_defaults_status_and_ignores_server_fields() {
        let order: Model = serde_json::from_str(
            r#"{"id": 99, "product_id": 2, "quantity": 5, "created_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(order.id, 0);
        assert_eq!(order.product_id, 2);
        assert_eq!(order.quantity, 5);
        assert_eq!(order.status, DEFAULT_STATUS);
    }
}
