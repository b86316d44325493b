use log::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

pub use entity::{orders, products, sales, Id};

pub mod error;
pub mod order;
pub mod product;
pub mod sale;

pub(crate) fn id_parse_str(id_str: &str) -> Result<Id, error::Error> {
    id_str.trim().parse::<Id>().map_err(|_| error::Error {
        source: None,
        error_kind: error::EntityApiErrorKind::InvalidQueryTerm,
    })
}

/// Unit price every seeded product sells at; simulated sale amounts use it too.
pub const UNIT_PRICE: f64 = 99.99;

const SEED_PRODUCTS: [&str; 3] = ["Widget", "Gadget", "Doohickey"];

/// Seeds the catalogue and a handful of orders and sales for local development.
///
/// Does nothing if products already exist.
pub async fn seed_database(db: &DatabaseConnection) -> Result<(), error::Error> {
    if products::Entity::find().count(db).await? > 0 {
        info!("Database already seeded, skipping");
        return Ok(());
    }

    let now = chrono::Utc::now();
    let mut product_ids = Vec::with_capacity(SEED_PRODUCTS.len());

    for name in SEED_PRODUCTS {
        let product = products::ActiveModel {
            name: Set(name.to_owned()),
            price: Set(UNIT_PRICE),
            ..Default::default()
        }
        .insert(db)
        .await?;
        product_ids.push(product.id);
    }

    for (i, product_id) in product_ids.iter().enumerate() {
        let quantity = i as i32 + 1;

        orders::ActiveModel {
            product_id: Set(*product_id),
            quantity: Set(quantity * 10),
            status: Set(orders::DEFAULT_STATUS.to_owned()),
            created_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        sales::ActiveModel {
            product_id: Set(*product_id),
            quantity: Set(quantity),
            amount: Set(f64::from(quantity) * UNIT_PRICE),
            date: Set((now - chrono::Duration::hours(i as i64 + 1)).into()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    info!(
        "Seeded {} products with one order and one sale each",
        product_ids.len()
    );

    Ok(())
}
