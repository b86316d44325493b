pub use sea_orm_migration::prelude::*;

mod m20250301_120000_create_sales_tables;
mod m20250301_120500_add_sales_sorting_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_120000_create_sales_tables::Migration),
            Box::new(m20250301_120500_add_sales_sorting_indexes::Migration),
        ]
    }
}
