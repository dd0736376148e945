pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_storefront_tables;
mod m20250901_000002_seed_storefront;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_storefront_tables::Migration),
            Box::new(m20250901_000002_seed_storefront::Migration),
        ]
    }
}
