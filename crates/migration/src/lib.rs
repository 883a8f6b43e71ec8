pub use sea_orm_migration::prelude::*;

mod m20260712_090000_financing_records;
mod m20260712_100000_installments;
mod m20260719_090000_timeline_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260712_090000_financing_records::Migration),
            Box::new(m20260712_100000_installments::Migration),
            Box::new(m20260719_090000_timeline_events::Migration),
        ]
    }
}
