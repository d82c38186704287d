//! Database migrations.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_actor_table;
mod m20260101_000002_create_status_tables;
mod m20260101_000003_create_relationship_tables;
mod m20260101_000004_create_domain_block_table;
mod m20260101_000005_create_notification_and_timeline_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_actor_table::Migration),
            Box::new(m20260101_000002_create_status_tables::Migration),
            Box::new(m20260101_000003_create_relationship_tables::Migration),
            Box::new(m20260101_000004_create_domain_block_table::Migration),
            Box::new(m20260101_000005_create_notification_and_timeline_tables::Migration),
        ]
    }
}
