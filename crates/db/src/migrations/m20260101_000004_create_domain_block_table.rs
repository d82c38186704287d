//! Create domain block table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DomainBlock::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DomainBlock::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(DomainBlock::Domain).string_len(256).not_null())
                    .col(ColumnDef::new(DomainBlock::Scope).string_len(16).not_null())
                    .col(ColumnDef::new(DomainBlock::OwnerId).big_integer())
                    .col(
                        ColumnDef::new(DomainBlock::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_domain_block_owner")
                            .from(DomainBlock::Table, DomainBlock::OwnerId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domain_block_domain_scope")
                    .table(DomainBlock::Table)
                    .col(DomainBlock::Domain)
                    .col(DomainBlock::Scope)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DomainBlock::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DomainBlock {
    Table,
    Id,
    Domain,
    Scope,
    OwnerId,
    CreatedAt,
}

#[derive(Iden)]
enum Actor {
    Table,
    Id,
}
