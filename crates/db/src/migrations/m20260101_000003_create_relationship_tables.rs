//! Create follow, favourite and mute tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follow::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Follow::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Follow::SourceId).big_integer().not_null())
                    .col(ColumnDef::new(Follow::TargetId).big_integer().not_null())
                    .col(ColumnDef::new(Follow::Approved).boolean().not_null().default(false))
                    .col(ColumnDef::new(Follow::ActivityUri).string_len(1024))
                    .col(
                        ColumnDef::new(Follow::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_source")
                            .from(Follow::Table, Follow::SourceId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_target")
                            .from(Follow::Table, Follow::TargetId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (source_id, target_id) - one follow (or request) per pair
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_source_target")
                    .table(Follow::Table)
                    .col(Follow::SourceId)
                    .col(Follow::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (target_id, approved) - for paging followers during fan-out
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_target_approved")
                    .table(Follow::Table)
                    .col(Follow::TargetId)
                    .col(Follow::Approved)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Favourite::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Favourite::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Favourite::ActorId).big_integer().not_null())
                    .col(ColumnDef::new(Favourite::StatusId).big_integer().not_null())
                    .col(ColumnDef::new(Favourite::ActivityUri).string_len(1024))
                    .col(
                        ColumnDef::new(Favourite::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favourite_actor")
                            .from(Favourite::Table, Favourite::ActorId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favourite_status")
                            .from(Favourite::Table, Favourite::StatusId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_favourite_actor_status")
                    .table(Favourite::Table)
                    .col(Favourite::ActorId)
                    .col(Favourite::StatusId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_favourite_status_id")
                    .table(Favourite::Table)
                    .col(Favourite::StatusId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Mute::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Mute::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Mute::OwnerId).big_integer().not_null())
                    .col(ColumnDef::new(Mute::TargetId).big_integer().not_null())
                    .col(ColumnDef::new(Mute::Statuses).boolean().not_null().default(true))
                    .col(ColumnDef::new(Mute::Boosts).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Mute::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mute_owner")
                            .from(Mute::Table, Mute::OwnerId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mute_target")
                            .from(Mute::Table, Mute::TargetId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mute_owner_target")
                    .table(Mute::Table)
                    .col(Mute::OwnerId)
                    .col(Mute::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mute::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Favourite::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Follow::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Follow {
    Table,
    Id,
    SourceId,
    TargetId,
    Approved,
    ActivityUri,
    CreatedAt,
}

#[derive(Iden)]
enum Favourite {
    Table,
    Id,
    ActorId,
    StatusId,
    ActivityUri,
    CreatedAt,
}

#[derive(Iden)]
enum Mute {
    Table,
    Id,
    OwnerId,
    TargetId,
    Statuses,
    Boosts,
    CreatedAt,
}

#[derive(Iden)]
enum Actor {
    Table,
    Id,
}

#[derive(Iden)]
enum Status {
    Table,
    Id,
}
