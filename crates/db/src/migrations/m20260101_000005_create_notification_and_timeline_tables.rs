//! Create notification and home timeline tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Notification::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Notification::RecipientId).big_integer().not_null())
                    .col(ColumnDef::new(Notification::ActorId).big_integer().not_null())
                    .col(ColumnDef::new(Notification::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Notification::StatusId).big_integer())
                    .col(ColumnDef::new(Notification::ContextStatusId).big_integer())
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_recipient")
                            .from(Notification::Table, Notification::RecipientId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_actor")
                            .from(Notification::Table, Notification::ActorId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_status")
                            .from(Notification::Table, Notification::StatusId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_recipient_id")
                    .table(Notification::Table)
                    .col(Notification::RecipientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TimelineEntry::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TimelineEntry::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(TimelineEntry::OwnerId).big_integer().not_null())
                    .col(ColumnDef::new(TimelineEntry::StatusId).big_integer().not_null())
                    .col(ColumnDef::new(TimelineEntry::ContentStatusId).big_integer().not_null())
                    .col(
                        ColumnDef::new(TimelineEntry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_timeline_entry_owner")
                            .from(TimelineEntry::Table, TimelineEntry::OwnerId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_timeline_entry_status")
                            .from(TimelineEntry::Table, TimelineEntry::StatusId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (owner_id, content_status_id) - fan-out inserts are idempotent
        manager
            .create_index(
                Index::create()
                    .name("idx_timeline_entry_owner_content")
                    .table(TimelineEntry::Table)
                    .col(TimelineEntry::OwnerId)
                    .col(TimelineEntry::ContentStatusId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_timeline_entry_status_id")
                    .table(TimelineEntry::Table)
                    .col(TimelineEntry::StatusId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TimelineEntry::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    RecipientId,
    ActorId,
    Kind,
    StatusId,
    ContextStatusId,
    CreatedAt,
}

#[derive(Iden)]
enum TimelineEntry {
    Table,
    Id,
    OwnerId,
    StatusId,
    ContentStatusId,
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
