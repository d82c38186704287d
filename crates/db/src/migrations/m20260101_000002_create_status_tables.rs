//! Create status, attachment and tag tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Status::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Status::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Status::Uri).string_len(1024).not_null())
                    .col(ColumnDef::new(Status::Url).string_len(1024))
                    .col(ColumnDef::new(Status::IsLocal).boolean().not_null().default(false))
                    .col(ColumnDef::new(Status::AuthorId).big_integer().not_null())
                    .col(ColumnDef::new(Status::Visibility).string_len(16).not_null())
                    .col(ColumnDef::new(Status::Content).text().not_null())
                    .col(ColumnDef::new(Status::ContentWarning).string_len(1024))
                    .col(ColumnDef::new(Status::Sensitive).boolean().not_null().default(false))
                    .col(ColumnDef::new(Status::ReplyToId).big_integer())
                    .col(ColumnDef::new(Status::ThreadRootId).big_integer())
                    .col(ColumnDef::new(Status::ReblogOfId).big_integer())
                    .col(ColumnDef::new(Status::FavouritesCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Status::ReblogsCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Status::RepliesCount).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Status::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_author")
                            .from(Status::Table, Status::AuthorId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_reblog_of")
                            .from(Status::Table, Status::ReblogOfId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_reply_to")
                            .from(Status::Table, Status::ReplyToId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, col, unique) in [
            ("idx_status_uri", Status::Uri, true),
            ("idx_status_url", Status::Url, false),
            ("idx_status_author_id", Status::AuthorId, false),
            ("idx_status_reply_to_id", Status::ReplyToId, false),
            ("idx_status_thread_root_id", Status::ThreadRootId, false),
            ("idx_status_reblog_of_id", Status::ReblogOfId, false),
        ] {
            let mut index = Index::create();
            index.name(name).table(Status::Table).col(col);
            if unique {
                index.unique();
            }
            manager.create_index(index.to_owned()).await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(StatusAttachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StatusAttachment::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StatusAttachment::StatusId).big_integer().not_null())
                    .col(ColumnDef::new(StatusAttachment::RemoteUrl).string_len(1024).not_null())
                    .col(ColumnDef::new(StatusAttachment::MediaType).string_len(128))
                    .col(ColumnDef::new(StatusAttachment::Description).text())
                    .col(ColumnDef::new(StatusAttachment::Position).integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_attachment_status")
                            .from(StatusAttachment::Table, StatusAttachment::StatusId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_status_attachment_status_id")
                    .table(StatusAttachment::Table)
                    .col(StatusAttachment::StatusId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StatusTag::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StatusTag::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(StatusTag::StatusId).big_integer().not_null())
                    .col(ColumnDef::new(StatusTag::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(StatusTag::Name).string_len(1024).not_null())
                    .col(ColumnDef::new(StatusTag::ActorId).big_integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_tag_status")
                            .from(StatusTag::Table, StatusTag::StatusId)
                            .to(Status::Table, Status::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_tag_actor")
                            .from(StatusTag::Table, StatusTag::ActorId)
                            .to(Actor::Table, Actor::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_status_tag_status_id")
                    .table(StatusTag::Table)
                    .col(StatusTag::StatusId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_status_tag_name")
                    .table(StatusTag::Table)
                    .col(StatusTag::Name)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StatusTag::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StatusAttachment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Status::Table).to_owned())
            .await
    }
}

#[derive(Iden, Clone, Copy)]
enum Status {
    Table,
    Id,
    Uri,
    Url,
    IsLocal,
    AuthorId,
    Visibility,
    Content,
    ContentWarning,
    Sensitive,
    ReplyToId,
    ThreadRootId,
    ReblogOfId,
    FavouritesCount,
    ReblogsCount,
    RepliesCount,
    CreatedAt,
}

#[derive(Iden)]
enum StatusAttachment {
    Table,
    Id,
    StatusId,
    RemoteUrl,
    MediaType,
    Description,
    Position,
}

#[derive(Iden)]
enum StatusTag {
    Table,
    Id,
    StatusId,
    Kind,
    Name,
    ActorId,
}

#[derive(Iden)]
enum Actor {
    Table,
    Id,
}
