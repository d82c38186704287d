//! Create actor table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Actor::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Actor::Id).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Actor::Uri).string_len(1024).not_null())
                    .col(ColumnDef::new(Actor::Username).string_len(128).not_null())
                    .col(ColumnDef::new(Actor::Domain).string_len(256))
                    .col(ColumnDef::new(Actor::IsLocal).boolean().not_null().default(false))
                    .col(ColumnDef::new(Actor::DisplayName).string_len(256))
                    .col(ColumnDef::new(Actor::Summary).text())
                    .col(ColumnDef::new(Actor::InboxUrl).string_len(1024).not_null())
                    .col(ColumnDef::new(Actor::SharedInboxUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::FollowersUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::ProfileUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::PublicKeyPem).text())
                    .col(ColumnDef::new(Actor::PrivateKeyPem).text())
                    .col(
                        ColumnDef::new(Actor::ManuallyApprovesFollowers)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Actor::AvatarRemoteUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::AvatarUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::HeaderRemoteUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::HeaderUrl).string_len(1024))
                    .col(ColumnDef::new(Actor::FollowersCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Actor::FollowingCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Actor::StatusCount).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Actor::LastRefreshedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Actor::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // A second concurrent resolver of the same actor hits this and updates instead.
        manager
            .create_index(
                Index::create()
                    .name("idx_actor_uri")
                    .table(Actor::Table)
                    .col(Actor::Uri)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actor_username_domain")
                    .table(Actor::Table)
                    .col(Actor::Username)
                    .col(Actor::Domain)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actor_shared_inbox_url")
                    .table(Actor::Table)
                    .col(Actor::SharedInboxUrl)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Actor::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Actor {
    Table,
    Id,
    Uri,
    Username,
    Domain,
    IsLocal,
    DisplayName,
    Summary,
    InboxUrl,
    SharedInboxUrl,
    FollowersUrl,
    ProfileUrl,
    PublicKeyPem,
    PrivateKeyPem,
    ManuallyApprovesFollowers,
    AvatarRemoteUrl,
    AvatarUrl,
    HeaderRemoteUrl,
    HeaderUrl,
    FollowersCount,
    FollowingCount,
    StatusCount,
    LastRefreshedAt,
    CreatedAt,
}
