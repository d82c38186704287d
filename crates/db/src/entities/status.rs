//! Status entity: posts, replies and boosts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who a status is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Visibility {
    #[sea_orm(string_value = "public")]
    Public,
    #[sea_orm(string_value = "followers")]
    Followers,
    #[sea_orm(string_value = "direct")]
    Direct,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// Canonical URI. For boosts, the id of the `Announce` activity.
    #[sea_orm(unique)]
    pub uri: String,

    /// Alternate HTML URL a status may also be addressed by.
    #[sea_orm(nullable, indexed)]
    pub url: Option<String>,

    pub is_local: bool,

    #[sea_orm(indexed)]
    pub author_id: i64,

    pub visibility: Visibility,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(nullable)]
    pub content_warning: Option<String>,

    pub sensitive: bool,

    #[sea_orm(nullable, indexed)]
    pub reply_to_id: Option<i64>,

    /// First status of the thread, `None` for top-level statuses.
    #[sea_orm(nullable, indexed)]
    pub thread_root_id: Option<i64>,

    #[sea_orm(nullable, indexed)]
    pub reblog_of_id: Option<i64>,

    #[sea_orm(default_value = 0)]
    pub favourites_count: i64,

    #[sea_orm(default_value = 0)]
    pub reblogs_count: i64,

    #[sea_orm(default_value = 0)]
    pub replies_count: i64,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::AuthorId",
        to = "super::actor::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::status_attachment::Entity")]
    Attachments,

    #[sea_orm(has_many = "super::status_tag::Entity")]
    Tags,
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::status_attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

impl Related<super::status_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[must_use]
    pub const fn is_reblog(&self) -> bool {
        self.reblog_of_id.is_some()
    }

    /// Id of the thread this status belongs to; its own id when top-level.
    #[must_use]
    pub fn thread_root(&self) -> i64 {
        self.thread_root_id.unwrap_or(self.id)
    }
}
