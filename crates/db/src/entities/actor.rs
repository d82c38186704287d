//! Actor entity: local accounts and the cache of remote profiles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "actor")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// Canonical actor URI.
    #[sea_orm(unique)]
    pub uri: String,

    pub username: String,

    /// Lowercased host, `None` for local actors.
    #[sea_orm(nullable, indexed)]
    pub domain: Option<String>,

    pub is_local: bool,

    #[sea_orm(nullable)]
    pub display_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,

    pub inbox_url: String,

    #[sea_orm(nullable, indexed)]
    pub shared_inbox_url: Option<String>,

    #[sea_orm(nullable)]
    pub followers_url: Option<String>,

    /// Profile page URL. Cleared when it is not same-origin with `uri`.
    #[sea_orm(nullable)]
    pub profile_url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub public_key_pem: Option<String>,

    /// Only ever set for local actors.
    #[sea_orm(column_type = "Text", nullable)]
    pub private_key_pem: Option<String>,

    pub manually_approves_followers: bool,

    #[sea_orm(nullable)]
    pub avatar_remote_url: Option<String>,

    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,

    #[sea_orm(nullable)]
    pub header_remote_url: Option<String>,

    #[sea_orm(nullable)]
    pub header_url: Option<String>,

    #[sea_orm(default_value = 0)]
    pub followers_count: i64,

    #[sea_orm(default_value = 0)]
    pub following_count: i64,

    #[sea_orm(default_value = 0)]
    pub status_count: i64,

    pub last_refreshed_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::status::Entity")]
    Statuses,
}

impl Related<super::status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Statuses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inbox to deliver to when addressing this actor's whole server.
    #[must_use]
    pub fn preferred_inbox(&self) -> &str {
        self.shared_inbox_url.as_deref().unwrap_or(&self.inbox_url)
    }

    /// Key id used in the `Signature` header of requests signed by this actor.
    #[must_use]
    pub fn key_id(&self) -> String {
        format!("{}#main-key", self.uri)
    }
}
