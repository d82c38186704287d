//! Mute settings one local actor keeps about another.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mute")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    pub owner_id: i64,

    pub target_id: i64,

    /// Hide the target's own statuses from the owner's home timeline.
    pub statuses: bool,

    /// Hide the target's boosts from the owner's home timeline.
    pub boosts: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::OwnerId",
        to = "super::actor::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,

    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::TargetId",
        to = "super::actor::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether a status (or boost, when `is_reblog`) by the target is hidden.
    #[must_use]
    pub const fn hides(&self, is_reblog: bool) -> bool {
        if is_reblog { self.boosts } else { self.statuses }
    }
}
