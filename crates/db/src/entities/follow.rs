//! Follow entity. Pending follow requests are rows with `approved = false`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// The actor who is following.
    pub source_id: i64,

    /// The actor being followed.
    #[sea_orm(indexed)]
    pub target_id: i64,

    pub approved: bool,

    /// Id of the `Follow` activity that created this row, echoed back in
    /// `Accept`/`Reject` responses.
    #[sea_orm(nullable, indexed)]
    pub activity_uri: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::SourceId",
        to = "super::actor::Column::Id",
        on_delete = "Cascade"
    )]
    Source,

    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::TargetId",
        to = "super::actor::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}
