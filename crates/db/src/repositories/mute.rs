//! Mute repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use vitrine_common::AppResult;

use super::db_err;
use crate::entities::{Mute, mute};
use crate::store::MuteStore;

#[derive(Clone)]
pub struct MuteRepository {
    db: Arc<DatabaseConnection>,
}

impl MuteRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MuteStore for MuteRepository {
    async fn find_mute(&self, owner_id: i64, target_id: i64) -> AppResult<Option<mute::Model>> {
        Mute::find()
            .filter(mute::Column::OwnerId.eq(owner_id))
            .filter(mute::Column::TargetId.eq(target_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
