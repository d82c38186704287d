//! Notification repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder,
};
use vitrine_common::AppResult;

use super::db_err;
use crate::entities::{Notification, notification};
use crate::store::NotificationStore;

#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert_notification(&self, notification: notification::Model) -> AppResult<()> {
        notification
            .into_active_model()
            .insert(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn notifications_for(&self, recipient_id: i64) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .order_by_desc(notification::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
