//! Notification writer for queued notify jobs.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use vitrine_common::AppResult;
use vitrine_db::entities::notification;

use crate::{context::FederationContext, jobs::NotifyJob};

#[derive(Clone)]
pub struct Notifier {
    ctx: Arc<FederationContext>,
}

impl Notifier {
    #[must_use]
    pub const fn new(ctx: Arc<FederationContext>) -> Self {
        Self { ctx }
    }

    /// Write the notification. Returns `false` when there is nobody local to
    /// tell or the actor would be notifying themself.
    pub async fn notify(&self, job: &NotifyJob) -> AppResult<bool> {
        if job.recipient_id == job.actor_id {
            return Ok(false);
        }
        let recipient = self.ctx.stores.actors.find_actor(job.recipient_id).await?;
        if !recipient.as_ref().is_some_and(|r| r.is_local) {
            debug!(recipient_id = job.recipient_id, "No local recipient for notification");
            return Ok(false);
        }

        self.ctx
            .stores
            .notifications
            .insert_notification(notification::Model {
                id: self.ctx.ids.generate(),
                recipient_id: job.recipient_id,
                actor_id: job.actor_id,
                kind: job.kind,
                status_id: job.status_id,
                context_status_id: job.context_status_id,
                created_at: Utc::now().into(),
            })
            .await?;

        info!(recipient_id = job.recipient_id, kind = ?job.kind, "Notification created");
        Ok(true)
    }
}
