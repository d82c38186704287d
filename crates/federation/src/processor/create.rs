//! Create activity processor.

use tracing::info;
use vitrine_common::AppResult;
use vitrine_db::entities::{
    notification::NotificationKind, status::Visibility, status_tag::TagKind,
};

use super::{ProcessOutcome, Services, unresolved};
use crate::{
    activities::{Activity, ObjectRef},
    jobs::{FanoutJob, Job, NotifyJob},
    objects::ApNote,
};

/// Processor for Create activities carrying posts.
#[derive(Clone)]
pub struct CreateProcessor {
    s: Services,
}

impl CreateProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    /// Process one created object.
    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let note: ApNote = match &object.inline {
            Some(body) => match serde_json::from_value(body.clone()) {
                Ok(note) => note,
                Err(e) => {
                    return Ok(ProcessOutcome::skipped(format!(
                        "{} is not a supported post: {e}",
                        object.id
                    )));
                }
            },
            None => match self.s.statuses.fetch(&object.id).await {
                Ok(note) => note,
                Err(e) => return unresolved(&object.id, e),
            },
        };

        if note.author().as_deref() != Some(activity.actor()) {
            return Ok(ProcessOutcome::skipped(format!(
                "{} is not attributed to {}",
                note.id,
                activity.actor()
            )));
        }

        let is_reply = match note.reply_target() {
            Some(parent) => {
                if self.s.statuses.find_local(&parent).await?.is_none() {
                    return Ok(ProcessOutcome::skipped(format!("parent {parent} is not known")));
                }
                true
            }
            None => {
                let followed = match self.s.actors.find_cached(activity.actor()).await? {
                    Some(author) => {
                        self.s.ctx.stores.follows.count_local_followers(author.id).await? > 0
                    }
                    None => false,
                };
                if !followed {
                    return Ok(ProcessOutcome::skipped(format!(
                        "{} has no local followers",
                        activity.actor()
                    )));
                }
                false
            }
        };

        let note_id = note.id.to_string();
        let (status, created) = match self.s.statuses.store_note(note).await {
            Ok(stored) => stored,
            Err(e) => return unresolved(&note_id, e),
        };
        if !created {
            return Ok(ProcessOutcome::NoOp);
        }

        if !is_reply && status.visibility != Visibility::Direct {
            self.s
                .enqueue(Job::LocalFanout(FanoutJob { status_id: status.id }))
                .await?;
        }

        for tag in self.s.ctx.stores.statuses.tags(status.id).await? {
            let (TagKind::Mention, Some(actor_id)) = (tag.kind, tag.actor_id) else {
                continue;
            };
            let mentioned = self.s.ctx.stores.actors.find_actor(actor_id).await?;
            if mentioned.is_some_and(|a| a.is_local) {
                self.s
                    .notify(NotifyJob {
                        recipient_id: actor_id,
                        actor_id: status.author_id,
                        kind: NotificationKind::Mention,
                        status_id: Some(status.id),
                        context_status_id: Some(status.thread_root()),
                    })
                    .await?;
            }
        }

        info!(status = %status.uri, id = status.id, reply = is_reply, "Created remote status");
        Ok(ProcessOutcome::Applied)
    }
}
