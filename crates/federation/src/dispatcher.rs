//! Outbound delivery dispatcher.
//!
//! Turns local state changes into signed activities and enqueues one
//! [`DeliverJob`] per destination inbox. Nothing here touches the network;
//! the delivery worker does.

#![allow(missing_docs)]

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;
use vitrine_common::{AppError, AppResult};
use vitrine_db::entities::{
    actor, favourite, follow,
    status::{self, Visibility},
    status_tag::TagKind,
};

use crate::{
    activities::{
        AcceptActivity, AnnounceActivity, CreateActivity, DeleteActivity, FollowActivity,
        LikeActivity, RejectActivity, UndoActivity, to_payload,
    },
    context::FederationContext,
    domain_gate::DomainGate,
    jobs::{DeliverJob, FanoutJob, Job},
    objects::{ApAttachment, ApNote, ApTag},
};

/// Distinct delivery inboxes for `actors`, preferring shared inboxes.
/// First occurrence wins, so the result follows the input order.
#[must_use]
pub fn group_by_shared_inbox(actors: &[actor::Model]) -> Vec<String> {
    let mut seen = HashSet::new();
    actors
        .iter()
        .map(actor::Model::preferred_inbox)
        .filter(|inbox| seen.insert(*inbox))
        .map(String::from)
        .collect()
}

fn parse_url(uri: &str) -> AppResult<Url> {
    Url::parse(uri).map_err(|e| AppError::Internal(format!("invalid URI {uri}: {e}")))
}

fn payload<T: Serialize>(activity: &T) -> AppResult<Value> {
    to_payload(activity).map_err(|e| AppError::Internal(format!("failed to serialize activity: {e}")))
}

/// Builds outbound activities and queues their delivery.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<FederationContext>,
    gate: DomainGate,
}

impl Dispatcher {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        let gate = DomainGate::new(ctx.stores.domain_blocks.clone());
        Self { ctx, gate }
    }

    /// Publish a new local status. Returns the number of deliveries queued.
    ///
    /// Top-level public and followers-only posts also go to local home
    /// timelines.
    pub async fn publish_status(&self, status_id: i64) -> AppResult<usize> {
        let stores = &self.ctx.stores;
        let status = stores
            .statuses
            .find_status(status_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("status {status_id}")))?;
        let Some(author) = self.local_author(&status).await? else {
            return Ok(0);
        };

        if status.reply_to_id.is_none() && status.visibility != Visibility::Direct {
            self.enqueue(Job::LocalFanout(FanoutJob { status_id: status.id }))
                .await?;
        }
        if status.is_reblog() {
            return self.deliver_boost(&status).await;
        }
        if !can_sign(&author) {
            return Ok(0);
        }

        let note = self.note_for(&status, &author).await?;
        let activity = CreateActivity::new(
            parse_url(&format!("{}/activity", status.uri))?,
            parse_url(&author.uri)?,
            note,
            status.created_at.with_timezone(&Utc),
        );
        let inboxes = self.destinations(&status, &author).await?;
        self.deliver(&author, &payload(&activity)?, inboxes).await
    }

    /// Announce the deletion of a local status. Call this before the row is
    /// removed, since destinations are derived from it.
    pub async fn publish_delete(&self, status: &status::Model) -> AppResult<usize> {
        if status.is_reblog() {
            return self.deliver_unboost(status).await;
        }
        let Some(author) = self.local_author(status).await? else {
            return Ok(0);
        };
        if !can_sign(&author) {
            return Ok(0);
        }

        let activity = DeleteActivity::new(
            parse_url(&format!("{}#delete", status.uri))?,
            parse_url(&author.uri)?,
            parse_url(&status.uri)?,
        );
        let inboxes = self.destinations(status, &author).await?;
        self.deliver(&author, &payload(&activity)?, inboxes).await
    }

    pub async fn deliver_follow(&self, follow: &follow::Model) -> AppResult<usize> {
        let Some((follower, target)) = self.follow_sides(follow, Side::Source).await? else {
            return Ok(0);
        };
        let activity = self.follow_activity(follow, &follower, &target)?;
        self.deliver(&follower, &payload(&activity)?, vec![target.inbox_url.clone()])
            .await
    }

    pub async fn deliver_unfollow(&self, follow: &follow::Model) -> AppResult<usize> {
        let Some((follower, target)) = self.follow_sides(follow, Side::Source).await? else {
            return Ok(0);
        };
        let inner = self.follow_activity(follow, &follower, &target)?;
        let activity = UndoActivity::undoing(&inner.id, inner.actor.clone(), payload(&inner)?);
        self.deliver(&follower, &payload(&activity)?, vec![target.inbox_url.clone()])
            .await
    }

    /// Tell a remote follower their follow of a local actor was accepted.
    pub async fn deliver_accept(&self, follow: &follow::Model) -> AppResult<usize> {
        let Some((follower, target)) = self.follow_sides(follow, Side::Target).await? else {
            return Ok(0);
        };
        let inner = self.follow_activity(follow, &follower, &target)?;
        let activity = AcceptActivity::accept(
            parse_url(&self.ctx.new_activity_uri())?,
            parse_url(&target.uri)?,
            inner,
        );
        self.deliver(&target, &payload(&activity)?, vec![follower.inbox_url.clone()])
            .await
    }

    pub async fn deliver_reject(&self, follow: &follow::Model) -> AppResult<usize> {
        let Some((follower, target)) = self.follow_sides(follow, Side::Target).await? else {
            return Ok(0);
        };
        let inner = self.follow_activity(follow, &follower, &target)?;
        let activity = RejectActivity::reject(
            parse_url(&self.ctx.new_activity_uri())?,
            parse_url(&target.uri)?,
            inner,
        );
        self.deliver(&target, &payload(&activity)?, vec![follower.inbox_url.clone()])
            .await
    }

    /// A local actor approves a pending follow request.
    pub async fn approve_follow_request(&self, follow: &follow::Model) -> AppResult<bool> {
        let stores = &self.ctx.stores;
        if !stores.follows.approve_follow(follow.id).await? {
            return Ok(false);
        }
        stores.actors.recount_follows(follow.source_id).await?;
        stores.actors.recount_follows(follow.target_id).await?;
        self.deliver_accept(follow).await?;
        Ok(true)
    }

    /// A local actor turns down a follow request, or removes a follower.
    pub async fn reject_follow_request(&self, follow: &follow::Model) -> AppResult<bool> {
        let stores = &self.ctx.stores;
        if stores
            .follows
            .find_follow(follow.source_id, follow.target_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }
        stores.follows.delete_follow(follow.id).await?;
        stores.actors.recount_follows(follow.source_id).await?;
        stores.actors.recount_follows(follow.target_id).await?;
        self.deliver_reject(follow).await?;
        Ok(true)
    }

    pub async fn deliver_like(&self, favourite: &favourite::Model) -> AppResult<usize> {
        let Some((liker, status, owner)) = self.favourite_sides(favourite).await? else {
            return Ok(0);
        };
        let activity = self.like_activity(favourite, &liker, &status)?;
        self.deliver(&liker, &payload(&activity)?, vec![owner.preferred_inbox().to_string()])
            .await
    }

    pub async fn deliver_unlike(&self, favourite: &favourite::Model) -> AppResult<usize> {
        let Some((liker, status, owner)) = self.favourite_sides(favourite).await? else {
            return Ok(0);
        };
        let inner = self.like_activity(favourite, &liker, &status)?;
        let activity = UndoActivity::undoing(&inner.id, inner.actor.clone(), payload(&inner)?);
        self.deliver(&liker, &payload(&activity)?, vec![owner.preferred_inbox().to_string()])
            .await
    }

    /// Announce a local boost to the boosted status's owner.
    pub async fn deliver_boost(&self, boost: &status::Model) -> AppResult<usize> {
        let Some((booster, original, owner)) = self.boost_sides(boost).await? else {
            return Ok(0);
        };
        let activity = announce_activity(boost, &booster, &original, &owner)?;
        self.deliver(&booster, &payload(&activity)?, vec![owner.preferred_inbox().to_string()])
            .await
    }

    pub async fn deliver_unboost(&self, boost: &status::Model) -> AppResult<usize> {
        let Some((booster, original, owner)) = self.boost_sides(boost).await? else {
            return Ok(0);
        };
        let inner = announce_activity(boost, &booster, &original, &owner)?;
        let activity = UndoActivity::undoing(&inner.id, inner.actor.clone(), payload(&inner)?);
        self.deliver(&booster, &payload(&activity)?, vec![owner.preferred_inbox().to_string()])
            .await
    }

    /// Remote inboxes a status goes to.
    ///
    /// Replies follow their thread root instead of fanning out to the
    /// author's own followers.
    async fn destinations(&self, status: &status::Model, author: &actor::Model) -> AppResult<Vec<String>> {
        let stores = &self.ctx.stores;

        if status.visibility == Visibility::Direct {
            let mut inboxes = Vec::new();
            for actor in self.mentioned(status).await? {
                if !actor.is_local {
                    inboxes.push(actor.inbox_url);
                }
            }
            return Ok(inboxes);
        }

        if status.reply_to_id.is_some() {
            let Some(root) = stores.statuses.find_status(status.thread_root()).await? else {
                debug!(status = %status.uri, "Thread root is gone, reply stays local");
                return Ok(Vec::new());
            };
            let Some(root_author) = stores.actors.find_actor(root.author_id).await? else {
                return Ok(Vec::new());
            };
            if root_author.is_local {
                let followers = stores.follows.remote_followers(root_author.id).await?;
                return Ok(group_by_shared_inbox(&followers));
            }
            return Ok(vec![root_author.preferred_inbox().to_string()]);
        }

        let followers = stores.follows.remote_followers(author.id).await?;
        Ok(group_by_shared_inbox(&followers))
    }

    async fn mentioned(&self, status: &status::Model) -> AppResult<Vec<actor::Model>> {
        let mut actors = Vec::new();
        for tag in self.ctx.stores.statuses.tags(status.id).await? {
            if let (TagKind::Mention, Some(id)) = (tag.kind, tag.actor_id)
                && let Some(actor) = self.ctx.stores.actors.find_actor(id).await?
            {
                actors.push(actor);
            }
        }
        Ok(actors)
    }

    /// Note document for a local status.
    async fn note_for(&self, status: &status::Model, author: &actor::Model) -> AppResult<ApNote> {
        let stores = &self.ctx.stores;
        let mut note = ApNote::new(
            parse_url(&status.uri)?,
            &parse_url(&author.uri)?,
            status.content.clone(),
            status.created_at.with_timezone(&Utc),
        );
        note.summary.clone_from(&status.content_warning);
        note.sensitive = Some(status.sensitive);

        if let Some(parent_id) = status.reply_to_id
            && let Some(parent) = stores.statuses.find_status(parent_id).await?
        {
            note.in_reply_to = Some(Value::String(parent.uri));
        }

        let mut mentions = Vec::new();
        for tag in stores.statuses.tags(status.id).await? {
            match tag.kind {
                TagKind::Hashtag => note.tag.push(ApTag {
                    kind: "Hashtag".to_string(),
                    href: Some(format!("{}/tags/{}", self.ctx.base_url(), tag.name)),
                    name: Some(format!("#{}", tag.name)),
                }),
                TagKind::Mention => {
                    mentions.push(tag.name.clone());
                    note.tag.push(ApTag {
                        kind: "Mention".to_string(),
                        href: Some(tag.name),
                        name: None,
                    });
                }
            }
        }

        note.attachment = stores
            .statuses
            .attachments(status.id)
            .await?
            .into_iter()
            .map(|a| ApAttachment {
                kind: "Document".to_string(),
                url: Value::String(a.remote_url),
                media_type: a.media_type,
                name: a.description,
            })
            .collect();

        Ok(match status.visibility {
            Visibility::Public => {
                let mut note = note.public(author.followers_url.as_deref());
                note.cc.extend(mentions);
                note
            }
            Visibility::Followers => {
                note.to = author.followers_url.clone().into_iter().collect();
                note.cc = mentions;
                note
            }
            Visibility::Direct => {
                note.to = mentions;
                note
            }
        })
    }

    fn follow_activity(
        &self,
        follow: &follow::Model,
        follower: &actor::Model,
        target: &actor::Model,
    ) -> AppResult<FollowActivity> {
        let id = follow
            .activity_uri
            .clone()
            .unwrap_or_else(|| format!("{}/follows/{}", self.ctx.base_url(), follow.id));
        Ok(FollowActivity::follow(
            parse_url(&id)?,
            parse_url(&follower.uri)?,
            parse_url(&target.uri)?,
        ))
    }

    fn like_activity(
        &self,
        favourite: &favourite::Model,
        liker: &actor::Model,
        status: &status::Model,
    ) -> AppResult<LikeActivity> {
        let id = favourite
            .activity_uri
            .clone()
            .unwrap_or_else(|| format!("{}/likes/{}", self.ctx.base_url(), favourite.id));
        Ok(LikeActivity::like(
            parse_url(&id)?,
            parse_url(&liker.uri)?,
            parse_url(&status.uri)?,
        ))
    }

    async fn local_author(&self, status: &status::Model) -> AppResult<Option<actor::Model>> {
        if !status.is_local {
            warn!(status = %status.uri, "Refusing to publish a remote status");
            return Ok(None);
        }
        let author = self.ctx.stores.actors.find_actor(status.author_id).await?;
        Ok(author.filter(|a| a.is_local))
    }

    /// Both ends of a follow, when the `local` side is local and the other
    /// remote. Anything else needs no delivery.
    async fn follow_sides(
        &self,
        follow: &follow::Model,
        local: Side,
    ) -> AppResult<Option<(actor::Model, actor::Model)>> {
        let actors = &self.ctx.stores.actors;
        let (Some(source), Some(target)) = (
            actors.find_actor(follow.source_id).await?,
            actors.find_actor(follow.target_id).await?,
        ) else {
            return Ok(None);
        };

        let (local_actor, remote_actor) = match local {
            Side::Source => (&source, &target),
            Side::Target => (&target, &source),
        };
        if !local_actor.is_local || remote_actor.is_local || !can_sign(local_actor) {
            return Ok(None);
        }
        Ok(Some((source, target)))
    }

    async fn favourite_sides(
        &self,
        favourite: &favourite::Model,
    ) -> AppResult<Option<(actor::Model, status::Model, actor::Model)>> {
        let stores = &self.ctx.stores;
        let Some(liker) = stores.actors.find_actor(favourite.actor_id).await? else {
            return Ok(None);
        };
        let Some(status) = stores.statuses.find_status(favourite.status_id).await? else {
            return Ok(None);
        };
        let Some(owner) = stores.actors.find_actor(status.author_id).await? else {
            return Ok(None);
        };
        if !liker.is_local || owner.is_local || !can_sign(&liker) {
            return Ok(None);
        }
        Ok(Some((liker, status, owner)))
    }

    async fn boost_sides(
        &self,
        boost: &status::Model,
    ) -> AppResult<Option<(actor::Model, status::Model, actor::Model)>> {
        let stores = &self.ctx.stores;
        let Some(original_id) = boost.reblog_of_id else {
            return Ok(None);
        };
        let Some(booster) = stores.actors.find_actor(boost.author_id).await? else {
            return Ok(None);
        };
        let Some(original) = stores.statuses.find_status(original_id).await? else {
            return Ok(None);
        };
        let Some(owner) = stores.actors.find_actor(original.author_id).await? else {
            return Ok(None);
        };
        if !booster.is_local || owner.is_local || !can_sign(&booster) {
            return Ok(None);
        }
        Ok(Some((booster, original, owner)))
    }

    async fn enqueue(&self, job: Job) -> AppResult<()> {
        self.ctx.queue.enqueue(job, self.ctx.max_attempts()).await
    }

    /// Queue `activity` for every distinct, deliverable inbox.
    async fn deliver(&self, signer: &actor::Model, activity: &Value, inboxes: Vec<String>) -> AppResult<usize> {
        let mut seen = HashSet::new();
        let mut queued = 0;

        for inbox in inboxes {
            if !seen.insert(inbox.clone()) {
                continue;
            }
            if self.ctx.is_local_uri(&inbox) {
                continue;
            }
            if self.gate.is_instance_blocked(&inbox).await? {
                debug!(inbox = %inbox, "Not delivering to blocked domain");
                continue;
            }

            self.enqueue(Job::Deliver(DeliverJob {
                signing_actor_id: signer.id,
                inbox,
                activity: activity.clone(),
            }))
            .await?;
            queued += 1;
        }

        let kind = activity
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        info!(
            actor = %signer.uri,
            kind = %kind,
            deliveries = queued,
            "Queued activity"
        );
        Ok(queued)
    }
}

#[derive(Clone, Copy)]
enum Side {
    Source,
    Target,
}

fn can_sign(actor: &actor::Model) -> bool {
    if actor.private_key_pem.is_some() {
        return true;
    }
    warn!(actor = %actor.uri, "Local actor has no private key, abandoning delivery");
    false
}

fn announce_activity(
    boost: &status::Model,
    booster: &actor::Model,
    original: &status::Model,
    owner: &actor::Model,
) -> AppResult<AnnounceActivity> {
    Ok(AnnounceActivity::new(
        parse_url(&format!("{}/activity", boost.uri))?,
        parse_url(&booster.uri)?,
        parse_url(&original.uri)?,
        boost.created_at.with_timezone(&Utc),
    )
    .public(&owner.uri))
}
