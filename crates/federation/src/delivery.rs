//! Delivery worker.
//!
//! Executes one queued [`DeliverJob`]: signs the activity with the sending
//! actor's key and POSTs it to the inbox. Failures surface as errors so the
//! queue can retry them, except the ones retrying cannot fix.

#![allow(missing_docs)]

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, warn};
use url::Url;
use vitrine_common::{AppError, AppResult};

use crate::{
    context::FederationContext, domain_gate::DomainGate, jobs::DeliverJob, signature::HttpSigner,
};

/// What became of a delivery that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Nothing was sent and nothing will be; the job is done.
    Dropped,
}

#[derive(Clone)]
pub struct DeliveryExecutor {
    ctx: Arc<FederationContext>,
    gate: DomainGate,
}

impl DeliveryExecutor {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        let gate = DomainGate::new(ctx.stores.domain_blocks.clone());
        Self { ctx, gate }
    }

    pub async fn execute(&self, job: &DeliverJob) -> AppResult<DeliveryOutcome> {
        let Ok(inbox) = Url::parse(&job.inbox) else {
            warn!(inbox = %job.inbox, "Dropping delivery to unparsable inbox");
            return Ok(DeliveryOutcome::Dropped);
        };

        // Blocks added after the job was queued still apply.
        if self.gate.is_instance_blocked(&job.inbox).await? {
            info!(inbox = %job.inbox, "Dropping delivery to blocked domain");
            return Ok(DeliveryOutcome::Dropped);
        }

        let Some(actor) = self.ctx.stores.actors.find_actor(job.signing_actor_id).await? else {
            warn!(actor_id = job.signing_actor_id, "Signing actor is gone, dropping delivery");
            return Ok(DeliveryOutcome::Dropped);
        };
        let Some(signer) = HttpSigner::for_actor(&actor)? else {
            warn!(actor = %actor.uri, "Actor has no private key, abandoning delivery");
            return Ok(DeliveryOutcome::Dropped);
        };

        let body = Bytes::from(serde_json::to_vec(&job.activity).map_err(|e| {
            AppError::Internal(format!("failed to serialize activity: {e}"))
        })?);

        match self.ctx.transport.post_activity(&inbox, body, &signer).await {
            Ok(()) => {
                info!(inbox = %inbox, actor = %actor.uri, "Delivered activity");
                Ok(DeliveryOutcome::Delivered)
            }
            Err(e) if e.is_gone() => {
                warn!(inbox = %inbox, "Inbox is gone, dropping delivery");
                Ok(DeliveryOutcome::Dropped)
            }
            Err(e) => {
                error!(inbox = %inbox, error = %e, "Delivery failed");
                Err(AppError::Federation(format!("delivery to {inbox} failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;
    use chrono::Utc;
    use serde_json::json;
    use vitrine_db::entities::domain_block::{self, BlockScope};

    const INBOX: &str = "https://remote.example/inbox";

    fn job(signing_actor_id: i64) -> DeliverJob {
        DeliverJob {
            signing_actor_id,
            inbox: INBOX.to_string(),
            activity: json!({"id": "https://vitrine.example/activities/1", "type": "Like"}),
        }
    }

    #[tokio::test]
    async fn test_delivers_signed_activity() {
        let t = TestContext::with_system_actor().await;
        t.seed_local_actor(10, "bob").await;

        let outcome = DeliveryExecutor::new(t.ctx.clone()).execute(&job(10)).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        let posted = t.transport.posted().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, INBOX);
        assert_eq!(posted[0].1["type"], "Like");
    }

    #[tokio::test]
    async fn test_gone_is_dropped() {
        let t = TestContext::with_system_actor().await;
        t.seed_local_actor(10, "bob").await;
        t.transport.fail_posts_with(410).await;

        let outcome = DeliveryExecutor::new(t.ctx.clone()).execute(&job(10)).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let t = TestContext::with_system_actor().await;
        t.seed_local_actor(10, "bob").await;
        t.transport.fail_posts_with(503).await;

        let err = DeliveryExecutor::new(t.ctx.clone()).execute(&job(10)).await.unwrap_err();
        assert!(matches!(err, AppError::Federation(_)));
    }

    #[tokio::test]
    async fn test_missing_signer_is_dropped() {
        let t = TestContext::with_system_actor().await;

        let outcome = DeliveryExecutor::new(t.ctx.clone()).execute(&job(99)).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Dropped);
        assert!(t.transport.posted().await.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_after_enqueue_is_dropped() {
        let t = TestContext::with_system_actor().await;
        t.seed_local_actor(10, "bob").await;
        t.store
            .add_domain_block(domain_block::Model {
                id: 1,
                domain: "remote.example".to_string(),
                scope: BlockScope::Instance,
                owner_id: None,
                created_at: Utc::now().into(),
            })
            .await;

        let outcome = DeliveryExecutor::new(t.ctx.clone()).execute(&job(10)).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Dropped);
        assert!(t.transport.posted().await.is_empty());
    }
}
