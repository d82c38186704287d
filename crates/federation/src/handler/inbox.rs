//! Inbox endpoints.
//!
//! Verification happens while the remote server waits: shape checks, domain
//! gate and signature. Everything else is queued and the request is answered
//! with `202 Accepted`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;
use tracing::{debug, info, warn};
use vitrine_common::{AppError, AppResult};

use crate::{
    activities::Activity,
    context::FederationContext,
    domain_gate::host_of,
    jobs::{InboxJob, Job},
    verifier::{InboundRequest, SignatureVerifier},
};

/// State shared by the federation endpoints.
#[derive(Clone)]
pub struct InboxState {
    pub ctx: Arc<FederationContext>,
    pub verifier: SignatureVerifier,
}

impl InboxState {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        Self {
            verifier: SignatureVerifier::new(ctx.clone()),
            ctx,
        }
    }
}

/// `POST /inbox`
pub async fn inbox_handler(
    State(state): State<InboxState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let path = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());
    receive(&state, path, &headers, &body).await
}

/// `POST /users/{username}/inbox`
pub async fn user_inbox_handler(
    State(state): State<InboxState>,
    Path(username): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    if state
        .ctx
        .stores
        .actors
        .find_local_actor(&username)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("user {username}")));
    }

    let path = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());
    receive(&state, path, &headers, &body).await
}

async fn receive(
    state: &InboxState,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> AppResult<StatusCode> {
    if !state.ctx.config.enabled {
        return Err(AppError::NotFound("federation is disabled".to_string()));
    }

    let raw: Value = serde_json::from_slice(body)?;
    let activity = Activity::parse(raw.clone()).map_err(|e| {
        warn!(error = %e, "Rejecting malformed activity");
        AppError::from(e)
    })?;

    let request = InboundRequest::new("POST", path, headers, body, raw);
    let signer = if activity.is_self_delete() {
        if state
            .ctx
            .stores
            .actors
            .find_actor_by_uri(activity.actor())
            .await?
            .is_none()
        {
            debug!(actor = %activity.actor(), "Delete of an actor never seen here");
            return Ok(StatusCode::ACCEPTED);
        }
        state.verifier.verify_local(&request).await?
    } else {
        state.verifier.verify(&request).await?
    };

    if host_of(&signer.uri) != host_of(activity.actor()) {
        warn!(signer = %signer.uri, actor = %activity.actor(), "Signer does not speak for actor");
        return Err(AppError::Unauthorized("signature invalid".to_string()));
    }

    info!(
        activity = %activity.id,
        kind = activity.kind.as_str(),
        actor = %activity.actor(),
        "Received activity"
    );
    state
        .ctx
        .queue
        .enqueue(
            Job::Inbox(InboxJob {
                activity: request.activity,
            }),
            state.ctx.max_attempts(),
        )
        .await?;

    Ok(StatusCode::ACCEPTED)
}
