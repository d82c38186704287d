//! Actor document endpoint, so remote servers can fetch our public keys.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{error, info};
use vitrine_common::AppError;

use super::InboxState;
use crate::{activities::to_payload, objects::ApPerson};

/// `GET /users/{username}`
pub async fn actor_handler(
    State(state): State<InboxState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    info!(username = %username, "ActivityPub actor lookup");

    let actor = state
        .ctx
        .stores
        .actors
        .find_local_actor(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {username}")))?;

    let person = ApPerson::from_local(&actor).map_err(|e| {
        error!(actor = %actor.uri, error = %e, "Local actor has an invalid URI");
        AppError::Internal(format!("invalid actor URI: {e}"))
    })?;
    let document = to_payload(&person)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/activity+json; charset=utf-8")],
        Json(document),
    )
        .into_response())
}
