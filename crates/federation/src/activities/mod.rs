//! `ActivityPub` activity types.
//!
//! [`Activity`] is the normalized form of anything arriving at an inbox; the
//! typed structs are what this server sends.

#![allow(missing_docs)]

mod announce;
mod create;
mod delete;
mod envelope;
mod reference;
mod response;
mod undo;

pub use announce::AnnounceActivity;
pub use create::CreateActivity;
pub use delete::{DeleteActivity, Tombstone};
pub use envelope::{Activity, ActivityError, ActivityType, ObjectRef};
pub use reference::{FollowActivity, LikeActivity, ReferenceActivity};
pub use response::{AcceptActivity, FollowResponse, RejectActivity};
pub use undo::UndoActivity;

use serde::Serialize;
use serde_json::Value;

pub const ACTIVITY_STREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Serialize an outbound activity with its `@context`.
pub fn to_payload<T: Serialize>(activity: &T) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(activity)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "@context".to_string(),
            Value::String(ACTIVITY_STREAMS_CONTEXT.to_string()),
        );
    }
    Ok(value)
}
