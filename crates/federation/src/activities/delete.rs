//! Delete activity.

use activitypub_federation::kinds::{activity::DeleteType, object::TombstoneType};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::objects::PUBLIC_COLLECTION;

/// Placeholder left where a deleted object used to be.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tombstone {
    #[serde(rename = "type")]
    pub kind: TombstoneType,
    pub id: Url,
}

/// `ActivityPub` Delete activity.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteActivity {
    #[serde(rename = "type")]
    pub kind: DeleteType,
    pub id: Url,
    pub actor: Url,
    pub object: Tombstone,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
}

impl DeleteActivity {
    /// Delete `object`, addressed publicly.
    #[must_use]
    pub fn new(id: Url, actor: Url, object: Url) -> Self {
        Self {
            kind: DeleteType::Delete,
            id,
            actor,
            object: Tombstone {
                kind: TombstoneType::Tombstone,
                id: object,
            },
            to: vec![PUBLIC_COLLECTION.to_string()],
        }
    }
}
