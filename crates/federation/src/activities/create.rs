//! Create activity.

use activitypub_federation::kinds::activity::CreateType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::objects::ApNote;

/// `ActivityPub` Create activity.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivity {
    #[serde(rename = "type")]
    pub kind: CreateType,
    pub id: Url,
    pub actor: Url,
    pub object: ApNote,
    pub published: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
}

impl CreateActivity {
    /// Wrap a note, copying its addressing.
    #[must_use]
    pub fn new(id: Url, actor: Url, object: ApNote, published: DateTime<Utc>) -> Self {
        Self {
            kind: CreateType::Create,
            id,
            actor,
            to: object.to.clone(),
            cc: object.cc.clone(),
            object,
            published,
        }
    }
}
