//! Announce activity.

use activitypub_federation::kinds::activity::AnnounceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::objects::PUBLIC_COLLECTION;

/// `ActivityPub` Announce activity (a boost).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceActivity {
    #[serde(rename = "type")]
    pub kind: AnnounceType,
    pub id: Url,
    pub actor: Url,
    /// The status being boosted.
    pub object: Url,
    pub published: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
}

impl AnnounceActivity {
    /// Create a new Announce activity.
    #[must_use]
    pub const fn new(id: Url, actor: Url, object: Url, published: DateTime<Utc>) -> Self {
        Self {
            kind: AnnounceType::Announce,
            id,
            actor,
            object,
            published,
            to: Vec::new(),
            cc: Vec::new(),
        }
    }

    /// Address to everyone and copy the boosted status's author.
    #[must_use]
    pub fn public(mut self, author: &str) -> Self {
        self.to = vec![PUBLIC_COLLECTION.to_string()];
        self.cc = vec![author.to_string()];
        self
    }
}
