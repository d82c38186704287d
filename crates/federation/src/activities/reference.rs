//! Follow and Like: activities whose object is a bare URI.

use activitypub_federation::kinds::activity::{FollowType, LikeType};
use serde::{Deserialize, Serialize};
use url::Url;

/// An activity pointing at one object by id.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReferenceActivity<K> {
    #[serde(rename = "type")]
    pub kind: K,
    pub id: Url,
    pub actor: Url,
    pub object: Url,
}

/// `actor` follows the actor `object`.
pub type FollowActivity = ReferenceActivity<FollowType>;
/// `actor` favourites the status `object`.
pub type LikeActivity = ReferenceActivity<LikeType>;

impl FollowActivity {
    #[must_use]
    pub const fn follow(id: Url, actor: Url, object: Url) -> Self {
        Self {
            kind: FollowType::Follow,
            id,
            actor,
            object,
        }
    }
}

impl LikeActivity {
    #[must_use]
    pub const fn like(id: Url, actor: Url, object: Url) -> Self {
        Self {
            kind: LikeType::Like,
            id,
            actor,
            object,
        }
    }
}
