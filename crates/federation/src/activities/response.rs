//! Accept and Reject of a Follow.

use activitypub_federation::kinds::activity::{AcceptType, RejectType};
use serde::{Deserialize, Serialize};
use url::Url;

use super::FollowActivity;

/// Answer to a follow request. The Follow is embedded whole, since some
/// servers match it by content rather than by id.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FollowResponse<K> {
    #[serde(rename = "type")]
    pub kind: K,
    pub id: Url,
    pub actor: Url,
    pub object: FollowActivity,
}

pub type AcceptActivity = FollowResponse<AcceptType>;
pub type RejectActivity = FollowResponse<RejectType>;

impl AcceptActivity {
    #[must_use]
    pub const fn accept(id: Url, actor: Url, follow: FollowActivity) -> Self {
        Self {
            kind: AcceptType::Accept,
            id,
            actor,
            object: follow,
        }
    }
}

impl RejectActivity {
    #[must_use]
    pub const fn reject(id: Url, actor: Url, follow: FollowActivity) -> Self {
        Self {
            kind: RejectType::Reject,
            id,
            actor,
            object: follow,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::activities::to_payload;

    #[test]
    fn test_reject_embeds_the_follow() {
        let url = |s: &str| Url::parse(s).unwrap();
        let follow = FollowActivity::follow(
            url("https://remote.example/follows/1"),
            url("https://remote.example/users/alice"),
            url("https://vitrine.example/users/bob"),
        );
        let reject = RejectActivity::reject(
            url("https://vitrine.example/activities/1"),
            url("https://vitrine.example/users/bob"),
            follow,
        );

        let json = to_payload(&reject).unwrap();
        assert_eq!(json["type"], "Reject");
        assert_eq!(json["object"]["type"], "Follow");
        assert_eq!(json["object"]["actor"], "https://remote.example/users/alice");
        assert_eq!(json["@context"], "https://www.w3.org/ns/activitystreams");
    }
}
