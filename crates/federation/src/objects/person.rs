//! `ActivityPub` actor document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use vitrine_db::entities::actor;

use super::href_of;

/// `ActivityPub` actor (Person, Service, Group, ...).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApPerson {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Url,
    pub preferred_username: String,
    pub inbox: Url,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox: Option<Url>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<Url>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<ApEndpoints>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<ApPublicKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manually_approves_followers: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_inbox: Option<Url>,
}

/// `ActivityPub` Image object.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApImage {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// `ActivityPub` public key.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApPublicKey {
    pub id: String,
    pub owner: Url,
    pub public_key_pem: String,
}

impl ApPerson {
    /// Actor document for a local account.
    pub fn from_local(actor: &actor::Model) -> Result<Self, url::ParseError> {
        let id = Url::parse(&actor.uri)?;
        Ok(Self {
            kind: "Person".to_string(),
            preferred_username: actor.username.clone(),
            inbox: Url::parse(&actor.inbox_url)?,
            outbox: Some(Url::parse(&format!("{}/outbox", actor.uri))?),
            followers: actor.followers_url.as_deref().map(Url::parse).transpose()?,
            url: actor.profile_url.clone().map(Value::String),
            name: actor.display_name.clone(),
            summary: actor.summary.clone(),
            icon: actor.avatar_url.as_ref().map(|url| image_value(url)),
            image: actor.header_url.as_ref().map(|url| image_value(url)),
            endpoints: Some(ApEndpoints {
                shared_inbox: actor.shared_inbox_url.as_deref().map(Url::parse).transpose()?,
            }),
            public_key: actor.public_key_pem.clone().map(|pem| ApPublicKey {
                id: actor.key_id(),
                owner: id.clone(),
                public_key_pem: pem,
            }),
            manually_approves_followers: Some(actor.manually_approves_followers),
            id,
        })
    }

    #[must_use]
    pub fn shared_inbox(&self) -> Option<&Url> {
        self.endpoints.as_ref().and_then(|e| e.shared_inbox.as_ref())
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<String> {
        self.icon.as_ref().and_then(href_of)
    }

    #[must_use]
    pub fn header_url(&self) -> Option<String> {
        self.image.as_ref().and_then(href_of)
    }

    #[must_use]
    pub fn profile_url(&self) -> Option<String> {
        self.url.as_ref().and_then(href_of)
    }

    /// PEM of the key, only if it is declared as owned by this actor.
    #[must_use]
    pub fn public_key_pem(&self) -> Option<&str> {
        self.public_key
            .as_ref()
            .filter(|key| key.owner == self.id)
            .map(|key| key.public_key_pem.as_str())
    }
}

fn image_value(url: &str) -> Value {
    serde_json::to_value(ApImage {
        kind: "Image".to_string(),
        url: url.to_string(),
    })
    .unwrap_or(Value::Null)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vitrine_db::test_utils;

    #[test]
    fn test_parse_remote_person() {
        let json = r#"{
            "@context": ["https://www.w3.org/ns/activitystreams"],
            "type": "Person",
            "id": "https://remote.example/users/alice",
            "preferredUsername": "alice",
            "inbox": "https://remote.example/users/alice/inbox",
            "followers": "https://remote.example/users/alice/followers",
            "url": "https://remote.example/@alice",
            "icon": {"type": "Image", "url": "https://remote.example/a.png"},
            "endpoints": {"sharedInbox": "https://remote.example/inbox"},
            "publicKey": {
                "id": "https://remote.example/users/alice#main-key",
                "owner": "https://remote.example/users/alice",
                "publicKeyPem": "-----BEGIN PUBLIC KEY-----"
            },
            "manuallyApprovesFollowers": true
        }"#;

        let person: ApPerson = serde_json::from_str(json).unwrap();
        assert_eq!(person.preferred_username, "alice");
        assert_eq!(person.shared_inbox().unwrap().as_str(), "https://remote.example/inbox");
        assert_eq!(person.avatar_url().as_deref(), Some("https://remote.example/a.png"));
        assert_eq!(person.profile_url().as_deref(), Some("https://remote.example/@alice"));
        assert!(person.public_key_pem().is_some());
        assert_eq!(person.manually_approves_followers, Some(true));
    }

    #[test]
    fn test_key_owned_by_someone_else_is_ignored() {
        let json = r#"{
            "type": "Service",
            "id": "https://remote.example/actor",
            "preferredUsername": "relay",
            "inbox": "https://remote.example/actor/inbox",
            "publicKey": {
                "id": "https://other.example/users/mallory#main-key",
                "owner": "https://other.example/users/mallory",
                "publicKeyPem": "-----BEGIN PUBLIC KEY-----"
            }
        }"#;

        let person: ApPerson = serde_json::from_str(json).unwrap();
        assert!(person.public_key_pem().is_none());
    }

    #[test]
    fn test_local_actor_document() {
        let mut actor = test_utils::local_actor(1, "bob", "https://vitrine.example");
        actor.public_key_pem = Some("PEM".to_string());

        let person = ApPerson::from_local(&actor).unwrap();
        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json["publicKey"]["id"], "https://vitrine.example/users/bob#main-key");
        assert_eq!(json["endpoints"]["sharedInbox"], "https://vitrine.example/inbox");
        assert_eq!(json["preferredUsername"], "bob");
    }
}
