//! `ActivityPub` Note object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use vitrine_db::entities::status::Visibility;

use super::{href_of, id_of, ids_of, one_or_many};

/// The special collection addressing everyone.
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Object types accepted as posts.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApObjectType {
    Note,
    Article,
    Page,
    Image,
}

/// `ActivityPub` Note object.
///
/// Remote servers disagree on the shape of several fields, so references
/// (`attributedTo`, `inReplyTo`, `url`) are kept as raw JSON and read through
/// the accessor methods.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApNote {
    #[serde(rename = "type")]
    pub kind: ApObjectType,
    pub id: Url,
    pub attributed_to: Value,

    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<bool>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<ApTag>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub attachment: Vec<ApAttachment>,
}

/// `ActivityPub` tag (mention or hashtag).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApTag {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `ActivityPub` attachment (file).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ApAttachment {
    #[must_use]
    pub fn href(&self) -> Option<String> {
        href_of(&self.url)
    }
}

impl ApNote {
    /// Create a new Note object.
    #[must_use]
    pub fn new(id: Url, attributed_to: &Url, content: String, published: DateTime<Utc>) -> Self {
        Self {
            kind: ApObjectType::Note,
            id,
            attributed_to: Value::String(attributed_to.to_string()),
            content,
            published: Some(published),
            url: None,
            to: Vec::new(),
            cc: Vec::new(),
            in_reply_to: None,
            summary: None,
            sensitive: None,
            tag: Vec::new(),
            attachment: Vec::new(),
        }
    }

    /// Author URI. The first entry wins when several are listed.
    #[must_use]
    pub fn author(&self) -> Option<String> {
        ids_of(&self.attributed_to).into_iter().next()
    }

    /// URI of the status this note replies to.
    #[must_use]
    pub fn reply_target(&self) -> Option<String> {
        self.in_reply_to.as_ref().and_then(id_of)
    }

    /// HTML URL, if it differs from `id`.
    #[must_use]
    pub fn alternate_url(&self) -> Option<String> {
        self.url
            .as_ref()
            .and_then(href_of)
            .filter(|url| url != self.id.as_str())
    }

    /// Whether the note's author lives on the same host as the note itself.
    #[must_use]
    pub fn origin_matches(&self) -> bool {
        let Some(author) = self.author().and_then(|a| Url::parse(&a).ok()) else {
            return false;
        };
        author.host_str().map(str::to_ascii_lowercase)
            == self.id.host_str().map(str::to_ascii_lowercase)
    }

    /// Derive visibility from addressing. Unlisted posts count as public.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        let addressed = || self.to.iter().chain(self.cc.iter());
        if addressed().any(|a| is_public(a)) {
            Visibility::Public
        } else if addressed().any(|a| a.ends_with("/followers")) {
            Visibility::Followers
        } else {
            Visibility::Direct
        }
    }

    /// Lowercased hashtag names without `#`.
    #[must_use]
    pub fn hashtags(&self) -> Vec<String> {
        self.tag
            .iter()
            .filter(|t| t.kind == "Hashtag")
            .filter_map(|t| t.name.as_deref())
            .map(|n| n.trim_start_matches('#').to_lowercase())
            .filter(|n| !n.is_empty())
            .collect()
    }

    /// Actor URIs mentioned by this note.
    #[must_use]
    pub fn mentions(&self) -> Vec<String> {
        self.tag
            .iter()
            .filter(|t| t.kind == "Mention")
            .filter_map(|t| t.href.clone())
            .collect()
    }

    /// Address to everyone, copying the author's followers.
    #[must_use]
    pub fn public(mut self, followers: Option<&str>) -> Self {
        self.to = vec![PUBLIC_COLLECTION.to_string()];
        self.cc = followers.map(String::from).into_iter().collect();
        self
    }
}

fn is_public(address: &str) -> bool {
    matches!(address, PUBLIC_COLLECTION | "as:Public" | "Public")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{path}")).unwrap()
    }

    #[test]
    fn test_note_serialization() {
        let note = ApNote::new(
            test_url("/statuses/123"),
            &test_url("/users/alice"),
            "Hello, world!".to_string(),
            Utc::now(),
        )
        .public(Some("https://example.com/users/alice/followers"));

        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"type\":\"Note\""));
        assert!(json.contains("\"attributedTo\":\"https://example.com/users/alice\""));
        assert!(json.contains("\"to\":[\"https://www.w3.org/ns/activitystreams#Public\"]"));
        assert!(!json.contains("inReplyTo"));
    }

    #[test]
    fn test_mastodon_shaped_note() {
        let json = r##"{
            "type": "Note",
            "id": "https://remote.example/users/alice/statuses/1",
            "url": "https://remote.example/@alice/1",
            "attributedTo": "https://remote.example/users/alice",
            "content": "<p>sunset #Photo</p>",
            "published": "2025-01-01T00:00:00Z",
            "to": "https://www.w3.org/ns/activitystreams#Public",
            "cc": ["https://remote.example/users/alice/followers"],
            "tag": {"type": "Hashtag", "name": "#Photo", "href": "https://remote.example/tags/photo"},
            "attachment": [{
                "type": "Document",
                "mediaType": "image/jpeg",
                "url": "https://remote.example/media/1.jpg",
                "name": "a sunset"
            }]
        }"##;

        let note: ApNote = serde_json::from_str(json).unwrap();
        assert_eq!(note.kind, ApObjectType::Note);
        assert_eq!(note.author().as_deref(), Some("https://remote.example/users/alice"));
        assert_eq!(note.alternate_url().as_deref(), Some("https://remote.example/@alice/1"));
        assert_eq!(note.visibility(), Visibility::Public);
        assert_eq!(note.hashtags(), vec!["photo"]);
        assert_eq!(note.attachment.len(), 1);
        assert_eq!(
            note.attachment[0].href().as_deref(),
            Some("https://remote.example/media/1.jpg")
        );
        assert!(note.origin_matches());
    }

    #[test]
    fn test_attributed_to_object_and_reply() {
        let json = r#"{
            "type": "Note",
            "id": "https://remote.example/notes/2",
            "attributedTo": [{"type": "Person", "id": "https://remote.example/users/bob"}],
            "inReplyTo": {"type": "Note", "id": "https://vitrine.example/statuses/9"},
            "to": ["https://remote.example/users/bob/followers"]
        }"#;

        let note: ApNote = serde_json::from_str(json).unwrap();
        assert_eq!(note.author().as_deref(), Some("https://remote.example/users/bob"));
        assert_eq!(
            note.reply_target().as_deref(),
            Some("https://vitrine.example/statuses/9")
        );
        assert_eq!(note.visibility(), Visibility::Followers);
        assert!(note.attachment.is_empty());
    }

    #[test]
    fn test_foreign_author_fails_origin_check() {
        let json = r#"{
            "type": "Note",
            "id": "https://evil.example/notes/3",
            "attributedTo": "https://remote.example/users/alice"
        }"#;

        let note: ApNote = serde_json::from_str(json).unwrap();
        assert!(!note.origin_matches());
    }

    #[test]
    fn test_direct_addressing() {
        let json = r#"{
            "type": "Note",
            "id": "https://remote.example/notes/4",
            "attributedTo": "https://remote.example/users/alice",
            "to": ["https://vitrine.example/users/bob"],
            "tag": [{"type": "Mention", "href": "https://vitrine.example/users/bob", "name": "@bob"}]
        }"#;

        let note: ApNote = serde_json::from_str(json).unwrap();
        assert_eq!(note.visibility(), Visibility::Direct);
        assert_eq!(note.mentions(), vec!["https://vitrine.example/users/bob"]);
    }
}
