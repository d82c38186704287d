//! Undo of a Follow, Like or Announce.

use activitypub_federation::kinds::activity::UndoType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UndoActivity {
    #[serde(rename = "type")]
    pub kind: UndoType,
    pub id: Url,
    pub actor: Url,
    /// The activity being undone, embedded whole.
    pub object: Value,
}

impl UndoActivity {
    #[must_use]
    pub const fn new(id: Url, actor: Url, object: Value) -> Self {
        Self {
            kind: UndoType::Undo,
            id,
            actor,
            object,
        }
    }

    /// Undo the activity `undone` whose id is `undone_id`. The Undo's id is
    /// that id with an `#undo` fragment.
    #[must_use]
    pub fn undoing(undone_id: &Url, actor: Url, undone: Value) -> Self {
        let mut id = undone_id.clone();
        id.set_fragment(Some("undo"));
        Self::new(id, actor, undone)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_id_derives_from_the_undone_activity() {
        let like = Url::parse("https://vitrine.example/likes/7").unwrap();
        let actor = Url::parse("https://vitrine.example/users/bob").unwrap();

        let undo = UndoActivity::undoing(&like, actor, serde_json::json!({"type": "Like"}));
        assert_eq!(undo.id.as_str(), "https://vitrine.example/likes/7#undo");
        assert_eq!(undo.object["type"], "Like");
    }
}
