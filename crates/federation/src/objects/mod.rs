//! `ActivityPub` object types.

#![allow(missing_docs)]

mod note;
mod person;

pub use note::{ApAttachment, ApNote, ApObjectType, ApTag, PUBLIC_COLLECTION};
pub use person::{ApEndpoints, ApImage, ApPerson, ApPublicKey};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Id of a reference that may be a bare URI or an object carrying `id`.
#[must_use]
pub fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

/// Ids of a field that may be one reference or an array of them.
#[must_use]
pub fn ids_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(id_of).collect(),
        other => id_of(other).into_iter().collect(),
    }
}

/// URL of a link-ish value: a string, an object with `href` or `url`, or an
/// array whose first usable entry wins.
#[must_use]
pub fn href_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("href")
            .or_else(|| map.get("url"))
            .and_then(href_of),
        Value::Array(items) => items.iter().find_map(href_of),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Accept `null`, a single value or an array for a `Vec` field.
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    })
}
