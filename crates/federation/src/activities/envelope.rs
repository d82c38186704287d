//! Inbound activity envelope.
//!
//! Whatever shape a remote server sends, `actor` and `object` are flattened
//! here into lists so handlers never look at the wire form again.

use serde_json::Value;
use thiserror::Error;
use vitrine_common::AppError;

use crate::objects::{id_of, ids_of};

/// Activity types the processor understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    Create,
    Delete,
    Follow,
    Accept,
    Reject,
    Undo,
    Like,
    Announce,
    Unsupported(String),
}

impl ActivityType {
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "Create" => Self::Create,
            "Delete" => Self::Delete,
            "Follow" => Self::Follow,
            "Accept" => Self::Accept,
            "Reject" => Self::Reject,
            "Undo" => Self::Undo,
            "Like" => Self::Like,
            "Announce" => Self::Announce,
            other => Self::Unsupported(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "Create",
            Self::Delete => "Delete",
            Self::Follow => "Follow",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Undo => "Undo",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Unsupported(kind) => kind,
        }
    }
}

/// A referenced object, inline when the sender embedded it.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRef {
    pub id: String,
    pub inline: Option<Value>,
}

impl ObjectRef {
    fn from_value(value: &Value) -> Option<Self> {
        let id = id_of(value)?;
        let inline = value.is_object().then(|| value.clone());
        Some(Self { id, inline })
    }

    /// `type` of the inline body.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.inline.as_ref()?.get("type")?.as_str()
    }

    /// First actor of the inline body.
    #[must_use]
    pub fn actor(&self) -> Option<String> {
        self.inline
            .as_ref()
            .and_then(|body| body.get("actor"))
            .and_then(|actor| ids_of(actor).into_iter().next())
    }

    /// Inline `object` of an embedded activity, as an id.
    #[must_use]
    pub fn object_id(&self) -> Option<String> {
        self.inline
            .as_ref()
            .and_then(|body| body.get("object"))
            .and_then(id_of)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivityError {
    #[error("activity is not a JSON object")]
    NotAnObject,

    #[error("activity is missing `{0}`")]
    MissingField(&'static str),

    #[error("{activity} object must be a {expected}, got {found}")]
    WrongObjectType {
        activity: &'static str,
        expected: &'static str,
        found: String,
    },
}

impl From<ActivityError> for AppError {
    fn from(err: ActivityError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Normalized inbound activity.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityType,
    pub actors: Vec<String>,
    pub objects: Vec<ObjectRef>,
    pub raw: Value,
}

impl Activity {
    /// Normalize and validate an activity body.
    pub fn parse(raw: Value) -> Result<Self, ActivityError> {
        if !raw.is_object() {
            return Err(ActivityError::NotAnObject);
        }

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or(ActivityError::MissingField("id"))?
            .to_string();
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .map(ActivityType::parse)
            .ok_or(ActivityError::MissingField("type"))?;
        let actors = raw.get("actor").map(ids_of).unwrap_or_default();
        if actors.is_empty() {
            return Err(ActivityError::MissingField("actor"));
        }

        let objects: Vec<ObjectRef> = match raw.get("object") {
            Some(Value::Array(items)) => items.iter().filter_map(ObjectRef::from_value).collect(),
            Some(value) => ObjectRef::from_value(value).into_iter().collect(),
            None => Vec::new(),
        };

        let activity = Self {
            id,
            kind,
            actors,
            objects,
            raw,
        };
        activity.validate()?;
        Ok(activity)
    }

    fn validate(&self) -> Result<(), ActivityError> {
        if matches!(self.kind, ActivityType::Unsupported(_)) {
            return Ok(());
        }
        if self.objects.is_empty() {
            return Err(ActivityError::MissingField("object"));
        }

        if let ActivityType::Accept | ActivityType::Reject = self.kind {
            let activity = if self.kind == ActivityType::Accept { "Accept" } else { "Reject" };
            for object in &self.objects {
                match object.kind() {
                    None | Some("Follow") => {}
                    Some(found) => {
                        return Err(ActivityError::WrongObjectType {
                            activity,
                            expected: "Follow",
                            found: found.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// The acting actor. Batched actors share one signature, so the first
    /// one is authoritative.
    #[must_use]
    pub fn actor(&self) -> &str {
        self.actors.first().map_or("", String::as_str)
    }

    /// Whether this is an actor deleting themselves.
    #[must_use]
    pub fn is_self_delete(&self) -> bool {
        self.kind == ActivityType::Delete && self.objects.iter().any(|o| o.id == self.actor())
    }
}
