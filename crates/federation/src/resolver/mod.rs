//! Remote actor and status resolution.
//!
//! Both resolvers follow the same pattern: look locally, fetch with the
//! system actor's signature if missing, validate, then upsert by URI.
//! Nothing is locked; two concurrent resolutions of the same URI both fetch
//! and the second write becomes an update.

mod actor;
mod status;

pub use actor::ActorResolver;
pub use status::StatusResolver;

use thiserror::Error;
use vitrine_common::AppError;

use crate::client::ApClientError;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// A remote status without a single image attachment. Expected and
    /// logged, never a system error.
    #[error("missing-attachments")]
    MissingAttachments,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid remote object: {0}")]
    Invalid(String),

    #[error("domain is blocked: {0}")]
    Blocked(String),

    #[error(transparent)]
    Transport(#[from] ApClientError),

    #[error(transparent)]
    Local(#[from] AppError),
}

impl ResolveError {
    /// Whether the failure says something about the remote object rather
    /// than about the network or this server.
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        match self {
            Self::MissingAttachments | Self::NotFound(_) | Self::Invalid(_) | Self::Blocked(_) => {
                true
            }
            Self::Transport(e) => e.is_permanent(),
            Self::Local(_) => false,
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Local(e) => e,
            ResolveError::Transport(e) => e.into(),
            ResolveError::NotFound(e) => Self::NotFound(e),
            ResolveError::Blocked(e) => Self::Forbidden(e),
            other @ (ResolveError::MissingAttachments | ResolveError::Invalid(_)) => {
                Self::BadRequest(other.to_string())
            }
        }
    }
}

impl From<vitrine_common::SignatureError> for ResolveError {
    fn from(err: vitrine_common::SignatureError) -> Self {
        Self::Local(err.into())
    }
}
