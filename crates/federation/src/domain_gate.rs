//! Domain block checks.
//!
//! Two scopes: instance-wide blocks kept by the admin, and personal blocks
//! kept by a local user. Matching is by full host, case-insensitively, with
//! no subdomain wildcarding.

use std::sync::Arc;

use url::Url;
use vitrine_common::AppResult;
use vitrine_db::{DomainBlockStore, entities::domain_block::BlockScope};

/// Lowercased host of a URI.
#[must_use]
pub fn host_of(uri: &str) -> Option<String> {
    Url::parse(uri)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

#[derive(Clone)]
pub struct DomainGate {
    blocks: Arc<dyn DomainBlockStore>,
}

impl DomainGate {
    #[must_use]
    pub fn new(blocks: Arc<dyn DomainBlockStore>) -> Self {
        Self { blocks }
    }

    /// Whether the instance blocks the host `uri` lives on.
    pub async fn is_instance_blocked(&self, uri: &str) -> AppResult<bool> {
        match host_of(uri) {
            Some(host) => self.blocks.is_domain_blocked(&host, BlockScope::Instance, None).await,
            None => Ok(false),
        }
    }

    /// Whether local user `owner_id` blocks the host `uri` lives on.
    pub async fn is_blocked_by_user(&self, uri: &str, owner_id: i64) -> AppResult<bool> {
        match host_of(uri) {
            Some(host) => {
                self.blocks
                    .is_domain_blocked(&host, BlockScope::User, Some(owner_id))
                    .await
            }
            None => Ok(false),
        }
    }
}
