//! Domain block repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use vitrine_common::AppResult;

use super::db_err;
use crate::entities::{DomainBlock, domain_block, domain_block::BlockScope};
use crate::store::DomainBlockStore;

#[derive(Clone)]
pub struct DomainBlockRepository {
    db: Arc<DatabaseConnection>,
}

impl DomainBlockRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DomainBlockStore for DomainBlockRepository {
    async fn is_domain_blocked(
        &self,
        domain: &str,
        scope: BlockScope,
        owner_id: Option<i64>,
    ) -> AppResult<bool> {
        // Domains are stored lowercased.
        let mut query = DomainBlock::find()
            .filter(domain_block::Column::Domain.eq(domain.to_ascii_lowercase()))
            .filter(domain_block::Column::Scope.eq(scope));

        if scope == BlockScope::User {
            query = match owner_id {
                Some(owner_id) => query.filter(domain_block::Column::OwnerId.eq(owner_id)),
                None => return Ok(false),
            };
        }

        let count = query.count(self.db.as_ref()).await.map_err(db_err)?;
        Ok(count > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_is_domain_blocked() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1))
                }]])
                .into_connection(),
        );

        let repo = DomainBlockRepository::new(db);
        assert!(
            repo.is_domain_blocked("Evil.Example", BlockScope::Instance, None)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_user_scope_without_owner_is_never_blocked() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = DomainBlockRepository::new(db);
        assert!(
            !repo
                .is_domain_blocked("evil.example", BlockScope::User, None)
                .await
                .unwrap()
        );
    }
}
