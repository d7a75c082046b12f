//! Who may act on the webhook.
//!
//! Moderators are rows in `moderators`; the active set is cached for a
//! short TTL with single-flight reloads.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gigs_core::cache::TtlCache;
use gigs_core::types::ChatId;
use gigs_db::repositories::ModeratorRepo;
use sqlx::PgPool;

use crate::store::StoreError;

#[async_trait]
pub trait ModeratorDirectory: Send + Sync {
    async fn is_moderator(&self, user_id: ChatId) -> Result<bool, StoreError>;
}

/// Active moderators from PostgreSQL.
pub struct PgModerators {
    pool: PgPool,
    cache: TtlCache<(), Arc<HashSet<ChatId>>>,
}

impl PgModerators {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            cache: TtlCache::new(ttl),
        }
    }

    /// Drop the cached set so the next lookup reloads it.
    pub fn invalidate(&self) {
        self.cache.invalidate(&());
    }

    async fn load(&self) -> Result<Arc<HashSet<ChatId>>, StoreError> {
        let ids = ModeratorRepo::list_active_telegram_ids(&self.pool).await?;
        tracing::debug!(count = ids.len(), "Loaded active moderators");
        Ok(Arc::new(ids.into_iter().collect()))
    }
}

#[async_trait]
impl ModeratorDirectory for PgModerators {
    async fn is_moderator(&self, user_id: ChatId) -> Result<bool, StoreError> {
        let ids = self.cache.get_or_load(&(), || self.load()).await?;
        Ok(ids.contains(&user_id))
    }
}

/// Fixed moderator set.
#[derive(Debug, Clone, Default)]
pub struct StaticModerators {
    ids: HashSet<ChatId>,
}

impl StaticModerators {
    pub fn new(ids: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ModeratorDirectory for StaticModerators {
    async fn is_moderator(&self, user_id: ChatId) -> Result<bool, StoreError> {
        Ok(self.ids.contains(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_set_membership() {
        let moderators = StaticModerators::new([1, 2]);
        assert!(moderators.is_moderator(1).await.unwrap());
        assert!(!moderators.is_moderator(3).await.unwrap());
    }
}
