//! 사용자 스냅샷 조회.

use community_core::{UserId, UserProfile};
use community_data::{DataError, IdentityStore};
use std::sync::Arc;
use std::time::Duration;

use super::{CacheEntity, EntityCache};

/// 사용자 스냅샷 TTL.
pub const USER_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

impl CacheEntity for UserProfile {
    const NAMESPACE: &'static str = "user";
    const TTL: Duration = USER_CACHE_TTL;
}

/// 캐시 우선 사용자 조회.
///
/// 사용자/역할/통계 행을 변경하는 모든 경로는 변경 후 [`UserDirectory::invalidate`]를
/// 호출해야 합니다.
#[derive(Clone)]
pub struct UserDirectory {
    cache: EntityCache<UserProfile>,
    store: Arc<dyn IdentityStore>,
}

impl UserDirectory {
    pub fn new(cache: EntityCache<UserProfile>, store: Arc<dyn IdentityStore>) -> Self {
        Self { cache, store }
    }

    /// 사용자를 조회합니다. 저장소에 없으면 `None`.
    pub async fn find(&self, id: UserId) -> Result<Option<UserProfile>, DataError> {
        let store = self.store.clone();
        self.cache
            .get_or_load(id, || async move { store.find_user_by_id(id).await })
            .await
    }

    /// 사용자 스냅샷을 캐시에서 제거합니다.
    pub async fn invalidate(&self, id: UserId) -> Result<(), DataError> {
        self.cache.invalidate(id).await
    }
}
