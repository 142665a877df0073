//! 역할별 권한 판정.
//!
//! 역할의 권한 집합을 `role_permissions:{role_id}` 키로 24시간 캐시합니다.
//! 역할 편집 후 명시적으로 [`PermissionResolver::invalidate`]를 호출하지 않으면
//! 변경 사항은 최대 TTL만큼 늦게 반영됩니다.

use community_core::RoleId;
use community_data::{DataError, IdentityStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheEntity, EntityCache};

/// 권한 집합 TTL.
pub const PERMISSION_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// 캐시되는 역할 권한 집합.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPermissionSet {
    pub role_id: RoleId,
    pub permissions: BTreeSet<String>,
}

impl CachedPermissionSet {
    pub fn contains(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }
}

impl CacheEntity for CachedPermissionSet {
    const NAMESPACE: &'static str = "role_permissions";
    const TTL: Duration = PERMISSION_CACHE_TTL;
}

/// 권한 판정기.
#[derive(Clone)]
pub struct PermissionResolver {
    cache: EntityCache<CachedPermissionSet>,
    store: Arc<dyn IdentityStore>,
}

impl PermissionResolver {
    pub fn new(cache: EntityCache<CachedPermissionSet>, store: Arc<dyn IdentityStore>) -> Self {
        Self { cache, store }
    }

    /// 역할의 권한 집합을 조회합니다. 알 수 없는 역할이면 `None`.
    pub async fn permissions(
        &self,
        role_id: RoleId,
    ) -> Result<Option<CachedPermissionSet>, DataError> {
        let store = self.store.clone();
        self.cache
            .get_or_load(role_id, || async move {
                let role = store.find_role_by_id(role_id).await?;
                Ok(role.map(|role| CachedPermissionSet {
                    role_id: role.id,
                    permissions: role.permission_names(),
                }))
            })
            .await
    }

    /// 역할이 해당 권한을 가지는지 판정합니다.
    ///
    /// 알 수 없는 역할은 어떤 권한도 가지지 않습니다.
    pub async fn has_permission(&self, role_id: RoleId, name: &str) -> Result<bool, DataError> {
        let granted = self
            .permissions(role_id)
            .await?
            .is_some_and(|set| set.contains(name));

        debug!(role_id, permission = name, granted, "Permission resolved");
        Ok(granted)
    }

    /// 역할 편집 후 캐시된 권한 집합을 제거합니다.
    pub async fn invalidate(&self, role_id: RoleId) -> Result<(), DataError> {
        self.cache.invalidate(role_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use community_core::{Permission, Role};
    use community_data::{InMemoryIdentityStore, MemoryCache};

    fn permission(id: i64, name: &str) -> Permission {
        Permission {
            id,
            name: name.to_string(),
        }
    }

    fn resolver() -> (PermissionResolver, InMemoryIdentityStore) {
        let store = InMemoryIdentityStore::new();
        store.insert_role(Role {
            id: 1,
            name: "member".to_string(),
            permissions: vec![permission(1, "create_post")],
        });

        let cache = EntityCache::new(Arc::new(MemoryCache::new()), Duration::from_millis(250));
        let resolver = PermissionResolver::new(cache, Arc::new(store.clone()));
        (resolver, store)
    }

    #[tokio::test]
    async fn test_has_permission() {
        let (resolver, store) = resolver();

        assert!(resolver.has_permission(1, "create_post").await.unwrap());
        assert!(!resolver.has_permission(1, "manage_roles").await.unwrap());
        // 두 번째 판정부터는 캐시 사용
        assert_eq!(store.role_loads(), 1);
    }

    #[tokio::test]
    async fn test_unknown_role_has_no_permissions() {
        let (resolver, _) = resolver();
        assert!(!resolver.has_permission(99, "create_post").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_edit_visible_after_ttl() {
        let (resolver, store) = resolver();
        assert!(!resolver.has_permission(1, "delete_post").await.unwrap());

        store.insert_role(Role {
            id: 1,
            name: "member".to_string(),
            permissions: vec![permission(1, "create_post"), permission(2, "delete_post")],
        });

        // TTL 이전에는 이전 권한 집합
        tokio::time::advance(PERMISSION_CACHE_TTL - Duration::from_secs(1)).await;
        assert!(!resolver.has_permission(1, "delete_post").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(resolver.has_permission(1, "delete_post").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_applies_edit_immediately() {
        let (resolver, store) = resolver();
        assert!(resolver.has_permission(1, "create_post").await.unwrap());

        store.insert_role(Role {
            id: 1,
            name: "member".to_string(),
            permissions: vec![],
        });
        resolver.invalidate(1).await.unwrap();

        assert!(!resolver.has_permission(1, "create_post").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_answer_from_store_and_cache() {
        let (resolver, store) = resolver();

        for name in ["create_post", "manage_roles"] {
            let fresh = resolver.has_permission(1, name).await.unwrap();
            let loads = store.role_loads();
            let cached = resolver.has_permission(1, name).await.unwrap();

            assert_eq!(fresh, cached);
            assert_eq!(store.role_loads(), loads);
        }
        assert_eq!(store.role_loads(), 1);
    }
}
