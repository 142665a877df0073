//! 테스트용 인메모리 [`IdentityStore`].
//!
//! 호출 횟수를 기록하므로 cache-aside 경로가 원천 저장소를 몇 번
//! 조회했는지 검증할 수 있습니다.

use async_trait::async_trait;
use chrono::Utc;
use community_core::{
    Role, RoleId, UserCredentials, UserId, UserProfile, UserRecord, UserStats,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::IdentityStore;
use crate::error::{DataError, Result};

#[derive(Debug, Clone)]
struct StoredUser {
    record: UserRecord,
    stats: UserStats,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, StoredUser>,
    roles: HashMap<RoleId, Role>,
}

/// 프로세스 내부 사용자/역할 저장소.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityStore {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
    user_loads: Arc<AtomicUsize>,
    role_loads: Arc<AtomicUsize>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 역할을 추가하거나 교체합니다.
    pub fn insert_role(&self, role: Role) {
        self.write().roles.insert(role.id, role);
    }

    /// 사용자를 추가합니다. 역할은 미리 등록되어 있어야 합니다.
    pub fn insert_user(&self, id: UserId, username: &str, role_id: RoleId, password_hash: &str) {
        let now = Utc::now();
        let record = UserRecord {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            role_id,
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.write().users.insert(
            id,
            StoredUser {
                record,
                stats: UserStats::default(),
                password_hash: password_hash.to_string(),
            },
        );
    }

    /// 사용자를 삭제합니다.
    pub fn remove_user(&self, id: UserId) -> bool {
        self.write().users.remove(&id).is_some()
    }

    /// 사용자의 역할을 변경합니다.
    pub fn set_user_role(&self, id: UserId, role_id: RoleId) {
        if let Some(user) = self.write().users.get_mut(&id) {
            user.record.role_id = role_id;
            user.record.updated_at = Utc::now();
        }
    }

    /// 장애 주입: `true`이면 모든 조회가 연결 오류로 실패합니다.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// `find_user_by_id` 호출 횟수.
    pub fn user_loads(&self) -> usize {
        self.user_loads.load(Ordering::SeqCst)
    }

    /// `find_role_by_id` 호출 횟수.
    pub fn role_loads(&self) -> usize {
        self.role_loads.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DataError::ConnectionError("identity store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        self.user_loads.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let tables = self.read();
        let Some(user) = tables.users.get(&id) else {
            return Ok(None);
        };
        let role = tables
            .roles
            .get(&user.record.role_id)
            .ok_or_else(|| DataError::NotFound(format!("role {}", user.record.role_id)))?;

        Ok(Some(UserProfile {
            user: user.record.clone(),
            role: role.summary(),
            stats: user.stats.clone(),
        }))
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>> {
        self.role_loads.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        Ok(self.read().roles.get(&id).cloned())
    }

    async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>> {
        self.ensure_online()?;
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.record.username == username)
            .map(credentials_of))
    }

    async fn find_credentials_by_id(&self, id: UserId) -> Result<Option<UserCredentials>> {
        self.ensure_online()?;
        Ok(self.read().users.get(&id).map(credentials_of))
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<bool> {
        self.ensure_online()?;
        match self.write().users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<bool> {
        self.ensure_online()?;
        Ok(true)
    }
}

fn credentials_of(user: &StoredUser) -> UserCredentials {
    UserCredentials {
        id: user.record.id,
        username: user.record.username.clone(),
        role_id: user.record.role_id,
        password_hash: user.password_hash.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use community_core::Permission;

    fn seeded() -> InMemoryIdentityStore {
        let store = InMemoryIdentityStore::new();
        store.insert_role(Role {
            id: 1,
            name: "member".to_string(),
            permissions: vec![Permission {
                id: 1,
                name: "create_post".to_string(),
            }],
        });
        store.insert_user(7, "alice", 1, "hash");
        store
    }

    #[tokio::test]
    async fn test_find_user_joins_role() {
        let store = seeded();
        let profile = store.find_user_by_id(7).await.unwrap().unwrap();
        assert_eq!(profile.role.name, "member");
        assert_eq!(profile.role_id(), 1);
        assert_eq!(store.user_loads(), 1);

        assert!(store.find_user_by_id(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password_hash() {
        let store = seeded();
        assert!(store.update_password_hash(7, "new").await.unwrap());
        assert!(!store.update_password_hash(99, "new").await.unwrap());

        let creds = store.find_credentials_by_username("alice").await.unwrap().unwrap();
        assert_eq!(creds.password_hash, "new");
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = seeded();
        store.set_offline(true);
        let err = store.find_role_by_id(1).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
