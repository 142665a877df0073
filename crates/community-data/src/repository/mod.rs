//! 관계형 저장소 repository.
//!
//! 인증 서브시스템은 사용자/역할 데이터를 [`IdentityStore`] 트레이트를 통해서만
//! 읽고 씁니다. 운영 구현은 [`PgIdentityStore`]이며, 테스트에서는
//! `test-utils` 기능의 [`memory::InMemoryIdentityStore`]를 사용합니다.

pub mod identity;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use async_trait::async_trait;
use community_core::{Role, RoleId, UserCredentials, UserId, UserProfile};

use crate::error::Result;

pub use identity::{Database, PgIdentityStore};

/// 사용자/역할 원천 데이터 접근.
#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    /// 역할과 활동 통계를 포함한 사용자 스냅샷을 조회합니다.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserProfile>>;

    /// 권한 목록을 포함한 역할을 조회합니다.
    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>>;

    /// 로그인용 자격 정보를 사용자명으로 조회합니다.
    async fn find_credentials_by_username(&self, username: &str)
        -> Result<Option<UserCredentials>>;

    /// 비밀번호 변경용 자격 정보를 ID로 조회합니다.
    async fn find_credentials_by_id(&self, id: UserId) -> Result<Option<UserCredentials>>;

    /// 비밀번호 해시를 갱신합니다. 대상 사용자가 없으면 `false`.
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<bool>;

    /// 저장소 상태를 확인합니다.
    async fn ping(&self) -> Result<bool>;
}
