//! 사용자 도메인 타입.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RoleId, RoleSummary};

/// 사용자 식별자.
pub type UserId = i64;

/// `users` 테이블 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role_id: RoleId,
    /// 자기소개
    pub bio: Option<String>,
    /// 프로필 이미지 URL
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 사용자 활동 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct UserStats {
    /// 작성한 게시글 수
    pub post_count: i64,
    /// 팔로워 수
    pub follower_count: i64,
    /// 팔로잉 수
    pub following_count: i64,
}

/// 사용자 + 역할 + 통계를 합친 비정규화 스냅샷.
///
/// 캐시에 저장되는 단위입니다. 원본 행이 변경되면 캐시 항목은
/// 갱신되지 않고 삭제됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct UserProfile {
    pub user: UserRecord,
    pub role: RoleSummary,
    pub stats: UserStats,
}

impl UserProfile {
    /// 사용자 ID.
    pub fn id(&self) -> UserId {
        self.user.id
    }

    /// 사용자의 현재 역할 ID.
    pub fn role_id(&self) -> RoleId {
        self.user.role_id
    }
}

/// 로그인 검증용 자격 정보.
///
/// 비밀번호 해시를 포함하므로 캐시하거나 응답으로 내보내지 않습니다.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub role_id: RoleId,
    /// PHC 형식 Argon2 해시
    pub password_hash: String,
}
