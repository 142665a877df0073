//! 역할 및 권한.
//!
//! 역할-권한 매핑의 원천은 관계형 저장소(`roles`, `permissions`,
//! `role_permissions` 테이블)이며, 이 타입들은 그 스냅샷입니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 역할 식별자.
pub type RoleId = i64;

/// 단일 권한.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Permission {
    /// 권한 ID
    pub id: i64,
    /// 권한 이름 (예: "create_post", "manage_roles")
    pub name: String,
}

/// 권한 목록을 포함한 역할.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Role {
    /// 역할 ID
    pub id: RoleId,
    /// 역할 이름 (예: "admin", "member")
    pub name: String,
    /// 역할에 할당된 권한
    pub permissions: Vec<Permission>,
}

impl Role {
    /// 권한 이름 집합을 반환합니다.
    pub fn permission_names(&self) -> BTreeSet<String> {
        self.permissions.iter().map(|p| p.name.clone()).collect()
    }

    /// 역할 요약 반환.
    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// 권한 없이 식별 정보만 담은 역할 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: String,
}
