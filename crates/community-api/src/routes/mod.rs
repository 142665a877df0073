//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/auth` - 로그인, 로그아웃, 토큰 교체, 현재 사용자, 권한 확인
//! - `/api/v1/admin` - 역할 권한 캐시 관리

pub mod admin;
pub mod auth;
pub mod health;

pub use admin::{admin_router, MANAGE_ROLES};
pub use auth::{
    auth_router, ChangePasswordRequest, LoginRequest, PermissionCheckResponse, TokenResponse,
};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 인증 미들웨어가 상태를 필요로 하므로 `state`를 받아 보호된 서브 라우터에
/// 적용합니다. 반환된 라우터에는 아직 상태가 주입되지 않았습니다.
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/auth", auth_router(state.clone()))
        .nest("/api/v1/admin", admin_router(state))
}
