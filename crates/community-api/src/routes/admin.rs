//! 관리자 endpoint.
//!
//! - `DELETE /api/v1/admin/roles/{id}/cache` - 역할 권한 캐시 무효화
//!
//! 역할 편집 도구가 편집 직후 호출합니다. 호출하지 않으면 변경 사항은 권한
//! 캐시 TTL이 지난 뒤에 반영됩니다.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::delete,
    Router,
};
use community_core::RoleId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{require_auth, CurrentUser};
use crate::error::{forbidden, service_unavailable, store_error, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 역할 관리 권한 이름.
pub const MANAGE_ROLES: &str = "manage_roles";

/// 역할 권한 캐시 무효화.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/roles/{id}/cache",
    tag = "admin",
    params(("id" = i64, Path, description = "역할 ID")),
    responses(
        (status = 204, description = "무효화 완료"),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 503, description = "캐시 저장소 장애", body = ApiErrorResponse)
    )
)]
pub async fn invalidate_role_cache(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Path(role_id): Path<RoleId>,
) -> ApiResult<StatusCode> {
    let allowed = state
        .permissions
        .has_permission(ctx.role_id, MANAGE_ROLES)
        .await
        .map_err(store_error)?;
    if !allowed {
        return Err(forbidden(MANAGE_ROLES));
    }

    state.permissions.invalidate(role_id).await.map_err(|e| {
        warn!(role_id, error = %e, "Failed to invalidate role permissions");
        service_unavailable()
    })?;

    info!(role_id, by = ctx.user_id, "Role permission cache invalidated");
    Ok(StatusCode::NO_CONTENT)
}

/// 관리자 라우터 생성. 모든 라우트에 [`require_auth`]가 적용됩니다.
pub fn admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/roles/{id}/cache", delete(invalidate_role_cache))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
