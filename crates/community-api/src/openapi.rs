//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use community_core::{RoleSummary, UserProfile, UserRecord, UserStats};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    ChangePasswordRequest, ComponentHealth, ComponentStatus, HealthResponse, LoginRequest,
    PermissionCheckResponse, TokenResponse,
};

/// Community API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Community Auth API",
        version = "0.1.0",
        description = r#"
# 커뮤니티 플랫폼 인증/인가 API

## 인증

로그인하면 `access_token`(15분)과 `refresh_token`(7일)이 HttpOnly 쿠키로
설정됩니다. access token이 만료되면 보호된 엔드포인트가 refresh token으로
자동 재발급하며, 이때 refresh token도 교체됩니다.

인증 실패는 사유와 관계없이 `AUTHENTICATION_FAILED` 코드의 401로 응답합니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰 교체, 권한 확인"),
        (name = "admin", description = "관리 - 역할 권한 캐시")
    ),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            LoginRequest,
            ChangePasswordRequest,
            TokenResponse,
            PermissionCheckResponse,
            UserProfile,
            UserRecord,
            UserStats,
            RoleSummary,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::refresh,
        crate::routes::auth::me,
        crate::routes::auth::change_password,
        crate::routes::auth::check_permission,

        // ===== Admin =====
        crate::routes::admin::invalidate_role_cache,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_valid() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&doc).unwrap();

        assert!(json.contains("Community Auth API"));
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/v1/auth/login"));
        assert!(json.contains("/api/v1/auth/permissions/{name}"));
        assert!(json.contains("/api/v1/admin/roles/{id}/cache"));
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(json.contains("TokenResponse"));
        assert!(json.contains("ApiErrorResponse"));
        assert!(json.contains("UserProfile"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
