//! 커뮤니티 플랫폼 인증/인가 API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 서명된 access token과 서버 보관 refresh token 기반 쿠키 인증
//! - 토큰 폐기 목록과 refresh token 교체
//! - 캐시 우선 사용자/역할 권한 조회
//! - 헬스 체크와 Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`auth`]: 토큰 코덱, refresh registry, 폐기 목록, 인증 게이트
//! - [`cache`]: 엔티티 캐시
//! - [`routes`]: REST API 엔드포인트
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use auth::{
    hash_password, require_auth, verify_password, AuthContext, AuthGate, CredentialCodec,
    CurrentUser, GateFailure, PermissionResolver, RefreshRegistry, RevocationLedger,
};
pub use cache::{CacheEntity, EntityCache, UserDirectory};
pub use error::{ApiErrorResponse, ApiResult, AUTHENTICATION_FAILED};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::create_api_router;
pub use state::AppState;
