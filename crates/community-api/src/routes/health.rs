//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.
//! 관계형 저장소와 캐시 저장소 모두 인증 경로에 필수이므로 어느 한쪽이라도
//! 응답하지 않으면 readiness는 503을 반환합니다.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "unhealthy")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 개별 컴포넌트 상태
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    /// 사용자/역할 저장소 (PostgreSQL)
    pub database: ComponentStatus,

    /// 세션/엔티티 캐시 저장소
    pub cache: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down")
    pub status: String,

    /// 추가 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    /// 정상 상태.
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
            message: None,
        }
    }

    /// 비정상 상태.
    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    /// 정보 포함 정상 상태.
    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "서버 응답 가능"))
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크 (readiness probe용).
///
/// GET /health/ready
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "모든 의존성 정상", body = HealthResponse),
        (status = 503, description = "의존성 장애", body = HealthResponse)
    )
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (store_ok, cache_ok) = tokio::join!(state.is_store_healthy(), state.is_cache_healthy());

    let database = if store_ok {
        ComponentStatus::up()
    } else {
        ComponentStatus::down("연결 실패")
    };
    let cache = if cache_ok {
        ComponentStatus::up_with_info(state.cache_backend)
    } else {
        ComponentStatus::down(format!("{} 연결 실패", state.cache_backend))
    };

    let healthy = database.is_up() && cache.is_up();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth { database, cache },
    };

    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{body::Body, http::Request};
    use community_data::{InMemoryIdentityStore, MemoryCache};
    use tower::ServiceExt;

    fn ready_request() -> Request<Body> {
        Request::builder()
            .uri("/health/ready")
            .body(Body::empty())
            .unwrap()
    }

    async fn read_health(response: axum::response::Response) -> HealthResponse {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let app = Router::new().route("/health", get(health_check));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_returns_json() {
        let state = Arc::new(create_test_state(
            MemoryCache::new(),
            InMemoryIdentityStore::new(),
        ));
        let app = Router::new()
            .route("/health/ready", get(health_ready))
            .with_state(state);

        let response = app.oneshot(ready_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health = read_health(response).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.components.cache.message.as_deref(), Some("memory"));
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_is_unhealthy() {
        let cache = MemoryCache::new();
        cache.set_offline(true);
        let state = Arc::new(create_test_state(cache, InMemoryIdentityStore::new()));
        let app = Router::new()
            .route("/health/ready", get(health_ready))
            .with_state(state);

        let response = app.oneshot(ready_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let health = read_health(response).await;
        assert_eq!(health.status, "unhealthy");
        assert_eq!(health.components.database.status, "up");
        assert_eq!(health.components.cache.status, "down");
    }

    #[test]
    fn test_component_status_variants() {
        let up = ComponentStatus::up();
        assert_eq!(up.status, "up");
        assert!(up.message.is_none());

        let down = ComponentStatus::down("error");
        assert_eq!(down.status, "down");
        assert_eq!(down.message, Some("error".to_string()));
    }
}
