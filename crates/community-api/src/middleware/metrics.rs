//! HTTP 요청 metrics middleware.
//!
//! 라벨에는 요청 URI가 아니라 라우터에 등록된 경로 템플릿을 사용합니다.
//! 예를 들어 `/api/v1/auth/permissions/create_post` 요청은
//! `/api/v1/auth/permissions/{name}`으로 집계되고, 어떤 라우트에도 맞지 않는
//! 요청은 모두 [`UNMATCHED_ROUTE`] 하나로 묶입니다.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{record_http_duration, record_http_request, record_http_response};

/// 라우트에 매칭되지 않은 요청의 path 라벨.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// 요청이 매칭된 라우트 템플릿. 없으면 [`UNMATCHED_ROUTE`].
///
/// `Router::layer`로 적용해야 라우팅 이후에 실행되어 `MatchedPath`를 볼 수 있습니다.
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// - `http_requests_total` (method, path)
/// - `http_responses_total` (method, path, status)
/// - `http_request_duration_seconds` (method, path)
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = route_label(&request);

    record_http_request(&method, &route);
    let response = next.run(request).await;

    record_http_response(&method, &route, response.status().as_u16());
    record_http_duration(&method, &route, started.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    const LABEL_HEADER: &str = "x-route-label";

    async fn echo_label(request: Request, next: Next) -> Response {
        let label = route_label(&request);
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&label) {
            response.headers_mut().insert(LABEL_HEADER, value);
        }
        response
    }

    fn app() -> Router {
        let auth = Router::new().route("/permissions/{name}", get(|| async { "OK" }));
        Router::new()
            .nest("/api/v1/auth", auth)
            .layer(middleware::from_fn(echo_label))
    }

    async fn label_for(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let label = response
            .headers()
            .get(LABEL_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (response.status(), label)
    }

    #[tokio::test]
    async fn test_path_parameters_share_one_label() {
        for name in ["create_post", "delete_post", "perm_123x"] {
            let (status, label) = label_for(&format!("/api/v1/auth/permissions/{}", name)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(label, "/api/v1/auth/permissions/{name}");
        }
    }

    #[tokio::test]
    async fn test_unknown_paths_collapse_to_unmatched() {
        for i in 0..5 {
            let (status, label) = label_for(&format!("/no-such-route-{}x", i)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(label, UNMATCHED_ROUTE);
        }
    }

    #[tokio::test]
    async fn test_metrics_layer_passes_response_through() {
        let app = Router::new()
            .route("/roles/{id}", get(|| async { "OK" }))
            .layer(middleware::from_fn(metrics_layer));

        let response = app
            .oneshot(axum::http::Request::builder().uri("/roles/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
