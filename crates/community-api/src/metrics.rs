//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 인증 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설치하고 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 오류를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증 메트릭
// ============================================================================

/// 인증 거부 카운터 증가.
pub fn record_auth_rejection(reason: &'static str) {
    counter!("auth_rejections_total", "reason" => reason).increment(1);
}

/// refresh token 교체 결과 카운터 증가.
pub fn record_refresh_rotation(outcome: &'static str) {
    counter!("refresh_rotations_total", "outcome" => outcome).increment(1);
}

/// 엔티티 캐시 조회 결과 (hit | miss | error).
///
/// error는 동작상 miss와 같지만 캐시 장애를 구분해서 관찰하기 위해 따로 셉니다.
pub fn record_entity_cache_lookup(namespace: &'static str, result: &'static str) {
    counter!(
        "entity_cache_lookups_total",
        "namespace" => namespace,
        "result" => result
    )
    .increment(1);
}
