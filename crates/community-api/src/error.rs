//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다. 인증 실패는 사유와
//! 관계없이 같은 `AUTHENTICATION_FAILED` 본문을 반환합니다.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use community_data::DataError;
use tracing::error;

use crate::auth::{AuthError, GateFailure};

/// 인증 실패 응답 코드.
pub const AUTHENTICATION_FAILED: &str = "AUTHENTICATION_FAILED";

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "AUTHENTICATION_FAILED",
///   "message": "인증에 실패했습니다",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "AUTHENTICATION_FAILED", "VALIDATION_ERROR")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 에러 코드 반환.
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 상태 코드와 에러 본문.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 401 인증 실패 (사유 비공개).
pub fn authentication_failed() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorResponse::new(
            AUTHENTICATION_FAILED,
            "인증에 실패했습니다",
        )),
    )
}

/// 403 권한 부족.
pub fn forbidden(permission: &str) -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ApiErrorResponse::with_details(
            "INSUFFICIENT_PERMISSION",
            "권한이 부족합니다",
            serde_json::json!({ "permission": permission }),
        )),
    )
}

/// 400 입력 검증 실패.
pub fn validation_error(details: impl Serialize) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::with_details(
            "VALIDATION_ERROR",
            "요청 값이 올바르지 않습니다",
            serde_json::to_value(details).unwrap_or(Value::Null),
        )),
    )
}

/// 500 내부 오류. 상세 내용은 응답에 포함하지 않습니다.
pub fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiErrorResponse::new(
            "INTERNAL_ERROR",
            "요청을 처리하지 못했습니다",
        )),
    )
}

/// 503 인증 저장소 장애.
pub fn service_unavailable() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiErrorResponse::new(
            "SERVICE_UNAVAILABLE",
            "잠시 후 다시 시도해 주세요",
        )),
    )
}

impl From<&GateFailure> for ApiError {
    fn from(failure: &GateFailure) -> Self {
        match failure {
            GateFailure::Rejected(_) => authentication_failed(),
            GateFailure::CacheUnavailable(_) => service_unavailable(),
            GateFailure::StoreUnavailable(_) | GateFailure::Internal(_) => internal_error(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unavailable(_) => service_unavailable(),
            _ => authentication_failed(),
        }
    }
}

/// 관계형 저장소 오류를 500으로 변환합니다.
pub fn store_error(err: DataError) -> ApiError {
    error!(error = %err, "Identity store request failed");
    internal_error()
}
