//! 커뮤니티 플랫폼 공통 에러 타입.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 인증 에러
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 캐시 에러
    #[error("캐시 에러: {0}")]
    Cache(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 일시적 장애로 재시도 가능한 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Database(_) | CoreError::Cache(_))
    }

    /// 시작 단계에서 프로세스를 중단해야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Config(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_transient() {
        assert!(CoreError::Cache("timeout".to_string()).is_transient());
        assert!(CoreError::Database("pool closed".to_string()).is_transient());
        assert!(!CoreError::Auth("bad token".to_string()).is_transient());
    }

    #[test]
    fn test_error_fatal() {
        assert!(CoreError::Config("JWT secret missing".to_string()).is_fatal());
        assert!(!CoreError::NotFound("user".to_string()).is_fatal());
    }
}
