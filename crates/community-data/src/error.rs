//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 백그라운드 쓰기 태스크 실패
    #[error("Write task failed: {0}")]
    TaskFailed(String),
}

impl DataError {
    /// 외부 시스템(캐시/DB)에 일시적으로 접근할 수 없는 상태인지 확인합니다.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DataError::ConnectionError(_)
                | DataError::CacheError(_)
                | DataError::PoolExhausted
                | DataError::Timeout(_)
                | DataError::TaskFailed(_)
        )
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::DuplicateError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(DataError::Timeout("GET".to_string()).is_unavailable());
        assert!(DataError::CacheError("refused".to_string()).is_unavailable());
        assert!(DataError::PoolExhausted.is_unavailable());
        assert!(!DataError::NotFound("user".to_string()).is_unavailable());
        assert!(!DataError::SerializationError("eof".to_string()).is_unavailable());
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let err: DataError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
