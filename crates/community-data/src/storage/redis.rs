//! Redis cache 구현.
//!
//! refresh token, 폐기 목록, 엔티티 스냅샷을 저장하는 운영용 cache 백엔드입니다.
//! `ConnectionManager`는 복제 가능한 멀티플렉스 연결이므로 명령마다 복제해서
//! 사용하고, 클라이언트 측 잠금은 두지 않습니다.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;
use tracing::{info, instrument};

use super::CacheStore;
use crate::error::{DataError, Result};

/// Redis 연결 래퍼.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// 새로운 Redis cache 연결을 생성합니다.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to Redis...");

        let client = Client::open(url).map_err(|e| DataError::ConnectionError(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Redis connection established");

        Ok(Self { connection })
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        // PX 0은 Redis가 거부하므로 최소 1ms
        (ttl.as_millis() as u64).max(1)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    #[instrument(skip_all, level = "trace")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(skip_all, level = "trace")]
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(skip_all, level = "trace")]
    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    #[instrument(skip_all, level = "trace")]
    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        // GETDEL (Redis 6.2+): 조회와 삭제를 서버에서 원자적으로 수행
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn ping(&self) -> Result<bool> {
        let mut conn = self.connection.clone();
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(RedisCache::ttl_millis(Duration::ZERO), 1);
        assert_eq!(RedisCache::ttl_millis(Duration::from_secs(900)), 900_000);
    }
}
