//! Refresh token 저장소.
//!
//! Refresh token은 서명 없는 256비트 난수(hex)이며, 캐시의
//! `refresh:{token}` 키에 발급 대상 사용자와 클라이언트 IP를 담아 7일간 보관합니다.
//! 한 번 사용한 토큰은 즉시 삭제되고 새 토큰으로 교체됩니다.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use community_core::UserId;
use community_data::{bounded, spawn_write, CacheStore, CacheStoreExt, DataError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::AuthError;
use crate::metrics::record_refresh_rotation;

/// Refresh token 수명 (초).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const KEY_PREFIX: &str = "refresh:";

/// 저장된 refresh token 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub user_id: UserId,
    /// 발급 당시 클라이언트 IP
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshRecord {
    /// 자연 만료까지 남은 시간.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> ChronoDuration {
        self.created_at + ChronoDuration::seconds(REFRESH_TOKEN_TTL_SECS) - now
    }
}

/// 교체 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedRefresh {
    pub token: String,
    pub user_id: UserId,
}

/// Refresh token 발급/교체/폐기.
#[derive(Clone)]
pub struct RefreshRegistry {
    cache: Arc<dyn CacheStore>,
    op_timeout: Duration,
}

impl RefreshRegistry {
    pub fn new(cache: Arc<dyn CacheStore>, op_timeout: Duration) -> Self {
        Self { cache, op_timeout }
    }

    fn key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, token)
    }

    fn ttl() -> Duration {
        Duration::from_secs(REFRESH_TOKEN_TTL_SECS as u64)
    }

    /// 새 refresh token을 발급합니다.
    pub async fn issue(&self, user_id: UserId, ip: &str) -> Result<String, AuthError> {
        let cache = self.cache.clone();
        let limit = self.op_timeout;
        let ip = ip.to_string();

        let token = spawn_write(async move { store_new(cache.as_ref(), limit, user_id, ip).await })
            .await?;

        debug!(user_id, "Issued refresh token");
        Ok(token)
    }

    /// 기존 토큰을 소비하고 같은 사용자/IP로 새 토큰을 발급합니다.
    ///
    /// 기존 토큰의 삭제는 항상 새 토큰 발급보다 먼저 일어나며, IP가 다르면
    /// 기존 토큰은 삭제된 채로 `IpMismatch`를 반환합니다. 같은 토큰에 대한 동시
    /// 호출 중에는 정확히 하나만 성공합니다.
    pub async fn rotate(&self, old: &str, ip: &str) -> Result<RotatedRefresh, AuthError> {
        let cache = self.cache.clone();
        let limit = self.op_timeout;
        let key = Self::key(old);
        let ip = ip.to_string();

        let result = spawn_write(async move {
            let taken = bounded(limit, "refresh take", cache.take(&key)).await?;
            let Some(json) = taken else {
                return Ok(Err(AuthError::NotFound));
            };

            let record: RefreshRecord = match serde_json::from_str(&json) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Discarded malformed refresh record");
                    return Ok(Err(AuthError::Invalid));
                }
            };

            if record.ip != ip {
                return Ok(Err(AuthError::IpMismatch));
            }

            let token = store_new(cache.as_ref(), limit, record.user_id, ip).await?;
            Ok::<_, DataError>(Ok(RotatedRefresh {
                token,
                user_id: record.user_id,
            }))
        })
        .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => Err(AuthError::from(e)),
        };

        record_refresh_rotation(match &outcome {
            Ok(_) => "rotated",
            Err(AuthError::NotFound) => "not_found",
            Err(AuthError::IpMismatch) => "ip_mismatch",
            Err(AuthError::Unavailable(_)) => "unavailable",
            Err(_) => "invalid",
        });

        outcome
    }

    /// 토큰 정보를 삭제하지 않고 조회합니다.
    pub async fn lookup(&self, token: &str) -> Result<Option<RefreshRecord>, AuthError> {
        let key = Self::key(token);
        match bounded(self.op_timeout, "refresh get", self.cache.get_json(&key)).await {
            Ok(record) => Ok(record),
            Err(DataError::SerializationError(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 토큰을 무조건 삭제합니다.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let cache = self.cache.clone();
        let limit = self.op_timeout;
        let key = Self::key(token);

        spawn_write(async move { bounded(limit, "refresh delete", cache.delete(&key)).await })
            .await?;
        Ok(())
    }

    /// 교체로 발급했지만 전달하지 못한 토큰을 삭제합니다. 실패는 로그만 남깁니다.
    pub async fn discard(&self, token: &str) {
        if let Err(e) = self.revoke(token).await {
            warn!(error = %e, "Failed to discard undelivered refresh token");
        }
    }
}

async fn store_new(
    cache: &dyn CacheStore,
    limit: Duration,
    user_id: UserId,
    ip: String,
) -> Result<String, DataError> {
    let token = generate_token();
    let record = RefreshRecord {
        user_id,
        ip,
        created_at: Utc::now(),
    };

    let key = RefreshRegistry::key(&token);
    bounded(
        limit,
        "refresh set",
        cache.set_json(&key, &record, RefreshRegistry::ttl()),
    )
    .await?;

    Ok(token)
}

/// 256비트 난수를 hex 문자열로 생성합니다.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use community_data::MemoryCache;

    fn registry() -> (RefreshRegistry, MemoryCache) {
        let cache = MemoryCache::new();
        let registry = RefreshRegistry::new(Arc::new(cache.clone()), Duration::from_millis(250));
        (registry, cache)
    }

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[tokio::test]
    async fn test_rotate_is_single_use() {
        let (registry, _) = registry();
        let first = registry.issue(7, "10.0.0.1").await.unwrap();

        let rotated = registry.rotate(&first, "10.0.0.1").await.unwrap();
        assert_eq!(rotated.user_id, 7);
        assert_ne!(rotated.token, first);

        assert!(matches!(
            registry.rotate(&first, "10.0.0.1").await,
            Err(AuthError::NotFound)
        ));
        assert!(registry.lookup(&rotated.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ip_mismatch_consumes_token() {
        let (registry, cache) = registry();
        let token = registry.issue(7, "10.0.0.1").await.unwrap();

        assert!(matches!(
            registry.rotate(&token, "10.0.0.2").await,
            Err(AuthError::IpMismatch)
        ));
        assert!(cache.is_empty().await);
        assert!(matches!(
            registry.rotate(&token, "10.0.0.1").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_revoke() {
        let (registry, _) = registry();
        let token = registry.issue(7, "10.0.0.1").await.unwrap();

        registry.revoke(&token).await.unwrap();
        assert!(registry.lookup(&token).await.unwrap().is_none());
        // 없는 토큰 삭제도 성공
        registry.revoke(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_outage_is_unavailable() {
        let (registry, cache) = registry();
        let token = registry.issue(7, "10.0.0.1").await.unwrap();

        cache.set_offline(true);
        assert!(matches!(
            registry.rotate(&token, "10.0.0.1").await,
            Err(AuthError::Unavailable(_))
        ));
        assert!(matches!(
            registry.issue(7, "10.0.0.1").await,
            Err(AuthError::Unavailable(_))
        ));
    }

    #[test]
    fn test_record_remaining_lifetime() {
        let now = Utc::now();
        let record = RefreshRecord {
            user_id: 1,
            ip: "127.0.0.1".to_string(),
            created_at: now - ChronoDuration::days(6),
        };
        assert_eq!(record.remaining_lifetime(now).num_days(), 1);
    }
}
