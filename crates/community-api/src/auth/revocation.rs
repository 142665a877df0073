//! 자격증명 폐기 목록.
//!
//! 자연 만료 전에 무효화할 토큰을 `revoked:{sha256(token)}` 키로 기록합니다.
//! 항목의 TTL은 토큰의 남은 수명과 같으므로 목록은 스스로 정리됩니다.

use chrono::Duration as ChronoDuration;
use community_data::{bounded, spawn_write, CacheStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::AuthError;

const KEY_PREFIX: &str = "revoked:";

/// 폐기된 자격증명 기록.
#[derive(Clone)]
pub struct RevocationLedger {
    cache: Arc<dyn CacheStore>,
    op_timeout: Duration,
}

impl RevocationLedger {
    pub fn new(cache: Arc<dyn CacheStore>, op_timeout: Duration) -> Self {
        Self { cache, op_timeout }
    }

    fn key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, fingerprint(token))
    }

    /// 토큰을 남은 수명 동안 폐기 목록에 추가합니다.
    ///
    /// 남은 수명이 0 이하이면 이미 만료된 토큰이므로 아무것도 하지 않습니다.
    pub async fn add(&self, token: &str, remaining: ChronoDuration) -> Result<(), AuthError> {
        let ttl = match remaining.to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => return Ok(()),
        };

        let cache = self.cache.clone();
        let limit = self.op_timeout;
        let key = Self::key(token);

        spawn_write(async move {
            bounded(limit, "revocation set", cache.set_ex(&key, "1", ttl)).await
        })
        .await?;

        debug!(ttl_secs = ttl.as_secs(), "Credential revoked");
        Ok(())
    }

    /// 토큰이 폐기 목록에 있는지 확인합니다.
    ///
    /// 캐시 장애는 `Unavailable`로 그대로 전달되며, 호출자는 요청을 거부해야 합니다.
    pub async fn contains(&self, token: &str) -> Result<bool, AuthError> {
        let key = Self::key(token);
        Ok(bounded(self.op_timeout, "revocation exists", self.cache.exists(&key)).await?)
    }
}

/// 토큰의 SHA-256 hex 지문.
fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
