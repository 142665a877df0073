//! 캐시 저장소.
//!
//! 인증 서브시스템(refresh registry, revocation ledger, entity cache)이 공유하는
//! 키-값 캐시 추상화와 두 가지 구현을 제공합니다.
//!
//! - [`RedisCache`]: 운영 환경용 Redis 백엔드
//! - [`MemoryCache`]: 단일 프로세스 개발/테스트용 백엔드
//!
//! 모든 외부 호출은 [`bounded`]로 시간 제한을 두고, 이미 시작된 쓰기는
//! [`spawn_write`]로 요청 취소와 무관하게 끝까지 수행합니다.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{DataError, Result};

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// TTL 기반 키-값 캐시.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// 값을 조회합니다. 만료되었거나 없으면 `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// TTL과 함께 값을 저장합니다 (기존 값 덮어씀).
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// 키를 삭제합니다. 실제로 삭제되었으면 `true`.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 값을 조회하면서 원자적으로 삭제합니다.
    ///
    /// 같은 키에 대한 동시 호출 중 정확히 하나만 값을 받습니다.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// 키 존재 여부를 확인합니다.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 백엔드 상태를 확인합니다.
    async fn ping(&self) -> Result<bool>;
}

/// JSON 직렬화를 곁들인 [`CacheStore`] 헬퍼.
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        self.set_ex(key, &json, ttl).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

/// 외부 호출에 시간 제한을 적용합니다.
///
/// 제한 시간을 넘기면 [`DataError::Timeout`]을 반환합니다.
pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DataError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            limit.as_millis()
        ))),
    }
}

/// 쓰기 작업을 별도 태스크에서 실행하고 결과를 기다립니다.
///
/// 호출한 future가 중간에 drop 되어도 태스크는 계속 실행되므로,
/// 한 번 시작된 쓰기는 반쯤 적용된 상태로 남지 않습니다.
pub async fn spawn_write<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| DataError::TaskFailed(e.to_string()))?
}
