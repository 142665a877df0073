//! 엔티티 스냅샷 cache-aside.
//!
//! 원천 데이터는 관계형 저장소이며 캐시는 사본일 뿐입니다. 쓰기 경로는
//! 캐시를 갱신하지 않고 삭제만 하며, 다음 조회가 저장소에서 다시 채웁니다.
//! 캐시 장애나 타임아웃은 miss로 취급하여 저장소로 넘어갑니다.

use community_data::{bounded, spawn_write, CacheStore, CacheStoreExt, DataError};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::metrics::record_entity_cache_lookup;

/// 캐시에 저장할 수 있는 엔티티.
pub trait CacheEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 키 접두사 (`{NAMESPACE}:{id}`)
    const NAMESPACE: &'static str;
    /// 항목 TTL
    const TTL: Duration;
}

/// 엔티티 종류별 캐시.
pub struct EntityCache<T> {
    store: Arc<dyn CacheStore>,
    op_timeout: Duration,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            op_timeout: self.op_timeout,
            _entity: PhantomData,
        }
    }
}

impl<T: CacheEntity> EntityCache<T> {
    pub fn new(store: Arc<dyn CacheStore>, op_timeout: Duration) -> Self {
        Self {
            store,
            op_timeout,
            _entity: PhantomData,
        }
    }

    /// 캐시 키를 생성합니다.
    pub fn key(id: impl Display) -> String {
        format!("{}:{}", T::NAMESPACE, id)
    }

    /// 캐시에서 조회합니다. 오류는 miss로 취급합니다.
    pub async fn get(&self, id: impl Display) -> Option<T> {
        let key = Self::key(id);
        match bounded(self.op_timeout, "entity get", self.store.get_json(&key)).await {
            Ok(Some(value)) => {
                record_entity_cache_lookup(T::NAMESPACE, "hit");
                Some(value)
            }
            Ok(None) => {
                record_entity_cache_lookup(T::NAMESPACE, "miss");
                None
            }
            Err(e) => {
                record_entity_cache_lookup(T::NAMESPACE, "error");
                warn!(key = %key, error = %e, "Entity cache read failed, treating as miss");
                None
            }
        }
    }

    /// 캐시에 저장합니다. 실패는 로그만 남깁니다.
    pub async fn put(&self, id: impl Display, value: &T) {
        let key = Self::key(id);
        if let Err(e) = bounded(
            self.op_timeout,
            "entity set",
            self.store.set_json(&key, value, T::TTL),
        )
        .await
        {
            warn!(key = %key, error = %e, "Entity cache write failed");
        }
    }

    /// 캐시 항목을 삭제합니다.
    ///
    /// 원천 데이터 변경 후 호출합니다. 삭제는 요청 취소와 무관하게 끝까지 수행됩니다.
    pub async fn invalidate(&self, id: impl Display) -> Result<(), DataError> {
        let store = self.store.clone();
        let limit = self.op_timeout;
        let key = Self::key(id);

        spawn_write(async move { bounded(limit, "entity delete", store.delete(&key)).await })
            .await?;
        Ok(())
    }

    /// 캐시 우선 조회 후 miss이면 `load`로 원천에서 읽어 채웁니다.
    ///
    /// 원천에 없는 엔티티는 캐시하지 않습니다.
    pub async fn get_or_load<F, Fut>(&self, id: impl Display, load: F) -> Result<Option<T>, DataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, DataError>>,
    {
        let id = id.to_string();
        if let Some(hit) = self.get(&id).await {
            return Ok(Some(hit));
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.put(&id, value).await;
        }
        Ok(loaded)
    }
}
