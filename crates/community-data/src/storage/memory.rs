//! 인메모리 cache 구현.
//!
//! Redis가 구성되지 않은 단일 프로세스 환경과 테스트에서 사용합니다.
//! 만료 시간은 `tokio::time::Instant` 기준이므로 `tokio::time::pause()` 로
//! TTL 동작을 결정적으로 검증할 수 있습니다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::CacheStore;
use crate::error::{DataError, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// 프로세스 내부 TTL cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    offline: Arc<AtomicBool>,
    read_latency_ms: Arc<AtomicU64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 장애 주입: `true`이면 모든 명령이 [`DataError::CacheError`]로 실패합니다.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 장애 주입: `GET` 응답을 주어진 시간만큼 지연시킵니다.
    ///
    /// 다른 명령에는 영향을 주지 않습니다. `Duration::ZERO`로 해제합니다.
    pub fn set_read_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.read_latency_ms.store(millis, Ordering::SeqCst);
    }

    /// 만료되지 않은 항목 수.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 만료된 항목을 제거하고 제거한 개수를 반환합니다.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DataError::CacheError("memory cache offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_online()?;
        let latency = self.read_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        Ok(self.lookup(key).await)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.ensure_online()?;
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_online()?;
        let now = Instant::now();
        let removed = self.entries.lock().await.remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.ensure_online()?;
        let now = Instant::now();
        // 조회와 삭제가 같은 잠금 안에서 일어나야 GETDEL과 같은 의미가 됩니다.
        let removed = self.entries.lock().await.remove(key);
        Ok(removed.filter(|e| e.is_live(now)).map(|e| e.value))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.ensure_online()?;
        Ok(self.lookup(key).await.is_some())
    }

    async fn ping(&self) -> Result<bool> {
        self.ensure_online()?;
        Ok(true)
    }
}
