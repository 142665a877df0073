//! 데이터 접근 계층.
//!
//! 이 crate는 다음을 제공합니다:
//! - TTL 기반 캐시 저장소 추상화 ([`CacheStore`])와 Redis/인메모리 구현
//! - PostgreSQL 사용자/역할 repository ([`PgIdentityStore`])
//! - 외부 호출 시간 제한 및 취소 불가 쓰기 헬퍼

pub mod error;
pub mod repository;
pub mod storage;

pub use error::{DataError, Result};

// 저장소 타입 재내보내기
pub use storage::{bounded, spawn_write, CacheStore, CacheStoreExt, MemoryCache, RedisCache};

// Repository 재내보내기
pub use repository::{Database, IdentityStore, PgIdentityStore};

#[cfg(any(test, feature = "test-utils"))]
pub use repository::memory::InMemoryIdentityStore;
