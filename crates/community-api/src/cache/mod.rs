//! 엔티티 캐시.
//!
//! - [`EntityCache`]: 네임스페이스/TTL별 cache-aside 헬퍼
//! - [`UserDirectory`]: 사용자 스냅샷 (`user:{id}`, 30분)

pub mod entity;
pub mod user;

pub use entity::{CacheEntity, EntityCache};
pub use user::{UserDirectory, USER_CACHE_TTL};
