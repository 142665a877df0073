//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 `Arc`로 래핑되어 요청 간에 공유됩니다. 내부 컴포넌트는 모두
//! 읽기 전용이며, 가변 상태는 캐시 저장소와 관계형 저장소에만 있습니다.

use std::sync::Arc;
use std::time::Duration;

use community_data::{bounded, CacheStore, IdentityStore};

use crate::auth::{
    AuthGate, CachedPermissionSet, CredentialCodec, PermissionResolver, RefreshRegistry,
    RevocationLedger,
};
use crate::cache::{EntityCache, UserDirectory};

/// 헬스 체크 ping 제한 시간.
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// Access token 코덱 (서명 키 보유)
    pub codec: Arc<CredentialCodec>,

    /// Refresh token 발급/교체
    pub refresh: RefreshRegistry,

    /// 폐기 목록
    pub ledger: RevocationLedger,

    /// 캐시 우선 사용자 조회
    pub users: UserDirectory,

    /// 역할 권한 판정
    pub permissions: PermissionResolver,

    /// 요청 인증 게이트
    pub gate: AuthGate,

    /// 사용자/역할 원천 저장소
    pub store: Arc<dyn IdentityStore>,

    /// 공유 캐시 저장소
    pub cache: Arc<dyn CacheStore>,

    /// 캐시 백엔드 이름 ("redis" | "memory")
    pub cache_backend: &'static str,

    /// 쿠키 Secure 속성 부여 여부
    pub secure_cookies: bool,

    /// `X-Forwarded-For` 신뢰 여부
    pub trust_forwarded_for: bool,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    ///
    /// # 인자
    /// * `codec` - access token 코덱
    /// * `cache` - refresh registry, 폐기 목록, 엔티티 캐시가 공유하는 저장소
    /// * `store` - 사용자/역할 원천 저장소
    /// * `cache_timeout` - 캐시 명령 하나의 제한 시간
    pub fn new(
        codec: CredentialCodec,
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn IdentityStore>,
        cache_timeout: Duration,
    ) -> Self {
        let codec = Arc::new(codec);
        let refresh = RefreshRegistry::new(cache.clone(), cache_timeout);
        let ledger = RevocationLedger::new(cache.clone(), cache_timeout);
        let users = UserDirectory::new(
            EntityCache::new(cache.clone(), cache_timeout),
            store.clone(),
        );
        let permissions = PermissionResolver::new(
            EntityCache::<CachedPermissionSet>::new(cache.clone(), cache_timeout),
            store.clone(),
        );
        let gate = AuthGate::new(codec.clone(), refresh.clone(), ledger.clone(), users.clone());

        Self {
            codec,
            refresh,
            ledger,
            users,
            permissions,
            gate,
            store,
            cache,
            cache_backend: "memory",
            secure_cookies: true,
            trust_forwarded_for: false,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 캐시 백엔드 이름 설정.
    pub fn with_cache_backend(mut self, name: &'static str) -> Self {
        self.cache_backend = name;
        self
    }

    /// 쿠키 Secure 속성 설정.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// `X-Forwarded-For` 신뢰 설정.
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// 관계형 저장소 상태 확인.
    pub async fn is_store_healthy(&self) -> bool {
        bounded(HEALTH_PING_TIMEOUT, "store ping", self.store.ping())
            .await
            .unwrap_or(false)
    }

    /// 캐시 저장소 상태 확인.
    pub async fn is_cache_healthy(&self) -> bool {
        bounded(HEALTH_PING_TIMEOUT, "cache ping", self.cache.ping())
            .await
            .unwrap_or(false)
    }
}

/// 테스트용 AppState 생성 (인메모리 캐시/저장소, Secure 쿠키 끔).
#[cfg(test)]
pub fn create_test_state(
    cache: community_data::MemoryCache,
    store: community_data::InMemoryIdentityStore,
) -> AppState {
    let codec = CredentialCodec::new("test-secret-key-for-jwt-testing-minimum-32-chars")
        .unwrap_or_else(|e| panic!("test codec: {e}"));
    AppState::new(
        codec,
        Arc::new(cache),
        Arc::new(store),
        Duration::from_millis(250),
    )
    .with_secure_cookies(false)
}
