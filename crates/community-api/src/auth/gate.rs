//! 요청 인증 게이트.
//!
//! 쿠키로 전달된 access/refresh token을 다음 순서로 처리합니다.
//!
//! 1. 두 토큰 중 하나라도 폐기 목록에 있으면 거부
//! 2. access token이 없으면 refresh token을 교체하고 새 access token 발급
//! 3. access token 검증. 만료된 경우에만 2단계를 한 번 더 수행 후 재검증
//! 4. 사용자 조회 (캐시 우선). 없으면 거부하고 쿠키 삭제
//! 5. 토큰의 역할과 현재 역할이 다르면 거부
//! 6. 인증 성공: [`AuthContext`]

use community_core::{RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AuthError, CredentialCodec, GateFailure, RefreshRegistry, RejectReason, RevocationLedger};
use crate::cache::UserDirectory;
use crate::metrics::record_auth_rejection;

/// 인증된 요청의 주체. 하위 핸들러는 request extensions에서 읽습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role_id: RoleId,
}

/// 게이트 통과 후 유효한 자격증명.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access: String,
    pub refresh: Option<String>,
}

/// 인증 결과.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub context: AuthContext,
    pub credentials: SessionCredentials,
    /// 이번 요청에서 토큰을 새로 발급했는지 여부 (응답에 쿠키 설정 필요)
    pub reissued: bool,
}

/// refresh 교체로 새로 발급된 토큰 쌍.
struct Reissued {
    access: String,
    refresh: String,
}

/// 인증 게이트.
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<CredentialCodec>,
    refresh: RefreshRegistry,
    ledger: RevocationLedger,
    users: UserDirectory,
}

impl AuthGate {
    pub fn new(
        codec: Arc<CredentialCodec>,
        refresh: RefreshRegistry,
        ledger: RevocationLedger,
        users: UserDirectory,
    ) -> Self {
        Self {
            codec,
            refresh,
            ledger,
            users,
        }
    }

    /// 요청의 자격증명을 인증합니다.
    pub async fn authenticate(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
        ip: &str,
    ) -> Result<GateOutcome, GateFailure> {
        let result = self.run(access, refresh, ip).await;

        if let Err(failure) = &result {
            match failure {
                GateFailure::Rejected(reason) => {
                    record_auth_rejection(reason.as_str());
                    info!(reason = %reason, "Authentication rejected");
                }
                other => {
                    record_auth_rejection("unavailable");
                    warn!(error = %other, "Authentication could not be completed");
                }
            }
        }

        result
    }

    async fn run(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
        ip: &str,
    ) -> Result<GateOutcome, GateFailure> {
        for token in [access, refresh].into_iter().flatten() {
            if self.ledger.contains(token).await.map_err(cache_failure)? {
                return Err(GateFailure::rejected(RejectReason::Revoked));
            }
        }

        let mut credentials = SessionCredentials {
            access: String::new(),
            refresh: refresh.map(str::to_string),
        };
        let mut reissued = false;

        match access {
            Some(token) => credentials.access = token.to_string(),
            None => {
                let pair = self.reissue(refresh, ip).await?;
                credentials.access = pair.access;
                credentials.refresh = Some(pair.refresh);
                reissued = true;
            }
        }

        let verified = match self.codec.verify(&credentials.access) {
            Ok(verified) => verified,
            Err(AuthError::Expired) if !reissued => {
                debug!("Access token expired, rotating refresh token");
                let pair = self.reissue(refresh, ip).await?;
                credentials.access = pair.access;
                credentials.refresh = Some(pair.refresh);
                reissued = true;

                self.codec
                    .verify(&credentials.access)
                    .map_err(|_| GateFailure::rejected(RejectReason::AuthenticationRequired))?
            }
            Err(_) => return Err(GateFailure::rejected(RejectReason::AuthenticationRequired)),
        };

        let user = self
            .users
            .find(verified.user_id)
            .await
            .map_err(|e| GateFailure::StoreUnavailable(e.to_string()))?
            .ok_or(GateFailure::rejected(RejectReason::UserNotFound))?;

        if verified.role_id != user.role_id() {
            return Err(GateFailure::rejected(RejectReason::RoleMismatch));
        }

        Ok(GateOutcome {
            context: AuthContext {
                user_id: verified.user_id,
                role_id: verified.role_id,
            },
            credentials,
            reissued,
        })
    }

    /// refresh token을 교체하고 사용자의 현재 역할로 access token을 발급합니다.
    async fn reissue(&self, refresh: Option<&str>, ip: &str) -> Result<Reissued, GateFailure> {
        let Some(old) = refresh else {
            return Err(GateFailure::rejected(RejectReason::AuthenticationRequired));
        };

        let rotated = match self.refresh.rotate(old, ip).await {
            Ok(rotated) => rotated,
            Err(AuthError::Unavailable(e)) => return Err(GateFailure::CacheUnavailable(e)),
            Err(e) => {
                debug!(error = %e, "Refresh token rotation refused");
                return Err(GateFailure::rejected(RejectReason::AuthenticationRequired));
            }
        };

        // 새 토큰은 클라이언트에 전달될 때만 남깁니다.
        let issued = match self.users.find(rotated.user_id).await {
            Ok(Some(user)) => self
                .codec
                .issue(user.id(), user.role_id())
                .map(|access| (user, access))
                .map_err(|e| GateFailure::Internal(e.to_string())),
            Ok(None) => Err(GateFailure::rejected(RejectReason::UserNotFound)),
            Err(e) => Err(GateFailure::StoreUnavailable(e.to_string())),
        };
        let (user, access) = match issued {
            Ok(issued) => issued,
            Err(failure) => {
                self.refresh.discard(&rotated.token).await;
                return Err(failure);
            }
        };

        info!(user_id = user.id(), "Credentials refreshed");
        Ok(Reissued {
            access,
            refresh: rotated.token,
        })
    }
}

fn cache_failure(err: AuthError) -> GateFailure {
    match err {
        AuthError::Unavailable(e) => GateFailure::CacheUnavailable(e),
        other => GateFailure::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntityCache;
    use chrono::{Duration as ChronoDuration, Utc};
    use community_core::{Permission, Role};
    use community_data::{InMemoryIdentityStore, MemoryCache};
    use std::time::Duration;

    const SECRET: &str = "gate-test-secret-key-minimum-32-characters";
    const IP: &str = "203.0.113.7";

    struct Fixture {
        gate: AuthGate,
        codec: Arc<CredentialCodec>,
        refresh: RefreshRegistry,
        ledger: RevocationLedger,
        cache: MemoryCache,
        store: InMemoryIdentityStore,
    }

    fn fixture() -> Fixture {
        let cache = MemoryCache::new();
        let store = InMemoryIdentityStore::new();
        store.insert_role(Role {
            id: 1,
            name: "member".to_string(),
            permissions: vec![Permission {
                id: 1,
                name: "create_post".to_string(),
            }],
        });
        store.insert_role(Role {
            id: 2,
            name: "admin".to_string(),
            permissions: vec![],
        });
        store.insert_user(10, "alice", 1, "hash");

        let timeout = Duration::from_millis(250);
        let shared: Arc<dyn community_data::CacheStore> = Arc::new(cache.clone());
        let codec = Arc::new(CredentialCodec::new(SECRET).unwrap());
        let refresh = RefreshRegistry::new(shared.clone(), timeout);
        let ledger = RevocationLedger::new(shared.clone(), timeout);
        let users = UserDirectory::new(
            EntityCache::new(shared, timeout),
            Arc::new(store.clone()),
        );
        let gate = AuthGate::new(codec.clone(), refresh.clone(), ledger.clone(), users);

        Fixture {
            gate,
            codec,
            refresh,
            ledger,
            cache,
            store,
        }
    }

    fn reason(result: Result<GateOutcome, GateFailure>) -> RejectReason {
        match result {
            Err(GateFailure::Rejected(reason)) => reason,
            other => panic!("expected rejection, got {:?}", other.map(|o| o.context)),
        }
    }

    #[tokio::test]
    async fn test_valid_access_token() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();

        let outcome = f.gate.authenticate(Some(&access), None, IP).await.unwrap();
        assert_eq!(
            outcome.context,
            AuthContext {
                user_id: 10,
                role_id: 1
            }
        );
        assert!(!outcome.reissued);
    }

    #[tokio::test]
    async fn test_no_credentials_rejected() {
        let f = fixture();
        assert_eq!(
            reason(f.gate.authenticate(None, None, IP).await),
            RejectReason::AuthenticationRequired
        );
    }

    #[tokio::test]
    async fn test_missing_access_uses_refresh() {
        let f = fixture();
        let refresh = f.refresh.issue(10, IP).await.unwrap();

        let outcome = f.gate.authenticate(None, Some(&refresh), IP).await.unwrap();
        assert!(outcome.reissued);
        assert_eq!(outcome.context.user_id, 10);

        let new_refresh = outcome.credentials.refresh.unwrap();
        assert_ne!(new_refresh, refresh);
        assert!(f.refresh.lookup(&refresh).await.unwrap().is_none());
        assert!(f.codec.verify(&outcome.credentials.access).is_ok());
    }

    #[tokio::test]
    async fn test_expired_access_refreshes_once() {
        let f = fixture();
        let expired = f
            .codec
            .issue_at(10, 1, Utc::now() - ChronoDuration::minutes(20))
            .unwrap();
        let refresh = f.refresh.issue(10, IP).await.unwrap();

        let outcome = f
            .gate
            .authenticate(Some(&expired), Some(&refresh), IP)
            .await
            .unwrap();
        assert!(outcome.reissued);
        assert_ne!(outcome.credentials.access, expired);
    }

    #[tokio::test]
    async fn test_expired_access_without_refresh_rejected() {
        let f = fixture();
        let expired = f
            .codec
            .issue_at(10, 1, Utc::now() - ChronoDuration::minutes(20))
            .unwrap();

        assert_eq!(
            reason(f.gate.authenticate(Some(&expired), None, IP).await),
            RejectReason::AuthenticationRequired
        );
    }

    #[tokio::test]
    async fn test_forged_access_not_refreshed() {
        let f = fixture();
        let refresh = f.refresh.issue(10, IP).await.unwrap();

        assert_eq!(
            reason(
                f.gate
                    .authenticate(Some("forged.token.value"), Some(&refresh), IP)
                    .await
            ),
            RejectReason::AuthenticationRequired
        );
        // 위조 토큰은 refresh 교체를 일으키지 않음
        assert!(f.refresh.lookup(&refresh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoked_access_rejected_even_if_valid() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();
        f.ledger
            .add(&access, ChronoDuration::minutes(15))
            .await
            .unwrap();

        assert_eq!(
            reason(f.gate.authenticate(Some(&access), None, IP).await),
            RejectReason::Revoked
        );
    }

    #[tokio::test]
    async fn test_revoked_refresh_rejected() {
        let f = fixture();
        let refresh = f.refresh.issue(10, IP).await.unwrap();
        f.ledger
            .add(&refresh, ChronoDuration::days(7))
            .await
            .unwrap();

        assert_eq!(
            reason(f.gate.authenticate(None, Some(&refresh), IP).await),
            RejectReason::Revoked
        );
    }

    #[tokio::test]
    async fn test_ip_mismatch_rejected_and_consumed() {
        let f = fixture();
        let refresh = f.refresh.issue(10, IP).await.unwrap();

        assert_eq!(
            reason(f.gate.authenticate(None, Some(&refresh), "198.51.100.1").await),
            RejectReason::AuthenticationRequired
        );
        assert_eq!(
            reason(f.gate.authenticate(None, Some(&refresh), IP).await),
            RejectReason::AuthenticationRequired
        );
    }

    #[tokio::test]
    async fn test_missing_user_rejected() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();
        f.store.remove_user(10);

        let result = f.gate.authenticate(Some(&access), None, IP).await;
        let failure = result.unwrap_err();
        assert!(failure.clears_cookies());
    }

    #[tokio::test]
    async fn test_role_change_rejects_old_token() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();
        f.store.set_user_role(10, 2);

        assert_eq!(
            reason(f.gate.authenticate(Some(&access), None, IP).await),
            RejectReason::RoleMismatch
        );
    }

    #[tokio::test]
    async fn test_ledger_outage_fails_closed() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();
        f.cache.set_offline(true);

        assert!(matches!(
            f.gate.authenticate(Some(&access), None, IP).await,
            Err(GateFailure::CacheUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_store_outage_is_store_unavailable() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();
        f.store.set_offline(true);

        assert!(matches!(
            f.gate.authenticate(Some(&access), None, IP).await,
            Err(GateFailure::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_user_leaves_no_live_refresh() {
        let f = fixture();
        let refresh = f.refresh.issue(10, IP).await.unwrap();
        f.store.remove_user(10);

        let failure = f.gate.authenticate(None, Some(&refresh), IP).await.unwrap_err();
        assert!(failure.clears_cookies());
        assert!(f.cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_user_cache_falls_back_to_store() {
        let f = fixture();
        let access = f.codec.issue(10, 1).unwrap();
        f.gate.authenticate(Some(&access), None, IP).await.unwrap();
        assert_eq!(f.store.user_loads(), 1);

        f.cache.set_read_latency(Duration::from_secs(5));
        let outcome = f.gate.authenticate(Some(&access), None, IP).await.unwrap();

        assert_eq!(outcome.context.user_id, 10);
        assert_eq!(f.store.user_loads(), 2);
    }
}
