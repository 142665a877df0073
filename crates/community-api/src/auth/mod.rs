//! 인증 및 권한 부여.
//!
//! # 구성 요소
//!
//! - [`CredentialCodec`]: access token(JWT, 15분) 발급/검증
//! - [`RefreshRegistry`]: IP에 묶인 1회용 refresh token(7일)
//! - [`RevocationLedger`]: 만료 전 폐기된 토큰 목록
//! - [`PermissionResolver`]: 역할별 권한 판정 (24시간 캐시)
//! - [`AuthGate`]: 요청 인증 상태 기계
//! - [`require_auth`]: 게이트를 적용하는 axum 미들웨어
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(CurrentUser(ctx): CurrentUser) -> impl IntoResponse {
//!     format!("Hello, user {}!", ctx.user_id)
//! }
//! ```

pub mod client_ip;
pub mod codec;
pub mod cookies;
mod error;
mod gate;
mod middleware;
pub mod password;
mod permission;
pub mod refresh;
mod revocation;

pub use client_ip::ClientIp;
pub use codec::{Claims, CodecError, CredentialCodec, VerifiedAccess, ACCESS_TOKEN_TTL_SECS};
pub use error::{AuthError, GateFailure, RejectReason};
pub use gate::{AuthContext, AuthGate, GateOutcome, SessionCredentials};
pub use middleware::{require_auth, CurrentUser};
pub use password::{hash_password, verify_password, PasswordError};
pub use permission::{CachedPermissionSet, PermissionResolver, PERMISSION_CACHE_TTL};
pub use refresh::{RefreshRecord, RefreshRegistry, RotatedRefresh, REFRESH_TOKEN_TTL_SECS};
pub use revocation::RevocationLedger;
