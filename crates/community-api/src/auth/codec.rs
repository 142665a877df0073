//! Access token 발급/검증.
//!
//! HS256으로 서명한 짧은 수명(15분)의 JWT를 다룹니다. 만료 검사는
//! `jsonwebtoken`에 맡기지 않고 `verify_at`에 전달된 시각으로 직접 수행하므로,
//! 서명 오류(`Invalid`)와 만료(`Expired`)가 항상 구분됩니다.

use chrono::{DateTime, Duration, Utc};
use community_core::{RoleId, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Access token 수명 (초).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// JWT Access Token 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID (10진수 문자열)
    pub sub: String,
    /// 발급 시점의 역할 ID
    pub role_id: RoleId,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID
    pub jti: String,
}

/// 검증을 통과한 access token의 내용.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub user_id: UserId,
    pub role_id: RoleId,
    /// 만료 시각 (Unix timestamp)
    pub expires_at: i64,
}

/// 코덱 생성/서명 오류.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JWT 서명 키가 비어 있습니다")]
    EmptySecret,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// Access token 코덱.
///
/// 서명 키는 생성 후 변경되지 않으며, `Arc`로 공유됩니다.
#[derive(Clone)]
pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec").finish_non_exhaustive()
    }
}

impl CredentialCodec {
    /// 비밀 키로 코덱을 생성합니다. 빈 키는 거부합니다.
    pub fn new(secret: &str) -> Result<Self, CodecError> {
        if secret.trim().is_empty() {
            return Err(CodecError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// 현재 시각 기준으로 access token을 발급합니다.
    pub fn issue(&self, user_id: UserId, role_id: RoleId) -> Result<String, CodecError> {
        self.issue_at(user_id, role_id, Utc::now())
    }

    /// 주어진 시각을 `iat`로 하여 access token을 발급합니다.
    pub fn issue_at(
        &self,
        user_id: UserId,
        role_id: RoleId,
        now: DateTime<Utc>,
    ) -> Result<String, CodecError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role_id,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// 현재 시각 기준으로 access token을 검증합니다.
    pub fn verify(&self, token: &str) -> Result<VerifiedAccess, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// 주어진 시각 기준으로 access token을 검증합니다.
    ///
    /// 서명/형식/subject 오류는 `Invalid`, `now >= exp`이면 `Expired`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedAccess, AuthError> {
        let verified = self.decode_signed(token)?;
        if now.timestamp() >= verified.expires_at {
            return Err(AuthError::Expired);
        }
        Ok(verified)
    }

    /// 서명이 유효한 토큰의 남은 수명을 반환합니다. 만료 여부는 따지지 않습니다.
    ///
    /// 서명이 틀린 토큰은 `None`.
    pub fn remaining_lifetime(&self, token: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.decode_signed(token)
            .ok()
            .map(|v| Duration::seconds(v.expires_at - now.timestamp()))
    }

    fn decode_signed(&self, token: &str) -> Result<VerifiedAccess, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::Invalid)?;

        let claims = data.claims;
        let user_id: UserId = claims.sub.parse().map_err(|_| AuthError::Invalid)?;

        Ok(VerifiedAccess {
            user_id,
            role_id: claims.role_id,
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn codec() -> CredentialCodec {
        CredentialCodec::new(TEST_SECRET).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let token = codec.issue(42, 3).unwrap();

        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.role_id, 3);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            CredentialCodec::new(""),
            Err(CodecError::EmptySecret)
        ));
        assert!(matches!(
            CredentialCodec::new("   "),
            Err(CodecError::EmptySecret)
        ));
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec();
        let issued_at = Utc::now();
        let token = codec.issue_at(1, 1, issued_at).unwrap();

        let just_before = issued_at + Duration::seconds(ACCESS_TOKEN_TTL_SECS - 1);
        assert!(codec.verify_at(&token, just_before).is_ok());

        let at_expiry = issued_at + Duration::seconds(ACCESS_TOKEN_TTL_SECS);
        assert!(matches!(
            codec.verify_at(&token, at_expiry),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = codec().issue(1, 1).unwrap();
        let other = CredentialCodec::new("another-secret-key-for-jwt-testing-32-chars").unwrap();

        assert!(matches!(other.verify(&token), Err(AuthError::Invalid)));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let codec = codec();
        let token = codec.issue(1, 1).unwrap();
        let forged = codec.issue(2, 1).unwrap();

        // 서명은 그대로 두고 payload만 교체
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        assert!(matches!(codec.verify(&tampered), Err(AuthError::Invalid)));
    }

    #[test]
    fn test_expired_and_tampered_is_invalid() {
        let codec = codec();
        let issued_at = Utc::now() - Duration::hours(1);
        let token = codec.issue_at(1, 1, issued_at).unwrap();
        let tampered = format!("{}x", token);

        assert!(matches!(codec.verify(&tampered), Err(AuthError::Invalid)));
        assert!(matches!(codec.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_non_numeric_subject_is_invalid() {
        let claims = Claims {
            sub: "alice".to_string(),
            role_id: 1,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 600,
            jti: "jti".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec().verify(&token), Err(AuthError::Invalid)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            codec().verify("invalid.token.here"),
            Err(AuthError::Invalid)
        ));
        assert!(matches!(codec().verify(""), Err(AuthError::Invalid)));
    }

    #[test]
    fn test_remaining_lifetime() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at(1, 1, now).unwrap();

        let remaining = codec
            .remaining_lifetime(&token, now + Duration::minutes(5))
            .unwrap();
        assert_eq!(remaining.num_seconds(), ACCESS_TOKEN_TTL_SECS - 300);

        let dead = codec
            .remaining_lifetime(&token, now + Duration::minutes(20))
            .unwrap();
        assert!(dead.num_seconds() < 0);

        assert!(codec.remaining_lifetime("garbage", now).is_none());
    }

    proptest! {
        #[test]
        fn prop_verify_inverts_issue(user_id in any::<i64>(), role_id in any::<i64>()) {
            let codec = codec();
            let token = codec.issue(user_id, role_id).unwrap();
            let verified = codec.verify(&token).unwrap();
            prop_assert_eq!(verified.user_id, user_id);
            prop_assert_eq!(verified.role_id, role_id);
        }
    }
}
