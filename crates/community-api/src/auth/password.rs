//! 비밀번호 해싱 유틸리티.
//!
//! Argon2id 해시는 CPU를 오래 점유하므로 비동기 경로에서는
//! [`hash_password_blocking`]/[`verify_password_blocking`]을 사용합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("비밀번호 검증 실패")]
    VerificationFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("해싱 작업 실패: {0}")]
    TaskFailed(String),
}

/// 비밀번호를 Argon2id로 해싱합니다 (PHC 형식, 솔트 포함).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(hash.to_string())
}

/// 저장된 해시와 비밀번호를 비교합니다.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// 블로킹 스레드 풀에서 해싱합니다.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

/// 블로킹 스레드 풀에서 검증합니다.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

/// 비밀번호 강도 검증.
///
/// 최소 8자, 숫자와 영문자를 각각 1개 이상 포함해야 합니다.
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("비밀번호는 최소 8자 이상이어야 합니다");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("비밀번호에 최소 1개의 숫자가 포함되어야 합니다");
    }

    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("비밀번호에 최소 1개의 영문자가 포함되어야 합니다");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("TestPassword123!").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password("TestPassword123!", &hash).is_ok());
        assert!(matches!(
            verify_password("WrongPassword123!", &hash),
            Err(PasswordError::VerificationFailed)
        ));
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "not-a-valid-hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("Password1".to_string()).await.unwrap();
        assert!(verify_password_blocking("Password1".to_string(), hash.clone())
            .await
            .is_ok());
        assert!(verify_password_blocking("Password2".to_string(), hash)
            .await
            .is_err());
    }

    #[test]
    fn test_password_strength_validation() {
        assert!(validate_password_strength("Password1").is_ok());
        assert!(validate_password_strength("Pass1").is_err());
        assert!(validate_password_strength("Password").is_err());
        assert!(validate_password_strength("12345678").is_err());
        assert!(validate_password_strength("").is_err());
    }
}
