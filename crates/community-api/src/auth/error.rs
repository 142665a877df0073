//! 인증 오류 분류.

use community_data::DataError;

/// 인증 컴포넌트 공통 오류.
///
/// `Unavailable`을 제외한 모든 변형은 요청 거부로 끝납니다.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("유효하지 않은 자격증명")]
    Invalid,
    #[error("만료된 자격증명")]
    Expired,
    #[error("refresh token을 찾을 수 없습니다")]
    NotFound,
    #[error("refresh token의 IP가 일치하지 않습니다")]
    IpMismatch,
    #[error("토큰의 역할이 현재 사용자 역할과 다릅니다")]
    RoleMismatch,
    #[error("인증 저장소를 사용할 수 없습니다: {0}")]
    Unavailable(String),
}

impl From<DataError> for AuthError {
    fn from(err: DataError) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}

/// 게이트 거부 사유.
///
/// 응답 본문에는 드러나지 않고 로그와 메트릭 라벨로만 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 폐기 목록에 있는 자격증명
    Revoked,
    /// 유효한 자격증명 없음 (없음, 위조, 만료 후 갱신 실패)
    AuthenticationRequired,
    /// 토큰의 사용자가 더 이상 존재하지 않음
    UserNotFound,
    /// 토큰 발급 이후 역할이 변경됨
    RoleMismatch,
}

impl RejectReason {
    /// 메트릭 라벨.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Revoked => "revoked",
            RejectReason::AuthenticationRequired => "authentication_required",
            RejectReason::UserNotFound => "user_not_found",
            RejectReason::RoleMismatch => "role_mismatch",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 인증 게이트 실패.
#[derive(Debug, thiserror::Error)]
pub enum GateFailure {
    /// 요청 거부 (HTTP 401)
    #[error("rejected: {0}")]
    Rejected(RejectReason),
    /// 관계형 저장소 장애 (HTTP 500)
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(String),
    /// refresh registry / revocation ledger 캐시 장애 (HTTP 503)
    #[error("credential cache unavailable: {0}")]
    CacheUnavailable(String),
    /// 토큰 서명 실패 등 내부 오류 (HTTP 500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateFailure {
    pub fn rejected(reason: RejectReason) -> Self {
        GateFailure::Rejected(reason)
    }

    /// 응답에서 두 쿠키를 모두 지워야 하는지 여부.
    pub fn clears_cookies(&self) -> bool {
        matches!(self, GateFailure::Rejected(RejectReason::UserNotFound))
    }
}
