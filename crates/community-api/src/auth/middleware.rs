//! Axum용 인증 미들웨어 및 추출기.
//!
//! [`require_auth`]는 쿠키의 자격증명을 [`AuthGate`](super::AuthGate)로 인증하고,
//! 성공하면 [`AuthContext`]와 [`SessionCredentials`]를 request extensions에
//! 넣습니다. 게이트가 토큰을 새로 발급했다면 응답에 쿠키를 설정합니다.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use community_core::auth_span;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

use super::client_ip::client_ip;
use super::cookies::{clear_credentials, read_credentials, set_credentials, ACCESS_COOKIE};
use super::{AuthContext, SessionCredentials};
use crate::error::{authentication_failed, ApiError};
use crate::state::AppState;

/// 인증이 필요한 라우트에 적용하는 미들웨어.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, state.trust_forwarded_for);
    let (access, refresh) = read_credentials(&jar);

    let span = auth_span!("authenticate", ip);
    let result = state
        .gate
        .authenticate(access.as_deref(), refresh.as_deref(), &ip)
        .instrument(span.clone())
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            let error = ApiError::from(&failure);
            if failure.clears_cookies() {
                let jar = clear_credentials(jar, state.secure_cookies);
                return (jar, error).into_response();
            }
            return error.into_response();
        }
    };

    span.record("user_id", outcome.context.user_id);

    request.extensions_mut().insert(outcome.context);
    request
        .extensions_mut()
        .insert(outcome.credentials.clone());
    let response = next.run(request).instrument(span).await;

    // 핸들러가 직접 쿠키를 다시 설정한 경우(비밀번호 변경 등)에는 덮어쓰지 않음
    if outcome.reissued && !sets_access_cookie(&response) {
        let SessionCredentials { access, refresh } = outcome.credentials;
        if let Some(refresh) = refresh {
            let jar = set_credentials(CookieJar::new(), &access, &refresh, state.secure_cookies);
            return (jar, response).into_response();
        }
    }

    response
}

fn sets_access_cookie(response: &Response) -> bool {
    let prefix = format!("{}=", ACCESS_COOKIE);
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// 인증된 사용자 추출기.
///
/// [`require_auth`]가 적용된 라우트에서만 사용할 수 있으며, 그렇지 않으면 401을
/// 반환합니다.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub AuthContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .map(CurrentUser)
            .ok_or_else(authentication_failed)
    }
}
