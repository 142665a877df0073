//! 인증 쿠키.
//!
//! 두 쿠키 모두 `HttpOnly`, `SameSite=Lax`, `Path=/`이며 `Secure`는 설정으로
//! 끌 수 있습니다 (로컬 개발용).

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::codec::ACCESS_TOKEN_TTL_SECS;
use super::refresh::REFRESH_TOKEN_TTL_SECS;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn build(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// access token 쿠키 (15분).
pub fn access_cookie(token: &str, secure: bool) -> Cookie<'static> {
    build(
        ACCESS_COOKIE,
        token.to_string(),
        Duration::seconds(ACCESS_TOKEN_TTL_SECS),
        secure,
    )
}

/// refresh token 쿠키 (7일).
pub fn refresh_cookie(token: &str, secure: bool) -> Cookie<'static> {
    build(
        REFRESH_COOKIE,
        token.to_string(),
        Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        secure,
    )
}

/// 두 토큰 쿠키를 설정합니다.
pub fn set_credentials(jar: CookieJar, access: &str, refresh: &str, secure: bool) -> CookieJar {
    jar.add(access_cookie(access, secure))
        .add(refresh_cookie(refresh, secure))
}

/// 두 토큰 쿠키를 즉시 만료시킵니다 (`Max-Age=0`).
pub fn clear_credentials(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(build(ACCESS_COOKIE, String::new(), Duration::ZERO, secure))
        .add(build(REFRESH_COOKIE, String::new(), Duration::ZERO, secure))
}

/// 요청 쿠키에서 (access, refresh)를 읽습니다. 빈 값은 없는 것으로 봅니다.
pub fn read_credentials(jar: &CookieJar) -> (Option<String>, Option<String>) {
    let read = |name: &str| {
        jar.get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };
    (read(ACCESS_COOKIE), read(REFRESH_COOKIE))
}
