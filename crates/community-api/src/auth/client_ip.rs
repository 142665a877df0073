//! 클라이언트 IP 판별.
//!
//! refresh token은 발급 당시 IP에 묶이므로, 역방향 프록시 뒤에서는
//! `trust_forwarded_for`를 켜야 합니다.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::AppState;

/// 주소를 알 수 없을 때 사용하는 값.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 요청의 클라이언트 IP를 결정합니다.
///
/// `trust_forwarded_for`이면 `X-Forwarded-For`의 첫 항목을, 아니면 소켓 peer
/// 주소를 사용합니다.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(headers) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// 핸들러용 클라이언트 IP 추출기.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer,
            state.trust_forwarded_for,
        )))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
