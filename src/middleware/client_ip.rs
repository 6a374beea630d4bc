use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{Extensions, HeaderMap, request::Parts};

/// Peer address of the TCP connection, when the server was started with connect info.
pub fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// First `x-forwarded-for` entry, trimmed.
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Best-effort caller address for logs: peer address, then `x-forwarded-for`, then `"unknown"`.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn from_parts(extensions: &Extensions, headers: &HeaderMap) -> Self {
        let ip = peer_ip(extensions)
            .map(|ip| ip.to_string())
            .or_else(|| forwarded_for(headers))
            .unwrap_or_else(|| "unknown".to_string());
        Self(ip)
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.extensions, &parts.headers))
    }
}

/// `User-Agent` as a loggable string.
pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn peer_address_wins_over_headers() {
        let mut ext = Extensions::new();
        ext.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5555))));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1"));
        assert_eq!(ClientIp::from_parts(&ext, &headers).0, "10.0.0.7");
    }

    #[test]
    fn falls_back_to_forwarded_for_then_unknown() {
        let ext = Extensions::new();
        let mut headers = HeaderMap::new();
        assert_eq!(ClientIp::from_parts(&ext, &headers).0, "unknown");
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        assert_eq!(ClientIp::from_parts(&ext, &headers).0, "203.0.113.9");
    }
}
