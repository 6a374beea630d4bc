use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ProxyError;
use crate::middleware::client_ip::{ClientIp, user_agent};
use crate::router::ProxyState;

/// Check the presented key against the configured one.
/// Accepts either:
/// - Header: `x-api-key: ...`
/// - Header: `Authorization: Bearer ...`
///
/// An empty configured key rejects everything.
pub fn ensure_authorized(headers: &HeaderMap, expected: &str) -> Result<(), ProxyError> {
    if expected.is_empty() {
        return Err(ProxyError::Unauthorized);
    }

    let presented = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            let auth = headers.get("authorization")?.to_str().ok()?.trim();
            auth.strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
        });

    match presented {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(ProxyError::Unauthorized),
    }
}

/// Extractor guarding the `/api` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl<S> FromRequestParts<S> for RequireApiKey
where
    ProxyState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ProxyError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = ProxyState::from_ref(state);
        ensure_authorized(&parts.headers, &state.cfg.api_key).inspect_err(|_| {
            let ClientIp(ip) = ClientIp::from_parts(&parts.extensions, &parts.headers);
            warn!(
                ip = %ip,
                user_agent = %user_agent(&parts.headers),
                path = %parts.uri.path(),
                "unauthorized access attempt"
            );
        })?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn accepts_either_header() {
        assert!(ensure_authorized(&headers(&[("x-api-key", "s3cret")]), "s3cret").is_ok());
        assert!(
            ensure_authorized(&headers(&[("authorization", "Bearer s3cret")]), "s3cret").is_ok()
        );
    }

    #[test]
    fn rejects_wrong_missing_or_unconfigured_keys() {
        assert!(ensure_authorized(&headers(&[("x-api-key", "nope")]), "s3cret").is_err());
        assert!(ensure_authorized(&headers(&[("authorization", "s3cret")]), "s3cret").is_err());
        assert!(ensure_authorized(&HeaderMap::new(), "s3cret").is_err());
        assert!(ensure_authorized(&headers(&[("x-api-key", "")]), "").is_err());
    }
}
