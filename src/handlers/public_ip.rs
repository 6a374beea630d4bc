use axum::{Json, http::HeaderMap};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::UserAgent;

use crate::middleware::client_ip::forwarded_for;
use crate::types::envelope::{DataEnvelope, ForwardingHeaders, PublicIpInfo};

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `cf-connecting-ip`, then the first `x-forwarded-for` hop, then `x-real-ip`.
pub fn resolve_client_ip(headers: &HeaderMap) -> String {
    header(headers, "cf-connecting-ip")
        .or_else(|| forwarded_for(headers))
        .or_else(|| header(headers, "x-real-ip"))
        .unwrap_or_else(|| "unknown".to_string())
}

/// `GET /get-public-ip`
pub async fn public_ip_handler(
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
) -> Json<DataEnvelope<PublicIpInfo>> {
    let country = header(&headers, "cf-ipcountry").unwrap_or_else(|| "unknown".to_string());

    DataEnvelope::ok(PublicIpInfo {
        ip: resolve_client_ip(&headers),
        timestamp: Utc::now().to_rfc3339(),
        user_agent: user_agent
            .map(|TypedHeader(ua)| ua.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        country: country.clone(),
        headers: ForwardingHeaders {
            x_forwarded_for: header(&headers, "x-forwarded-for"),
            x_real_ip: header(&headers, "x-real-ip"),
            cf_connecting_ip: header(&headers, "cf-connecting-ip"),
            cf_ipcountry: country,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cloudflare_header_has_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.3"));
        assert_eq!(resolve_client_ip(&headers), "10.0.0.3");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        assert_eq!(resolve_client_ip(&headers), "198.51.100.4");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(resolve_client_ip(&headers), "203.0.113.5");
    }

    #[test]
    fn no_headers_is_unknown() {
        assert_eq!(resolve_client_ip(&HeaderMap::new()), "unknown");
    }
}
