//! Client address extraction from HTTP request headers.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Resolves the client IP for a request.
///
/// When `behind_proxy` is true the left-most address in `X-Forwarded-For` wins,
/// then `X-Real-IP`. Otherwise, and as a fallback, the socket peer address is used.
/// Proxy headers are ignored entirely unless `behind_proxy` is set, since any
/// client can forge them.
///
/// # Examples
///
/// ```ignore
/// let mut headers = HeaderMap::new();
/// headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
///
/// let ip = resolve_client_ip(&headers, None, true);
/// assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
/// ```
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    behind_proxy: bool,
) -> Option<IpAddr> {
    if behind_proxy {
        if let Some(ip) = header_ip(headers, X_FORWARDED_FOR, |v| v.split(',').next()) {
            return Some(ip);
        }
        if let Some(ip) = header_ip(headers, X_REAL_IP, Some) {
            return Some(ip);
        }
    }

    peer.map(|addr| addr.ip())
}

fn header_ip<'a>(
    headers: &'a HeaderMap,
    name: &str,
    pick: impl Fn(&'a str) -> Option<&'a str>,
) -> Option<IpAddr> {
    let raw = headers.get(name)?.to_str().ok()?;
    pick(raw)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:55000".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));

        let ip = resolve_client_ip(&headers, peer(), false);
        assert_eq!(ip, Some("192.0.2.10".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_left_most() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );

        let ip = resolve_client_ip(&headers, peer(), true);
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("2001:db8::1"));

        let ip = resolve_client_ip(&headers, None, true);
        assert_eq!(ip, Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_garbage_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("not-an-ip"));

        let ip = resolve_client_ip(&headers, peer(), true);
        assert_eq!(ip, Some("192.0.2.10".parse().unwrap()));
    }

    #[test]
    fn test_nothing_known() {
        let headers = HeaderMap::new();
        assert!(resolve_client_ip(&headers, None, true).is_none());
    }
}
