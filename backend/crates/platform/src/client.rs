//! Client identification utilities
//!
//! Resolves the caller's IP address from proxy headers, falling back to the
//! socket peer address.

use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Headers consulted in order before the socket address.
///
/// Values equal to `unknown` are skipped, as some proxies emit that literally.
pub const CLIENT_IP_HEADERS: [&str; 5] = [
    "x-forwarded-for",
    "proxy-client-ip",
    "wl-proxy-client-ip",
    "http_client_ip",
    "http_x_forwarded_for",
];

/// Resolve the client IP address.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `remote` - socket peer address, if the server exposes it
///
/// ## Returns
/// The first parseable address from the header chain (first token of a
/// comma-separated list), else `remote`. IPv6 loopback becomes `127.0.0.1`.
pub fn resolve_client_ip(headers: &HeaderMap, remote: Option<IpAddr>) -> Option<IpAddr> {
    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .filter_map(first_token)
        .find_map(parse_ip)
        .or(remote)
        .map(normalize_loopback)
}

fn first_token(value: &str) -> Option<&str> {
    let token = value.split(',').next()?.trim();
    if token.is_empty() || token.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(token)
    }
}

/// Accepts a bare address or one carrying a port (`1.2.3.4:80`, `[::1]:80`)
fn parse_ip(token: &str) -> Option<IpAddr> {
    token
        .parse::<IpAddr>()
        .ok()
        .or_else(|| token.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn normalize_loopback(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) if v6.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn direct() -> Option<IpAddr> {
        Some("10.0.0.9".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_wins_over_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));

        let ip = resolve_client_ip(&headers, direct());
        assert_eq!(ip, Some("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn test_first_token_of_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = resolve_client_ip(&headers, None);
        assert_eq!(ip, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn test_socket_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_client_ip(&headers, direct()), direct());
        assert_eq!(resolve_client_ip(&headers, None), None);
    }

    #[test]
    fn test_ipv6_loopback_normalized() {
        let headers = HeaderMap::new();
        let ip = resolve_client_ip(&headers, Some("::1".parse().unwrap()));
        assert_eq!(ip, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("[::1]:8080"));
        let ip = resolve_client_ip(&headers, None);
        assert_eq!(ip, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn test_unknown_and_garbage_fall_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert("proxy-client-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("wl-proxy-client-ip", HeaderValue::from_static("5.6.7.8"));

        let ip = resolve_client_ip(&headers, direct());
        assert_eq!(ip, Some("5.6.7.8".parse().unwrap()));
    }

    #[test]
    fn test_underscore_headers_are_consulted() {
        let mut headers = HeaderMap::new();
        headers.insert("http_client_ip", HeaderValue::from_static("8.8.4.4"));

        let ip = resolve_client_ip(&headers, direct());
        assert_eq!(ip, Some("8.8.4.4".parse().unwrap()));
    }

    #[test]
    fn test_port_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7:51234"),
        );

        let ip = resolve_client_ip(&headers, None);
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
    }
}
