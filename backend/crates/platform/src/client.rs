//! Client identification utilities
//!
//! The client address is the socket peer. Forwarding headers
//! (`X-Forwarded-For`, `X-Real-IP`) are only believed when that peer is a
//! configured trusted proxy; anyone else could put any address there.

use crate::config::{env_flag, env_opt};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Extensions, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Label used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Proxies allowed to report the client address and identity headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedProxies {
    /// Explicitly trusted proxy addresses
    pub proxies: Vec<IpAddr>,
    /// Trust loopback peers (a reverse proxy on the same host)
    pub trust_loopback: bool,
}

impl Default for TrustedProxies {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            trust_loopback: true,
        }
    }
}

impl TrustedProxies {
    /// No peer is trusted; forwarding headers are always ignored.
    pub fn none() -> Self {
        Self {
            proxies: Vec::new(),
            trust_loopback: false,
        }
    }

    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self {
            proxies,
            trust_loopback: false,
        }
    }

    /// `TRUSTED_PROXIES` (comma-separated addresses) and
    /// `TRUST_LOOPBACK_PROXY`.
    pub fn from_env() -> Self {
        Self {
            proxies: env_opt("TRUSTED_PROXIES")
                .map(|raw| parse_proxies(&raw))
                .unwrap_or_default(),
            trust_loopback: env_flag("TRUST_LOOPBACK_PROXY", true),
        }
    }

    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.proxies.contains(&ip) || (self.trust_loopback && ip.is_loopback())
    }

    /// Resolve the client behind `peer`.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> ClientAddr {
        let Some(peer) = peer.filter(|ip| self.is_trusted(*ip)) else {
            return ClientAddr {
                ip: peer,
                via_trusted_proxy: false,
            };
        };
        ClientAddr {
            ip: Some(self.forwarded_client(headers).unwrap_or(peer)),
            via_trusted_proxy: true,
        }
    }

    /// Rightmost `X-Forwarded-For` hop that is not one of our proxies,
    /// then `X-Real-IP`.
    fn forwarded_client(&self, headers: &HeaderMap) -> Option<IpAddr> {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            let hops: Vec<IpAddr> = xff
                .split(',')
                .filter_map(|hop| hop.trim().parse().ok())
                .collect();
            if let Some(ip) = hops.iter().rev().find(|ip| !self.is_trusted(**ip)) {
                return Some(*ip);
            }
            if let Some(ip) = hops.first() {
                return Some(*ip);
            }
        }
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

fn parse_proxies(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry, "Ignoring invalid trusted proxy address");
                None
            }
        })
        .collect()
}

/// Resolved client address, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr {
    pub ip: Option<IpAddr>,
    /// The request arrived through a trusted proxy
    pub via_trusted_proxy: bool,
}

/// Client address for a request: the resolved [`ClientAddr`] when
/// [`resolve_client`] ran, otherwise the bare socket peer.
pub fn client_addr(extensions: &Extensions) -> ClientAddr {
    if let Some(addr) = extensions.get::<ClientAddr>() {
        return *addr;
    }
    ClientAddr {
        ip: extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip()),
        via_trusted_proxy: false,
    }
}

/// Middleware storing the resolved [`ClientAddr`] for inner layers.
pub async fn resolve_client(
    State(proxies): State<Arc<TrustedProxies>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let addr = proxies.resolve(req.headers(), peer);

    if !addr.via_trusted_proxy && req.headers().contains_key("x-forwarded-for") {
        tracing::debug!(
            peer = %client_ip_label(peer),
            "Ignoring X-Forwarded-For from untrusted peer"
        );
    }

    req.extensions_mut().insert(addr);
    next.run(req).await
}

/// Client IP rendered for keys and log records.
pub fn client_ip_label(ip: Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// User-Agent header, if present and valid UTF-8.
pub fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    fn proxy() -> TrustedProxies {
        TrustedProxies::new(vec![ip("10.0.0.1")])
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarding_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));

        let addr = proxy().resolve(&headers, Some(ip("198.51.100.9")));
        assert_eq!(addr.ip, Some(ip("198.51.100.9")));
        assert!(!addr.via_trusted_proxy);
    }

    #[test]
    fn test_trusted_peer_uses_rightmost_untrusted_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 192.168.1.1, 10.0.0.1"),
        );

        let addr = proxy().resolve(&headers, Some(ip("10.0.0.1")));
        assert_eq!(addr.ip, Some(ip("192.168.1.1")));
        assert!(addr.via_trusted_proxy);
    }

    #[test]
    fn test_trusted_peer_real_ip_and_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.1.2.3"));
        assert_eq!(
            proxy().resolve(&headers, Some(ip("10.0.0.1"))).ip,
            Some(ip("10.1.2.3"))
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(
            proxy().resolve(&headers, Some(ip("10.0.0.1"))).ip,
            Some(ip("10.0.0.1"))
        );
    }

    #[test]
    fn test_loopback_trust_and_missing_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));

        let addr = TrustedProxies::default().resolve(&headers, Some(ip("127.0.0.1")));
        assert_eq!(addr.ip, Some(ip("203.0.113.9")));
        assert!(!TrustedProxies::none().is_trusted(ip("127.0.0.1")));

        let addr = TrustedProxies::default().resolve(&headers, None);
        assert_eq!(addr.ip, None);
        assert!(!addr.via_trusted_proxy);
    }

    #[test]
    fn test_client_addr_falls_back_to_peer() {
        let mut extensions = Extensions::new();
        assert_eq!(client_addr(&extensions).ip, None);

        extensions.insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 9], 4000))));
        let addr = client_addr(&extensions);
        assert_eq!(addr.ip, Some(ip("198.51.100.9")));
        assert!(!addr.via_trusted_proxy);
    }

    #[test]
    fn test_parse_proxies_skips_garbage() {
        assert_eq!(
            parse_proxies("10.0.0.1, nope, ,::1"),
            vec![ip("10.0.0.1"), ip("::1")]
        );
    }

    #[test]
    fn test_client_ip_label() {
        assert_eq!(client_ip_label(None), "unknown");
        assert_eq!(client_ip_label(Some(ip("10.0.0.7"))), "10.0.0.7");
    }

    #[test]
    fn test_user_agent() {
        let mut headers = HeaderMap::new();
        assert!(user_agent(&headers).is_none());
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("curl/8.0"),
        );
        assert_eq!(user_agent(&headers), Some("curl/8.0"));
    }
}
