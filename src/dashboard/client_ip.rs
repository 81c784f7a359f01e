//! Client IP resolution strategies.
//!
//! Login throttling is keyed by client IP. Which address counts as the
//! client depends on the deployment, so the guard takes a resolver instead
//! of hardcoding one.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};

/// Key used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Determines the client address of a request.
pub trait ClientIpResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String;
}

/// Uses the transport-level peer address only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeerAddress;

impl ClientIpResolver for PeerAddress {
    fn resolve(&self, _headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        peer_ip(peer)
    }
}

/// Trusts a reverse-proxy forwarding header, falling back to the peer
/// address when the header is absent or unparsable.
///
/// For list-valued headers the last entry is used: it is the one appended by
/// the proxy itself, while earlier entries come from the client.
#[derive(Debug, Clone)]
pub struct ForwardedHeader {
    header: HeaderName,
}

impl Default for ForwardedHeader {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("x-forwarded-for"),
        }
    }
}

impl ForwardedHeader {
    /// Trust a different header (e.g. `cf-connecting-ip`).
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl ClientIpResolver for ForwardedHeader {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .and_then(|v| v.parse::<IpAddr>().ok())
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| peer_ip(peer))
    }
}

/// Resolver for the configured deployment.
pub fn resolver(trust_proxy_headers: bool, header: HeaderName) -> Arc<dyn ClientIpResolver> {
    if trust_proxy_headers {
        Arc::new(ForwardedHeader::new(header))
    } else {
        Arc::new(PeerAddress)
    }
}

fn peer_ip(peer: Option<SocketAddr>) -> String {
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
