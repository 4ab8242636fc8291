//! Client IP resolution behind load balancers.
//!
//! `X-Forwarded-For` is only as trustworthy as the proxies in front of us: with N
//! trusted proxies the client is the entry N positions from the right. Every candidate
//! must parse as an IP address, so a spoofed free-form value is never used as a key.

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::{IpAddr, SocketAddr};

/// Client IP of a request, using the peer address recorded by the server as fallback.
pub fn request_client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_proxy_count: usize,
) -> Option<IpAddr> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr);
    extract_client_ip(headers, peer, trusted_proxy_count)
}

pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| from_forwarded_for(value, trusted_proxy_count))
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
        })
        .or_else(|| socket_addr.map(SocketAddr::ip))
}

fn from_forwarded_for(value: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // A chain no longer than the trusted tail carries no client entry; use the nearest hop.
    let position = if trusted_proxy_count == 0 || hops.len() <= trusted_proxy_count {
        hops.len().checked_sub(1)?
    } else {
        hops.len() - trusted_proxy_count - 1
    };

    hops.get(position)?.parse().ok()
}
