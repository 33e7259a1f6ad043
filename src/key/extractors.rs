//! Source-address key extraction.
//!
//! The extractor is generic over any request type that can report its peer
//! address and headers, so it can be tested without a running server.

use std::net::IpAddr;

use crate::key::{ClientKey, Key};

/// Trait for requests that have an IP address.
pub trait HasIpAddr {
    /// Get the client IP address.
    fn client_ip(&self) -> Option<IpAddr>;
}

/// Trait for requests that have headers.
pub trait HasHeaders {
    /// Get a header value by name.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Extract key from client IP address.
///
/// By default only the socket peer address is used. Headers such as
/// `X-Forwarded-For` are client-controlled and are consulted only when the
/// service sits behind a proxy that is known to set them.
#[derive(Debug, Clone, Default)]
pub struct IpKey {
    /// Header to check for real IP (e.g., X-Forwarded-For).
    real_ip_header: Option<&'static str>,
}

impl IpKey {
    /// Create a new IP key extractor using the peer address only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use X-Forwarded-For header to get real IP behind proxy.
    pub fn with_forwarded_for() -> Self {
        Self {
            real_ip_header: Some("x-forwarded-for"),
        }
    }

    /// Use a custom header for real IP.
    pub fn with_header(header: &'static str) -> Self {
        Self {
            real_ip_header: Some(header),
        }
    }
}

impl<R> Key<R> for IpKey
where
    R: HasIpAddr + HasHeaders,
{
    fn extract(&self, request: &R) -> Option<ClientKey> {
        if let Some(value) = self.real_ip_header.and_then(|h| request.header(h)) {
            // X-Forwarded-For might have multiple IPs, take the first
            let first = value.split(',').next().unwrap_or_default().trim();
            if let Ok(ip) = first.parse::<IpAddr>() {
                return Some(ClientKey::from_ip(ip));
            }
        }

        request.client_ip().map(ClientKey::from_ip)
    }

    fn name(&self) -> &'static str {
        "ip"
    }
}
