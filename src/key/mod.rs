//! Client keys and key extraction.
//!
//! A [`ClientKey`] names the entity whose request history is tracked. The HTTP
//! layer derives it from the request's source address through a [`Key`]
//! extractor; library callers can build one from any non-empty string.
//!
//! # Example
//!
//! ```ignore
//! use ipgate::key::{ClientKey, IpKey};
//!
//! let key = ClientKey::new("1.2.3.4")?;
//! let from_addr = ClientKey::from_ip("::ffff:1.2.3.4".parse()?);
//! assert_eq!(key, from_addr);
//! ```

mod extractors;

pub use extractors::*;

use std::fmt;
use std::net::IpAddr;

use crate::error::{RateLimitError, Result};

/// Identifier used to partition rate limit state.
///
/// Any non-empty string is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Create a client key, rejecting the empty string.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(RateLimitError::InvalidKey(
                "client key must not be empty".into(),
            ));
        }
        Ok(Self(key))
    }

    /// Build a key from an IP address.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are collapsed to their IPv4
    /// form so a dual-stack listener does not split one client into two keys.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_canonical().to_string())
    }

    /// Shared key for requests whose source address cannot be determined.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ClientKey {
    type Error = RateLimitError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for ClientKey {
    type Error = RateLimitError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self::from_ip(ip)
    }
}

/// Trait for extracting client keys from requests.
///
/// Return `None` if the key cannot be extracted (e.g., no peer address was
/// recorded for the connection).
///
/// # Type Parameters
///
/// - `R`: The request type (e.g., `axum::extract::Request`)
pub trait Key<R>: Send + Sync + 'static {
    /// Extract a client key from the request.
    fn extract(&self, request: &R) -> Option<ClientKey>;

    /// Get the key name for logging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_rejects_empty() {
        assert!(ClientKey::new("").is_err());
        assert!(ClientKey::try_from(String::new()).is_err());
        assert_eq!(ClientKey::new("1.2.3.4").unwrap().as_str(), "1.2.3.4");
    }

    #[test]
    fn test_client_key_accepts_arbitrary_strings() {
        let key = ClientKey::new("not an address").unwrap();
        assert_eq!(key.to_string(), "not an address");
    }

    #[test]
    fn test_client_key_from_mapped_ipv6() {
        let mapped: IpAddr = "::ffff:1.2.3.4".parse().unwrap();
        assert_eq!(ClientKey::from_ip(mapped).as_str(), "1.2.3.4");

        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(ClientKey::from(v6).as_str(), "2001:db8::1");
    }
}
