//! Integration tests for key extractors.

use std::collections::HashMap;
use std::net::IpAddr;

use ipgate::key::{ClientKey, HasHeaders, HasIpAddr, IpKey, Key};

struct TestRequest {
    peer: Option<IpAddr>,
    headers: HashMap<String, String>,
}

impl TestRequest {
    fn from_peer(peer: &str) -> Self {
        Self {
            peer: Some(peer.parse().unwrap()),
            headers: HashMap::new(),
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

impl HasIpAddr for TestRequest {
    fn client_ip(&self) -> Option<IpAddr> {
        self.peer
    }
}

impl HasHeaders for TestRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[test]
fn test_peer_address_is_the_key() {
    let key = IpKey::new().extract(&TestRequest::from_peer("1.2.3.4"));
    assert_eq!(key, Some(ClientKey::new("1.2.3.4").unwrap()));
}

#[test]
fn test_forwarded_for_ignored_unless_trusted() {
    let request = TestRequest::from_peer("10.0.0.1").with_header("x-forwarded-for", "5.6.7.8");

    assert_eq!(IpKey::new().extract(&request).unwrap().as_str(), "10.0.0.1");
    assert_eq!(IpKey::with_forwarded_for().extract(&request).unwrap().as_str(), "5.6.7.8");
}

#[test]
fn test_forwarded_for_takes_first_hop() {
    let request = TestRequest::from_peer("10.0.0.1").with_header("x-forwarded-for", " 5.6.7.8 , 10.0.0.2");
    assert_eq!(IpKey::with_forwarded_for().extract(&request).unwrap().as_str(), "5.6.7.8");
}

#[test]
fn test_garbage_forwarded_for_falls_back_to_peer() {
    let request = TestRequest::from_peer("10.0.0.1").with_header("x-forwarded-for", "not-an-ip");
    assert_eq!(IpKey::with_forwarded_for().extract(&request).unwrap().as_str(), "10.0.0.1");
}

#[test]
fn test_mapped_ipv6_peer_collapses_to_ipv4() {
    let key = IpKey::new().extract(&TestRequest::from_peer("::ffff:1.2.3.4")).unwrap();
    assert_eq!(key.as_str(), "1.2.3.4");
}

#[test]
fn test_no_address_no_key() {
    let request = TestRequest {
        peer: None,
        headers: HashMap::new(),
    };
    assert!(IpKey::new().extract(&request).is_none());
}

#[test]
fn test_extractor_name() {
    assert_eq!(Key::<TestRequest>::name(&IpKey::new()), "ip");
}
