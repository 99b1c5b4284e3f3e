//! API-key authorization.
//!
//! With no keys configured the service runs open and callers are identified
//! by client IP. With keys configured, a request must present one of them
//! and the caller identity becomes a short fingerprint of the key, so rate
//! accounting is per key without logging key material.

use sha2::{Digest, Sha256};

/// Resolves a request's credential into a caller identity.
pub trait Authorizer: Send + Sync {
    /// Returns the caller identity for accounting, or `None` to reject.
    fn authorize(&self, presented_key: Option<&str>, client_ip: &str) -> Option<String>;
}

pub struct ApiKeyAuthorizer {
    /// Fingerprints of the accepted keys. Raw keys are dropped at build time.
    accepted: Vec<String>,
}

impl ApiKeyAuthorizer {
    pub fn new(keys: &[String]) -> Self {
        Self {
            accepted: keys.iter().map(|k| fingerprint(k)).collect(),
        }
    }

    pub fn open_access(&self) -> bool {
        self.accepted.is_empty()
    }
}

impl Authorizer for ApiKeyAuthorizer {
    fn authorize(&self, presented_key: Option<&str>, client_ip: &str) -> Option<String> {
        if self.accepted.is_empty() {
            return Some(format!("ip:{client_ip}"));
        }
        let fp = fingerprint(presented_key?);
        if self.accepted.contains(&fp) {
            Some(format!("key:{fp}"))
        } else {
            None
        }
    }
}

/// First 16 hex chars of sha256. Enough to distinguish keys, useless for
/// recovering them.
fn fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_mode_identifies_by_ip() {
        let auth = ApiKeyAuthorizer::new(&[]);
        assert!(auth.open_access());
        assert_eq!(
            auth.authorize(None, "10.0.0.7").unwrap(),
            "ip:10.0.0.7"
        );
        // A presented key in open mode is ignored, not validated.
        assert_eq!(
            auth.authorize(Some("whatever"), "10.0.0.7").unwrap(),
            "ip:10.0.0.7"
        );
    }

    #[test]
    fn keyed_mode_requires_a_known_key() {
        let auth = ApiKeyAuthorizer::new(&["secret-a".to_string(), "secret-b".to_string()]);
        assert!(!auth.open_access());
        assert!(auth.authorize(None, "10.0.0.7").is_none());
        assert!(auth.authorize(Some("wrong"), "10.0.0.7").is_none());

        let caller = auth.authorize(Some("secret-b"), "10.0.0.7").unwrap();
        assert!(caller.starts_with("key:"));
        assert!(!caller.contains("secret-b"));
    }

    #[test]
    fn same_key_maps_to_same_caller() {
        let auth = ApiKeyAuthorizer::new(&["secret".to_string()]);
        let a = auth.authorize(Some("secret"), "10.0.0.1").unwrap();
        let b = auth.authorize(Some("secret"), "192.168.1.1").unwrap();
        assert_eq!(a, b);
    }
}
