//! Capability tokens.
//!
//! A token is an opaque, high-entropy string carried in a URL path segment.
//! It embeds no metadata and is not signed: holding it is the whole grant, so
//! it is bounded only by its expiry and by single use on success.

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Minimum entropy accepted when minting tokens.
pub const MIN_TOKEN_BYTES: usize = 16;

/// Opaque capability token. Equality runs in constant time.
#[derive(Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityToken(String);

impl CapabilityToken {
    /// Mint a token from `bytes` bytes of OS randomness, hex encoded.
    pub fn generate(bytes: usize) -> Self {
        let mut buf = vec![0u8; bytes.max(MIN_TOKEN_BYTES)];
        OsRng.fill_bytes(&mut buf);
        Self(hex::encode(buf))
    }

    /// Wrap a token received from transport. No validation beyond shape.
    pub fn from_transport(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines; never log the full token.
    pub fn fingerprint(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl PartialEq for CapabilityToken {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

impl Hash for CapabilityToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityToken({}…)", self.fingerprint())
    }
}

/// A token together with the instant it stops granting access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: CapabilityToken,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenGrant {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_long() {
        let a = CapabilityToken::generate(32);
        let b = CapabilityToken::generate(32);
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn short_requests_are_raised_to_minimum() {
        let t = CapabilityToken::generate(2);
        assert_eq!(t.as_str().len(), MIN_TOKEN_BYTES * 2);
    }

    #[test]
    fn debug_does_not_leak_token() {
        let t = CapabilityToken::from_transport("abcdef0123456789deadbeef");
        let rendered = format!("{:?}", t);
        assert!(!rendered.contains("deadbeef"));
    }

    #[test]
    fn fingerprint_respects_char_boundaries() {
        let t = CapabilityToken::from_transport("aééééééééé");
        assert_eq!(t.fingerprint(), "aééééééé");
        assert!(format!("{:?}", t).starts_with("CapabilityToken(aé"));
        assert_eq!(CapabilityToken::from_transport("abc").fingerprint(), "abc");
    }

    #[test]
    fn equality_compares_whole_values() {
        let a = CapabilityToken::from_transport("0011aabb");
        assert_eq!(a, CapabilityToken::from_transport("0011aabb"));
        assert_ne!(a, CapabilityToken::from_transport("0011aabc"));
        assert_ne!(a, CapabilityToken::from_transport("0011aa"));
        let set: std::collections::HashSet<_> = [a.clone(), a].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
