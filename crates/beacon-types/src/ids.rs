//! Opaque identifiers used throughout BEACON.
//!
//! Users and token ledgers are identified by 32-byte principal-like values
//! assigned by the outside world; the engine never inspects their content.
//! `TradeId` is derived deterministically from the engine's fill sequence so
//! that a restored engine re-produces identical archive entries.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Identity of a trading account. Opaque 32-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub [u8; 32]);

impl UserId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build an id from a short slice, zero-padded to 32 bytes.
    /// Slices longer than 32 bytes are truncated.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        let n = slice.len().min(32);
        bytes[..n].copy_from_slice(&slice[..n]);
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Identity of an external token ledger. Opaque 32-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TokenId(pub [u8; 32]);

impl TokenId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build an id from a short slice, zero-padded to 32 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        let n = slice.len().min(32);
        bytes[..n].copy_from_slice(&slice[..n]);
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
impl UserId {
    /// A short, readable id for tests: `[n, 0, 0, ...]`.
    #[must_use]
    pub fn dummy(n: u8) -> Self {
        Self::from_slice(&[n])
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl TokenId {
    /// A short, readable id for tests: `[n, 0, 0, ...]`.
    #[must_use]
    pub fn dummy(n: u8) -> Self {
        Self::from_slice(&[n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_pads_and_truncates() {
        let short = UserId::from_slice(&[1, 2]);
        assert_eq!(short.0[..2], [1, 2]);
        assert!(short.0[2..].iter().all(|b| *b == 0));

        let long = UserId::from_slice(&[7u8; 40]);
        assert_eq!(long.0, [7u8; 32]);
    }

    #[test]
    fn display_is_short_hex() {
        let id = TokenId::from_slice(&[0xab, 0xcd]);
        assert_eq!(format!("{id}"), "token:abcd000000000000");
    }

    #[test]
    fn ids_order_by_bytes() {
        assert!(UserId::dummy(1) < UserId::dummy(2));
        assert!(TokenId::dummy(3) > TokenId::dummy(2));
    }

    #[test]
    fn serde_roundtrips() {
        let id = UserId::dummy(9);
        let json = serde_json::to_string(&id).unwrap();
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
