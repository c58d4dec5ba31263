//! Hash types (H256, ShortHash)

use std::fmt;
use thiserror::Error;

/// Hash parsing error
#[derive(Debug, Error)]
pub enum HashError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid hash length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected byte length
        expected: usize,
        /// Bytes actually provided
        got: usize,
    },
}

/// 256-bit hash (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct H256([u8; 32]);

impl H256 {
    /// Size in bytes
    pub const LEN: usize = 32;

    /// Zero hash
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Create from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }

    /// Create from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, HashError> {
        if slice.len() != 32 {
            return Err(HashError::InvalidLength {
                expected: 32,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(H256(bytes))
    }

    /// Parse from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Truncate to the short form used for peer lookups
    pub fn short(&self) -> ShortHash {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.0[..8]);
        ShortHash(bytes)
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", self.to_hex())
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl AsRef<[u8]> for H256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Truncated 64-bit hash (8 bytes).
///
/// Distinct full hashes may share a short form; index owners must define a
/// single resolution for colliding entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShortHash([u8; 8]);

impl ShortHash {
    /// Size in bytes
    pub const LEN: usize = 8;

    /// Create from bytes
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        ShortHash(bytes)
    }

    /// Create from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, HashError> {
        if slice.len() != 8 {
            return Err(HashError::InvalidLength {
                expected: 8,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(slice);
        Ok(ShortHash(bytes))
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ShortHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortHash({})", self.to_hex())
    }
}

impl fmt::Display for ShortHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h256_from_hex() {
        let hash = H256::from_hex(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        assert!(!hash.is_zero());
        assert_eq!(hash.as_bytes()[31], 1);
    }

    #[test]
    fn test_h256_from_hex_without_prefix() {
        let hash = H256::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        assert!(!hash.is_zero());
    }

    #[test]
    fn test_h256_hex_roundtrip() {
        let original = "0xabcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789";
        let hash = H256::from_hex(original).unwrap();
        assert_eq!(hash.to_hex(), original);
    }

    #[test]
    fn test_h256_from_slice_invalid_length() {
        let result = H256::from_slice(&[0u8; 31]);
        match result {
            Err(HashError::InvalidLength {
                expected: 32,
                got: 31,
            }) => {}
            _ => panic!("Expected InvalidLength error"),
        }
    }

    #[test]
    fn test_h256_from_hex_invalid_chars() {
        let result = H256::from_hex(
            "0xgggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggg",
        );
        assert!(matches!(result, Err(HashError::InvalidHex(_))));
    }

    #[test]
    fn test_h256_zero() {
        assert!(H256::ZERO.is_zero());
        assert_eq!(H256::default(), H256::ZERO);
    }

    #[test]
    fn test_short_hash_prefix() {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let hash = H256::from_bytes(bytes);
        assert_eq!(hash.short().as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_short_hash_collision_same_prefix() {
        let mut a = [0xaa; 32];
        let mut b = [0xaa; 32];
        a[31] = 1;
        b[31] = 2;
        let (a, b) = (H256::from_bytes(a), H256::from_bytes(b));
        assert_ne!(a, b);
        assert_eq!(a.short(), b.short());
    }

    #[test]
    fn test_short_hash_from_slice() {
        let short = ShortHash::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(short.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(ShortHash::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_h256_hash_consistency() {
        use std::collections::HashSet;

        let h1 = H256::from_bytes([7u8; 32]);
        let h2 = H256::from_bytes([7u8; 32]);
        let mut set = HashSet::new();
        set.insert(h1);
        assert!(set.contains(&h2));
    }
}
