//! Fingerprint digests
//!
//! Provides [`FingerprintDigest`], a 32-byte Blake3 digest of a fingerprint's
//! persisted payload, used to identify fingerprints in logs and reports.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte digest (Blake3)
///
/// Two fingerprints with the same digest carry the same classes and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FingerprintDigest([u8; 32]);

impl FingerprintDigest {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for FingerprintDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for FingerprintDigest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestParseError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

/// Errors parsing a digest from hex
#[derive(Debug, thiserror::Error)]
pub enum DigestParseError {
    /// Wrong number of bytes
    #[error("invalid digest length: expected 32, got {0}")]
    InvalidLength(usize),

    /// Not hex
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
