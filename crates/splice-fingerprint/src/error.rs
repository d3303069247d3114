//! Error types for fingerprints
//!
//! - [`FingerprintError`]: a compatibility diagnostic (missing or mismatched class)
//! - [`CodecError`]: failures encoding or decoding a persisted fingerprint

use crate::class::ClassFingerprint;
use std::fmt::{self, Display, Formatter};

/// Why a required class failed the compatibility test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Class not present in the live context
    Missing,

    /// Class present but does not contain the required members
    Mismatch,
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("MISSING"),
            Self::Mismatch => f.write_str("MISMATCH"),
        }
    }
}

/// One incompatibility between a persisted fingerprint and a live context
///
/// Keeps the full expected and actual shapes so the diff can be reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct FingerprintError {
    reason: Reason,
    expected: ClassFingerprint,
    actual: Option<ClassFingerprint>,
}

impl FingerprintError {
    /// Required class was not found
    #[must_use]
    pub fn missing(expected: ClassFingerprint) -> Self {
        Self {
            reason: Reason::Missing,
            expected,
            actual: None,
        }
    }

    /// Required class was found with an incompatible shape
    #[must_use]
    pub fn mismatch(expected: ClassFingerprint, actual: ClassFingerprint) -> Self {
        Self {
            reason: Reason::Mismatch,
            expected,
            actual: Some(actual),
        }
    }

    /// Failure reason
    #[inline]
    #[must_use]
    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// Required shape
    #[inline]
    #[must_use]
    pub fn expected(&self) -> &ClassFingerprint {
        &self.expected
    }

    /// Live shape, when the class exists
    #[inline]
    #[must_use]
    pub fn actual(&self) -> Option<&ClassFingerprint> {
        self.actual.as_ref()
    }

    /// Name of the offending class
    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.expected.name()
    }
}

impl Display for FingerprintError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.reason, self.expected.name())?;
        if let Some(actual) = &self.actual {
            let missing = actual.missing_members(&self.expected);
            if !missing.is_empty() {
                write!(f, ": lacks {}", missing.join("; "))?;
            }
        }
        Ok(())
    }
}

/// Errors that can occur when persisting or loading a fingerprint
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Blob does not start with the fingerprint magic
    #[error("not a fingerprint blob: bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// Blob was written by an unknown format version
    #[error("unsupported fingerprint format version {found} (expected {expected})")]
    UnsupportedVersion { expected: u16, found: u16 },

    /// Blob shorter than its header
    #[error("fingerprint blob truncated: {0} bytes")]
    Truncated(usize),

    /// Binary payload error
    #[error("payload error: {0}")]
    Payload(#[from] bincode::Error),

    /// JSON rendering error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Decoded classes are not sorted by name or contain duplicates
    #[error("fingerprint classes out of order at {0}")]
    Unsorted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MethodFingerprint;

    #[test]
    fn missing_display() {
        let err = FingerprintError::missing(ClassFingerprint::builder("a.B").build());
        assert_eq!(err.to_string(), "MISSING a.B");
        assert!(err.actual().is_none());
    }

    #[test]
    fn mismatch_display_names_lacking_members() {
        let expected = ClassFingerprint::builder("a.A")
            .method(MethodFingerprint::new("foo", None, vec!["int".into()], Vec::new()))
            .build();
        let actual = ClassFingerprint::builder("a.A").build();
        let err = FingerprintError::mismatch(expected, actual);
        assert_eq!(err.reason(), Reason::Mismatch);
        assert_eq!(err.to_string(), "MISMATCH a.A: lacks void foo(int)");
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::UnsupportedVersion { expected: 1, found: 9 };
        assert!(err.to_string().contains("version 9"));
    }
}
