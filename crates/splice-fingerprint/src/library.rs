//! Library fingerprints and their persisted form
//!
//! A [`LibraryFingerprint`] is built once at packaging time and then only read.
//! The persisted blob is `SPFP` + little-endian `u16` format version + a bincode
//! payload of the sorted class array.

use crate::class::ClassFingerprint;
use crate::digest::FingerprintDigest;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// Leading bytes of every persisted fingerprint
pub const MAGIC: [u8; 4] = *b"SPFP";

/// Current persisted format version
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// The set of class shapes a plugin requires from a library
///
/// Classes are sorted by name and unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryFingerprint {
    classes: Vec<ClassFingerprint>,
}

impl LibraryFingerprint {
    /// Create from classes in any order
    ///
    /// When two entries share a name, the first one wins.
    #[must_use]
    pub fn new(mut classes: Vec<ClassFingerprint>) -> Self {
        classes.sort_by(|a, b| a.name().cmp(b.name()));
        classes.dedup_by(|later, earlier| later.name() == earlier.name());
        Self { classes }
    }

    /// Required classes, sorted by name
    #[inline]
    #[must_use]
    pub fn classes(&self) -> &[ClassFingerprint] {
        &self.classes
    }

    /// Number of required classes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when nothing is required
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Find the required shape of a class
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassFingerprint> {
        self.classes
            .binary_search_by(|c| c.name().cmp(name))
            .ok()
            .map(|idx| &self.classes[idx])
    }

    /// Encode to the persisted blob
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let payload = bincode::serialize(&self.classes)?;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode a persisted blob
    ///
    /// # Errors
    /// Returns error on a foreign or truncated blob, an unknown version, a corrupt
    /// payload, or classes that are not strictly sorted by name
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated(bytes.len()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        if magic != MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let found = u16::from_le_bytes([bytes[4], bytes[5]]);
        if found != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                expected: FORMAT_VERSION,
                found,
            });
        }
        let classes: Vec<ClassFingerprint> = bincode::deserialize(&bytes[HEADER_LEN..])?;
        for pair in classes.windows(2) {
            if pair[0].name() >= pair[1].name() {
                return Err(CodecError::Unsorted(pair[1].name().to_string()));
            }
        }
        Ok(Self { classes })
    }

    /// Human-readable JSON rendering
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Digest of the persisted blob
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized
    pub fn digest(&self) -> Result<FingerprintDigest, CodecError> {
        Ok(FingerprintDigest::compute(&self.to_bytes()?))
    }
}

impl FromIterator<ClassFingerprint> for LibraryFingerprint {
    fn from_iter<I: IntoIterator<Item = ClassFingerprint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{ConstructorFingerprint, FieldFingerprint, MethodFingerprint};
    use pretty_assertions::assert_eq;

    fn sample() -> LibraryFingerprint {
        LibraryFingerprint::new(vec![
            ClassFingerprint::builder("com.acme.Zeta").build(),
            ClassFingerprint::builder("com.acme.Alpha")
                .super_class("com.acme.Base")
                .constructor(ConstructorFingerprint::new(vec!["int".into()], vec!["x.E".into()]))
                .method(MethodFingerprint::new(
                    "run",
                    Some("java.lang.String".into()),
                    vec!["long".into(), "int[]".into()],
                    vec!["java.io.IOException".into()],
                ))
                .field(FieldFingerprint::new("count", "int"))
                .build(),
        ])
    }

    #[test]
    fn classes_are_sorted_by_name() {
        let fp = sample();
        let names: Vec<_> = fp.classes().iter().map(ClassFingerprint::name).collect();
        assert_eq!(names, vec!["com.acme.Alpha", "com.acme.Zeta"]);
    }

    #[test]
    fn duplicate_names_keep_first() {
        let fp = LibraryFingerprint::new(vec![
            ClassFingerprint::builder("a.A").super_class("first").build(),
            ClassFingerprint::builder("a.A").super_class("second").build(),
        ]);
        assert_eq!(fp.len(), 1);
        assert_eq!(fp.classes()[0].super_class(), Some("first"));
    }

    #[test]
    fn blob_preserves_exception_lists() {
        let fp = sample();
        let decoded = LibraryFingerprint::from_bytes(&fp.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, fp);
        let method = decoded.class("com.acme.Alpha").unwrap().methods().iter().next().unwrap();
        assert_eq!(method.exception_types(), &["java.io.IOException".to_string()][..]);
    }

    #[test]
    fn empty_fingerprint_round_trips() {
        let fp = LibraryFingerprint::default();
        let decoded = LibraryFingerprint::from_bytes(&fp.to_bytes().unwrap()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let result = LibraryFingerprint::from_bytes(b"NOPE\x01\x00");
        assert!(matches!(result, Err(CodecError::BadMagic(_))));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[4] = 7;
        let result = LibraryFingerprint::from_bytes(&bytes);
        assert!(matches!(result, Err(CodecError::UnsupportedVersion { found: 7, .. })));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            LibraryFingerprint::from_bytes(b"SP"),
            Err(CodecError::Truncated(2))
        ));
    }

    #[test]
    fn lookup_by_name() {
        let fp = sample();
        assert!(fp.class("com.acme.Zeta").is_some());
        assert!(fp.class("com.acme.Missing").is_none());
    }

    #[test]
    fn digest_tracks_content() {
        let a = sample();
        let b = LibraryFingerprint::new(vec![ClassFingerprint::builder("x.Y").build()]);
        assert_eq!(a.digest().unwrap(), sample().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn json_contains_class_names() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("com.acme.Alpha"));
    }
}
