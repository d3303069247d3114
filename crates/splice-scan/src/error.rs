//! Error types for scanning and compatibility checks

use splice_classfile::ClassFileError;
use std::io;

/// Errors raised by the scanner, collation and live-shape reader
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A member log was grouped without its class log
    ///
    /// The scanner always records the class before its members, so this is a
    /// broken invariant rather than a runtime condition.
    #[error("collation invariant broken: first log of {class} is not a class log")]
    Collation {
        /// Class whose logs were grouped
        class: String,
    },

    /// Reading a unit failed
    #[error("failed to read {class}: {source}")]
    Io {
        /// Class being read
        class: String,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// A unit was found but could not be parsed
    #[error("malformed class file for {class}: {source}")]
    Malformed {
        /// Class being parsed
        class: String,
        /// Parse failure
        #[source]
        source: ClassFileError,
    },

    /// Unrecognized phase name
    #[error("unknown phase {0:?} (expected load, call or none)")]
    UnknownPhase(String),
}

impl ScanError {
    /// Class the error is about, if any
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            ScanError::Collation { class }
            | ScanError::Io { class, .. }
            | ScanError::Malformed { class, .. } => Some(class),
            ScanError::UnknownPhase(_) => None,
        }
    }
}
