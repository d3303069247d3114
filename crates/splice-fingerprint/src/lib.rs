//! Splice Fingerprint Model
//!
//! Immutable structural summaries of library classes, used to decide whether a
//! live library still offers everything a plugin was built against.
//!
//! # Core Concepts
//!
//! - [`FieldFingerprint`], [`ConstructorFingerprint`], [`MethodFingerprint`]: member shapes
//! - [`ClassFingerprint`]: the members of one class, with [`ClassFingerprint::compatible`]
//! - [`LibraryFingerprint`]: the sorted set of classes a plugin requires, persisted as a blob
//! - [`FingerprintError`]: a MISSING or MISMATCH diagnostic
//! - [`FingerprintDigest`]: Blake3 digest of a persisted fingerprint
//!
//! # Example
//!
//! ```rust
//! use splice_fingerprint::{ClassFingerprint, LibraryFingerprint, MethodFingerprint};
//!
//! let fp = LibraryFingerprint::new(vec![ClassFingerprint::builder("com.acme.A")
//!     .method(MethodFingerprint::new("foo", None, vec!["int".into()], vec![]))
//!     .build()]);
//!
//! let blob = fp.to_bytes().unwrap();
//! assert_eq!(LibraryFingerprint::from_bytes(&blob).unwrap(), fp);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod class;
mod digest;
mod error;
mod library;
mod member;

pub use class::{ClassFingerprint, ClassFingerprintBuilder};
pub use digest::{DigestParseError, FingerprintDigest};
pub use error::{CodecError, FingerprintError, Reason};
pub use library::{LibraryFingerprint, FORMAT_VERSION, MAGIC};
pub use member::{ConstructorFingerprint, FieldFingerprint, MethodFingerprint};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
