//! Splice Scan
//!
//! Builds structural fingerprints from class files and checks them against live
//! code.
//!
//! # Core Concepts
//!
//! - [`Phase`]: how strongly a reference is required (`Load < Call < None`)
//! - [`Log`] / [`LogSet`]: the deduplicated work registry of classes and members
//! - [`Scanner`]: `fingerprint` one class, `compass` to deepen breadth-first
//! - [`LogSet::collate`]: registry to sorted [`ClassFingerprint`](splice_fingerprint::ClassFingerprint)s
//! - [`FingerprintBuilder`]: roots and owned classes to a [`LibraryFingerprint`](splice_fingerprint::LibraryFingerprint)
//! - [`CompatibilityChecker`]: persisted fingerprint against a live [`UnitSource`], as a [`Verdict`]
//!
//! # Example
//!
//! ```rust
//! use splice_scan::{CompatibilityChecker, FingerprintBuilder, Verdict};
//! use std::collections::HashMap;
//!
//! let packaged: HashMap<String, Vec<u8>> = HashMap::new();
//! let fp = FingerprintBuilder::new(&packaged).root("com.acme.Advice").build().unwrap();
//!
//! let live: HashMap<String, Vec<u8>> = HashMap::new();
//! assert_eq!(CompatibilityChecker::new(&live).check(&fp), Verdict::Compatible);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod builder;
mod compat;
mod config;
mod error;
mod exclusion;
mod log;
mod phase;
mod registry;
mod scanner;
mod source;

pub use builder::FingerprintBuilder;
pub use compat::{CompatibilityChecker, Verdict};
pub use config::ScanConfig;
pub use error::ScanError;
pub use exclusion::{Exclusions, DEFAULT_EXCLUSIONS};
pub use log::{ClassLog, FieldLog, Log, LogKey, LogKind, MethodLog};
pub use phase::Phase;
pub use registry::LogSet;
pub use scanner::Scanner;
pub use source::{load_unit, UnitSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
