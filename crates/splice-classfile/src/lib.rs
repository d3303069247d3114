//! Splice Class-File Reader
//!
//! Reads JVM class files into their declared shape (header, fields, methods) and
//! the outgoing references of every member: instruction operands, constants,
//! bootstrap arguments, descriptors, generic signatures, annotations and local
//! variable tables.
//!
//! # Core Concepts
//!
//! - [`ClassUnit`]: a parsed class file; [`ClassUnit::accept`] drives a visitor
//! - [`UnitVisitor`]: the callback seam used by scanners and shape readers
//! - [`Reference`]: one outgoing reference, tagged with how it is used
//! - [`ClassFileError`]: typed failure for malformed input; parsing never panics
//!
//! All names are reported in source form: `com.acme.Outer$Inner`, `int[]`.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod code;
mod constant;
pub mod descriptor;
mod error;
mod reader;
pub mod signature;
mod unit;
mod visitor;

pub use error::ClassFileError;
pub use unit::{AccessFlags, ClassHeader, ClassUnit, FieldUnit, MethodUnit};
pub use visitor::{ClassUsage, FieldAccess, InvokeKind, MentionSite, Reference, UnitVisitor};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
