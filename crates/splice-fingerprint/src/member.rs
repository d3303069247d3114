//! Member fingerprints
//!
//! Provides [`FieldFingerprint`], [`ConstructorFingerprint`] and [`MethodFingerprint`],
//! the structural summaries of the members a class exposes.
//!
//! Equality and ordering are deliberately narrower than the full field set:
//! exception lists never take part in identity, so a checked-exception change on
//! the live side does not make a member "different".

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A field as seen from outside its class
///
/// Equality covers name and type; ordering is by name (type only breaks ties,
/// which a well-formed class never produces).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFingerprint {
    name: String,
    field_type: String,
}

impl FieldFingerprint {
    /// Create field fingerprint
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }

    /// Field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type in source form (e.g. `java.lang.String[]`)
    #[inline]
    #[must_use]
    pub fn field_type(&self) -> &str {
        &self.field_type
    }
}

impl PartialEq for FieldFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.field_type == other.field_type
    }
}

impl Eq for FieldFingerprint {}

impl Hash for FieldFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.field_type.hash(state);
    }
}

impl Ord for FieldFingerprint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.field_type.cmp(&other.field_type))
    }
}

impl PartialOrd for FieldFingerprint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for FieldFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field_type, self.name)
    }
}

/// A constructor shape
///
/// Only the parameter sequence takes part in equality and ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorFingerprint {
    parameter_types: Vec<String>,
    exception_types: Vec<String>,
}

impl ConstructorFingerprint {
    /// Create constructor fingerprint; exception types are stored sorted and deduplicated
    #[must_use]
    pub fn new(parameter_types: Vec<String>, exception_types: Vec<String>) -> Self {
        Self {
            parameter_types,
            exception_types: sorted_unique(exception_types),
        }
    }

    /// Parameter types in declaration order
    #[inline]
    #[must_use]
    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Declared exception types, sorted
    #[inline]
    #[must_use]
    pub fn exception_types(&self) -> &[String] {
        &self.exception_types
    }
}

impl PartialEq for ConstructorFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.parameter_types == other.parameter_types
    }
}

impl Eq for ConstructorFingerprint {}

impl Hash for ConstructorFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parameter_types.hash(state);
    }
}

impl Ord for ConstructorFingerprint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parameter_types.cmp(&other.parameter_types)
    }
}

impl PartialOrd for ConstructorFingerprint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for ConstructorFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<init>({})", self.parameter_types.join(", "))?;
        write_throws(f, &self.exception_types)
    }
}

/// A method shape
///
/// Equality is name + return type + parameter types. Exception types are carried
/// for diagnostics only. Ordering is name, then parameter types; the return type
/// is a final tie-breaker so ordering stays consistent with equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodFingerprint {
    name: String,
    return_type: Option<String>,
    parameter_types: Vec<String>,
    exception_types: Vec<String>,
}

impl MethodFingerprint {
    /// Create method fingerprint
    ///
    /// `return_type` is `None` for `void`. Exception types are stored sorted.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        return_type: Option<String>,
        parameter_types: Vec<String>,
        exception_types: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameter_types,
            exception_types: sorted_unique(exception_types),
        }
    }

    /// Method name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return type, `None` for void
    #[inline]
    #[must_use]
    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    /// Parameter types in declaration order
    #[inline]
    #[must_use]
    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Declared exception types, sorted
    #[inline]
    #[must_use]
    pub fn exception_types(&self) -> &[String] {
        &self.exception_types
    }
}

impl PartialEq for MethodFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.return_type == other.return_type
            && self.parameter_types == other.parameter_types
    }
}

impl Eq for MethodFingerprint {}

impl Hash for MethodFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.return_type.hash(state);
        self.parameter_types.hash(state);
    }
}

impl Ord for MethodFingerprint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.parameter_types.cmp(&other.parameter_types))
            .then_with(|| self.return_type.cmp(&other.return_type))
    }
}

impl PartialOrd for MethodFingerprint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for MethodFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({})",
            self.return_type.as_deref().unwrap_or("void"),
            self.name,
            self.parameter_types.join(", ")
        )?;
        write_throws(f, &self.exception_types)
    }
}

fn write_throws(f: &mut Formatter<'_>, exceptions: &[String]) -> fmt::Result {
    if exceptions.is_empty() {
        Ok(())
    } else {
        write!(f, " throws {}", exceptions.join(", "))
    }
}

fn sorted_unique(mut types: Vec<String>) -> Vec<String> {
    types.sort();
    types.dedup();
    types
}
