//! Class fingerprints and structural containment

use crate::member::{ConstructorFingerprint, FieldFingerprint, MethodFingerprint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Structural summary of one class
///
/// Member sets are kept sorted. An empty set and "no members" are the same state,
/// which is why the sets are plain `BTreeSet`s rather than optional ones.
///
/// # Example
/// ```
/// use splice_fingerprint::{ClassFingerprint, MethodFingerprint};
///
/// let required = ClassFingerprint::builder("com.acme.A")
///     .method(MethodFingerprint::new("foo", None, vec!["int".into()], vec![]))
///     .build();
/// let live = ClassFingerprint::builder("com.acme.A")
///     .method(MethodFingerprint::new("foo", None, vec!["int".into()], vec![]))
///     .method(MethodFingerprint::new("bar", None, vec![], vec![]))
///     .build();
///
/// assert!(live.compatible(&required));
/// assert!(!required.compatible(&live));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassFingerprint {
    name: String,
    super_class: Option<String>,
    constructors: BTreeSet<ConstructorFingerprint>,
    methods: BTreeSet<MethodFingerprint>,
    fields: BTreeSet<FieldFingerprint>,
}

impl ClassFingerprint {
    /// Create fingerprint from parts
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        super_class: Option<String>,
        constructors: impl IntoIterator<Item = ConstructorFingerprint>,
        methods: impl IntoIterator<Item = MethodFingerprint>,
        fields: impl IntoIterator<Item = FieldFingerprint>,
    ) -> Self {
        Self {
            name: name.into(),
            super_class,
            constructors: constructors.into_iter().collect(),
            methods: methods.into_iter().collect(),
            fields: fields.into_iter().collect(),
        }
    }

    /// Start building a fingerprint for `name`
    #[inline]
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ClassFingerprintBuilder {
        ClassFingerprintBuilder {
            inner: Self::new(name, None, [], [], []),
        }
    }

    /// Class name (binary name in source form, e.g. `com.acme.Outer$Inner`)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Superclass, `None` for the root type or when unknown
    #[inline]
    #[must_use]
    pub fn super_class(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    /// Constructors, sorted by parameter sequence
    #[inline]
    #[must_use]
    pub fn constructors(&self) -> &BTreeSet<ConstructorFingerprint> {
        &self.constructors
    }

    /// Methods, sorted by name then parameter sequence
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &BTreeSet<MethodFingerprint> {
        &self.methods
    }

    /// Fields, sorted by name
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &BTreeSet<FieldFingerprint> {
        &self.fields
    }

    /// True when the class carries no member requirements at all
    #[inline]
    #[must_use]
    pub fn has_no_members(&self) -> bool {
        self.constructors.is_empty() && self.methods.is_empty() && self.fields.is_empty()
    }

    /// Check whether this (live) class satisfies `required`
    ///
    /// Constructors, methods and fields are tested independently: either the
    /// required side has none, or this side contains every one of them. This side
    /// may expose more members, never fewer or different ones. Superclass identity
    /// is not compared.
    #[must_use]
    pub fn compatible(&self, required: &ClassFingerprint) -> bool {
        contains_all(&self.constructors, &required.constructors)
            && contains_all(&self.methods, &required.methods)
            && contains_all(&self.fields, &required.fields)
    }

    /// Members `required` asks for that this class lacks, rendered for diagnostics
    #[must_use]
    pub fn missing_members(&self, required: &ClassFingerprint) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        missing.extend(
            required
                .constructors
                .difference(&self.constructors)
                .map(ToString::to_string),
        );
        missing.extend(required.methods.difference(&self.methods).map(ToString::to_string));
        missing.extend(required.fields.difference(&self.fields).map(ToString::to_string));
        missing
    }
}

fn contains_all<T: Ord>(live: &BTreeSet<T>, required: &BTreeSet<T>) -> bool {
    required.is_empty() || live.is_superset(required)
}

impl Display for ClassFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.name)?;
        if let Some(super_class) = &self.super_class {
            write!(f, " extends {super_class}")?;
        }
        writeln!(f, " {{")?;
        for ctor in &self.constructors {
            writeln!(f, "  {ctor}")?;
        }
        for method in &self.methods {
            writeln!(f, "  {method}")?;
        }
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        write!(f, "}}")
    }
}

/// Builder for [`ClassFingerprint`]
#[derive(Debug, Clone)]
pub struct ClassFingerprintBuilder {
    inner: ClassFingerprint,
}

impl ClassFingerprintBuilder {
    /// Set superclass
    #[inline]
    #[must_use]
    pub fn super_class(mut self, super_class: impl Into<String>) -> Self {
        self.inner.super_class = Some(super_class.into());
        self
    }

    /// Add constructor
    #[inline]
    #[must_use]
    pub fn constructor(mut self, ctor: ConstructorFingerprint) -> Self {
        self.inner.constructors.insert(ctor);
        self
    }

    /// Add method
    #[inline]
    #[must_use]
    pub fn method(mut self, method: MethodFingerprint) -> Self {
        self.inner.methods.insert(method);
        self
    }

    /// Add field
    #[inline]
    #[must_use]
    pub fn field(mut self, field: FieldFingerprint) -> Self {
        self.inner.fields.insert(field);
        self
    }

    /// Finish
    #[inline]
    #[must_use]
    pub fn build(self) -> ClassFingerprint {
        self.inner
    }
}
