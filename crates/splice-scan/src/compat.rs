//! Compatibility engine
//!
//! Re-derives the live shape of each class a [`LibraryFingerprint`] requires,
//! one class at a time, and tests member containment. Every failing class is
//! reported, not only the first.

use crate::error::ScanError;
use crate::scanner::ROOT_CLASS;
use crate::source::{load_unit, UnitSource};
use splice_classfile::{ClassHeader, FieldUnit, MethodUnit, UnitVisitor};
use splice_fingerprint::{
    ClassFingerprint, ConstructorFingerprint, FieldFingerprint, FingerprintError, LibraryFingerprint,
    MethodFingerprint,
};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Outcome of checking a fingerprint against a live context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every required class is present with every required member
    Compatible,

    /// At least one class is missing or lacks members, in fingerprint order
    Incompatible(Vec<FingerprintError>),

    /// A live class could not be read; the caller applies its default policy
    Undetermined {
        /// Class whose read failed
        class: String,
        /// Rendered failure
        reason: String,
    },
}

impl Verdict {
    /// True only for [`Verdict::Compatible`]
    #[inline]
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        matches!(self, Verdict::Compatible)
    }

    /// Incompatibilities, empty unless [`Verdict::Incompatible`]
    #[must_use]
    pub fn errors(&self) -> &[FingerprintError] {
        match self {
            Verdict::Incompatible(errors) => errors,
            _ => &[],
        }
    }
}

/// Checks persisted fingerprints against one live source
#[derive(Debug)]
pub struct CompatibilityChecker<'s, S: UnitSource + ?Sized> {
    source: &'s S,
}

impl<'s, S: UnitSource + ?Sized> CompatibilityChecker<'s, S> {
    /// Create checker over a live source
    #[inline]
    #[must_use]
    pub fn new(source: &'s S) -> Self {
        Self { source }
    }

    /// Test every class of `fingerprint`
    ///
    /// Missing classes yield MISSING, classes lacking members yield MISMATCH.
    /// A read failure skips that class; the result is [`Verdict::Undetermined`]
    /// only when no other class is missing or mismatched.
    pub fn check(&self, fingerprint: &LibraryFingerprint) -> Verdict {
        let mut errors = Vec::new();
        let mut unreadable: Option<(String, String)> = None;
        for required in fingerprint.classes() {
            match self.live_fingerprint(required.name()) {
                Ok(Some(live)) if live.compatible(required) => {
                    debug!(class = required.name(), "compatible");
                }
                Ok(Some(live)) => {
                    let error = FingerprintError::mismatch(required.clone(), live);
                    debug!(%error, "mismatch");
                    errors.push(error);
                }
                Ok(None) => {
                    debug!(class = required.name(), "missing");
                    errors.push(FingerprintError::missing(required.clone()));
                }
                Err(err) => {
                    warn!(class = required.name(), error = %err, "cannot read live class");
                    unreadable.get_or_insert_with(|| (required.name().to_string(), err.to_string()));
                }
            }
        }
        match unreadable {
            _ if !errors.is_empty() => Verdict::Incompatible(errors),
            Some((class, reason)) => Verdict::Undetermined { class, reason },
            None => Verdict::Compatible,
        }
    }

    /// Live shape of `class_name`, including members inherited from supertypes
    /// that the same source can resolve
    ///
    /// # Errors
    /// Returns [`ScanError::Io`] or [`ScanError::Malformed`] when the class or
    /// one of its resolvable supertypes cannot be read.
    pub fn live_fingerprint(&self, class_name: &str) -> Result<Option<ClassFingerprint>, ScanError> {
        let Some(unit) = load_unit(self.source, class_name)? else {
            return Ok(None);
        };
        let mut shape = ShapeVisitor::declared();
        unit.accept(&mut shape);

        let mut seen: HashSet<String> = HashSet::from([class_name.to_string()]);
        let mut queue: VecDeque<String> = shape.supertypes.drain(..).collect();
        while let Some(supertype) = queue.pop_front() {
            if !seen.insert(supertype.clone()) {
                continue;
            }
            let Some(unit) = load_unit(self.source, &supertype)? else {
                continue;
            };
            let mut inherited = ShapeVisitor::inherited();
            unit.accept(&mut inherited);
            queue.extend(inherited.supertypes.drain(..));
            shape.methods.extend(inherited.methods);
            shape.fields.extend(inherited.fields);
        }

        Ok(Some(ClassFingerprint::new(
            class_name,
            shape.super_class,
            shape.constructors,
            shape.methods,
            shape.fields,
        )))
    }
}

/// Collects the visible members of one unit
struct ShapeVisitor {
    inherited: bool,
    interface: bool,
    super_class: Option<String>,
    supertypes: Vec<String>,
    constructors: Vec<ConstructorFingerprint>,
    methods: Vec<MethodFingerprint>,
    fields: Vec<FieldFingerprint>,
}

impl ShapeVisitor {
    fn declared() -> Self {
        Self::with_mode(false)
    }

    fn inherited() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(inherited: bool) -> Self {
        Self {
            inherited,
            interface: false,
            super_class: None,
            supertypes: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }
}

impl UnitVisitor for ShapeVisitor {
    fn visit_class(&mut self, header: &ClassHeader) {
        self.interface = header.access.is_interface();
        self.super_class = header.super_class.clone().filter(|s| s != ROOT_CLASS);
        self.supertypes.extend(header.super_class.iter().cloned());
        self.supertypes.extend(header.interfaces.iter().cloned());
    }

    fn visit_field(&mut self, field: &FieldUnit) {
        if field.access.is_private() || field.access.is_synthetic() {
            return;
        }
        self.fields
            .push(FieldFingerprint::new(field.name.as_str(), field.field_type.as_str()));
    }

    fn visit_method(&mut self, method: &MethodUnit) {
        if method.access.is_private()
            || method.access.is_synthetic()
            || method.is_bridge()
            || method.is_static_initializer()
        {
            return;
        }
        if method.is_constructor() {
            if !self.inherited {
                self.constructors.push(ConstructorFingerprint::new(
                    method.parameter_types.clone(),
                    method.exceptions.clone(),
                ));
            }
            return;
        }
        // static interface methods are not members of implementing classes
        if self.inherited && self.interface && method.access.is_static() {
            return;
        }
        self.methods.push(MethodFingerprint::new(
            method.name.as_str(),
            method.return_type.clone(),
            method.parameter_types.clone(),
            method.exceptions.clone(),
        ));
    }
}
