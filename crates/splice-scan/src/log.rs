//! Build-time work items
//!
//! A [`Log`] records one class, field or method the scanned code depends on,
//! together with the strongest [`Phase`] it was seen at and whether its
//! declaration has been visited.

use crate::phase::Phase;
use std::fmt::{self, Display, Formatter};

/// Structural identity of a log, used as the registry key
///
/// Method keys leave out exception types, matching method fingerprint equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogKey {
    /// A class by name
    Class(String),
    /// A field by owner, name and type
    Field {
        /// Declaring class
        class: String,
        /// Field name
        name: String,
        /// Field type
        field_type: String,
    },
    /// A method or constructor by owner, name, return and parameter types
    Method {
        /// Declaring class
        class: String,
        /// Method name
        name: String,
        /// Return type, `None` for `void`
        return_type: Option<String>,
        /// Parameter types
        parameter_types: Vec<String>,
    },
}

/// A referenced class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLog {
    /// Class name
    pub name: String,
    /// Superclass, known once the class has been visited
    pub super_class: Option<String>,
    /// Interfaces, known once the class has been visited
    pub interfaces: Vec<String>,
}

/// A referenced or declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLog {
    /// Declaring class
    pub class_name: String,
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: String,
}

/// A referenced or declared method; constructors are named `<init>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodLog {
    /// Declaring class
    pub class_name: String,
    /// Method name
    pub name: String,
    /// Return type, `None` for `void`
    pub return_type: Option<String>,
    /// Parameter types
    pub parameter_types: Vec<String>,
    /// Declared exceptions, known once the declaration has been visited
    pub exception_types: Vec<String>,
}

impl MethodLog {
    /// True for `<init>`
    #[inline]
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

/// What a log refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// Class reference
    Class(ClassLog),
    /// Field reference
    Field(FieldLog),
    /// Method or constructor reference
    Method(MethodLog),
}

/// One registry entry: what is referenced, how strongly, and whether resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    kind: LogKind,
    phase: Phase,
    resolved: bool,
}

impl Log {
    /// Class log, unresolved
    #[must_use]
    pub fn class(name: impl Into<String>, phase: Phase) -> Self {
        Self::new(
            LogKind::Class(ClassLog {
                name: name.into(),
                super_class: None,
                interfaces: Vec::new(),
            }),
            phase,
        )
    }

    /// Class log carrying its declared supertypes, unresolved
    #[must_use]
    pub fn declared_class(
        name: impl Into<String>,
        super_class: Option<String>,
        interfaces: Vec<String>,
        phase: Phase,
    ) -> Self {
        Self::new(
            LogKind::Class(ClassLog {
                name: name.into(),
                super_class,
                interfaces,
            }),
            phase,
        )
    }

    /// Field log, unresolved
    #[must_use]
    pub fn field(
        class_name: impl Into<String>,
        name: impl Into<String>,
        field_type: impl Into<String>,
        phase: Phase,
    ) -> Self {
        Self::new(
            LogKind::Field(FieldLog {
                class_name: class_name.into(),
                name: name.into(),
                field_type: field_type.into(),
            }),
            phase,
        )
    }

    /// Method log, unresolved
    #[must_use]
    pub fn method(
        class_name: impl Into<String>,
        name: impl Into<String>,
        return_type: Option<String>,
        parameter_types: Vec<String>,
        exception_types: Vec<String>,
        phase: Phase,
    ) -> Self {
        Self::new(
            LogKind::Method(MethodLog {
                class_name: class_name.into(),
                name: name.into(),
                return_type,
                parameter_types,
                exception_types,
            }),
            phase,
        )
    }

    fn new(kind: LogKind, phase: Phase) -> Self {
        Self {
            kind,
            phase,
            resolved: false,
        }
    }

    /// Same log, marked resolved
    #[inline]
    #[must_use]
    pub fn resolved(mut self) -> Self {
        self.resolved = true;
        self
    }

    /// Registry key
    #[must_use]
    pub fn key(&self) -> LogKey {
        match &self.kind {
            LogKind::Class(c) => LogKey::Class(c.name.clone()),
            LogKind::Field(f) => LogKey::Field {
                class: f.class_name.clone(),
                name: f.name.clone(),
                field_type: f.field_type.clone(),
            },
            LogKind::Method(m) => LogKey::Method {
                class: m.class_name.clone(),
                name: m.name.clone(),
                return_type: m.return_type.clone(),
                parameter_types: m.parameter_types.clone(),
            },
        }
    }

    /// What this log refers to
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &LogKind {
        &self.kind
    }

    /// Declaring class (the class itself for class logs)
    #[must_use]
    pub fn class_name(&self) -> &str {
        match &self.kind {
            LogKind::Class(c) => &c.name,
            LogKind::Field(f) => &f.class_name,
            LogKind::Method(m) => &m.class_name,
        }
    }

    /// Strongest phase seen so far
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once the declaration has been visited
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// True for constructor method logs
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        matches!(&self.kind, LogKind::Method(m) if m.is_constructor())
    }

    /// Sort rank within one class: class, then methods, then fields
    pub(crate) fn rank(&self) -> u8 {
        match self.kind {
            LogKind::Class(_) => 0,
            LogKind::Method(_) => 1,
            LogKind::Field(_) => 2,
        }
    }

    pub(crate) fn lower_phase(&mut self, phase: Phase) {
        self.phase = self.phase.strongest(phase);
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.resolved = true;
    }

    /// Copy details only a visited declaration carries
    pub(crate) fn fill_details(&mut self, other: &Log) {
        match (&mut self.kind, &other.kind) {
            (LogKind::Class(mine), LogKind::Class(theirs)) => {
                if mine.super_class.is_none() && theirs.super_class.is_some() {
                    mine.super_class.clone_from(&theirs.super_class);
                }
                if mine.interfaces.is_empty() {
                    mine.interfaces.clone_from(&theirs.interfaces);
                }
            }
            (LogKind::Method(mine), LogKind::Method(theirs)) => {
                if mine.exception_types.is_empty() {
                    mine.exception_types.clone_from(&theirs.exception_types);
                }
            }
            _ => {}
        }
    }
}

impl Display for Log {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LogKind::Class(c) => write!(f, "class {}", c.name)?,
            LogKind::Field(fl) => write!(f, "field {}.{}: {}", fl.class_name, fl.name, fl.field_type)?,
            LogKind::Method(m) => {
                write!(f, "method {}.{}({})", m.class_name, m.name, m.parameter_types.join(","))?;
                if let Some(ret) = &m.return_type {
                    write!(f, ": {ret}")?;
                }
            }
        }
        write!(f, " [{}{}]", self.phase, if self.resolved { ", resolved" } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_key_ignores_exceptions() {
        let a = Log::method("a.A", "m", None, vec![], vec!["a.E".into()], Phase::Call);
        let b = Log::method("a.A", "m", None, vec![], vec![], Phase::None);
        assert_eq!(a.key(), b.key());
        assert_ne!(
            a.key(),
            Log::method("a.A", "m", Some("int".into()), vec![], vec![], Phase::Call).key()
        );
    }

    #[test]
    fn fill_details_keeps_known_values() {
        let mut bare = Log::class("a.A", Phase::Load);
        let declared = Log::declared_class("a.A", Some("a.Base".into()), vec!["a.I".into()], Phase::None);
        bare.fill_details(&declared);
        let LogKind::Class(class) = bare.kind() else {
            panic!("class log expected");
        };
        assert_eq!(class.super_class.as_deref(), Some("a.Base"));
        assert_eq!(class.interfaces, vec!["a.I"]);
    }

    #[test]
    fn display() {
        let log = Log::method("a.A", "m", Some("int".into()), vec!["long".into()], vec![], Phase::Call).resolved();
        assert_eq!(log.to_string(), "method a.A.m(long): int [call, resolved]");
        assert!(Log::method("a.A", "<init>", None, vec![], vec![], Phase::Load).is_constructor());
    }
}
