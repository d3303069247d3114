//! Outgoing references and the visitor seam

use crate::unit::{ClassHeader, FieldUnit, MethodUnit};

/// How an instruction or constant uses a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassUsage {
    /// `new`
    New,
    /// `anewarray` / `multianewarray`
    NewArray,
    /// `checkcast`
    CheckCast,
    /// `instanceof`
    InstanceOf,
    /// `ldc` of a class constant, or a class bootstrap argument
    Constant,
    /// Catch type of an exception handler
    Catch,
}

/// How a field is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    /// `getfield`
    Get,
    /// `putfield`
    Put,
    /// `getstatic`
    GetStatic,
    /// `putstatic`
    PutStatic,
    /// Field method handle
    Handle,
}

/// How a method is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// `invokevirtual`
    Virtual,
    /// `invokespecial`
    Special,
    /// `invokestatic`
    Static,
    /// `invokeinterface`
    Interface,
    /// Method handle constant or bootstrap method
    Handle,
}

/// Where a class is mentioned without being used by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MentionSite {
    /// Member descriptor or `throws` clause
    Descriptor,
    /// Generic signature
    Signature,
    /// Annotation type or element value
    Annotation,
    /// Local variable table entry
    LocalVariable,
    /// Method type constant or call-site descriptor
    MethodType,
}

/// One outgoing reference from a class, field or method
///
/// All names are source-form (`com.acme.Foo`, `int[]`). Member references on
/// array owners (`int[].clone()`) are not reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// A class used by an instruction or constant
    Class {
        /// Class name
        name: String,
        /// How it is used
        usage: ClassUsage,
    },
    /// A field accessed by an instruction or handle
    Field {
        /// Declaring class as named by the reference
        owner: String,
        /// Field name
        name: String,
        /// Field type
        field_type: String,
        /// Access kind
        access: FieldAccess,
    },
    /// A method or constructor invoked by an instruction or handle
    Method {
        /// Declaring class as named by the reference
        owner: String,
        /// Method name, `<init>` for constructors
        name: String,
        /// Return type, `None` for `void`
        return_type: Option<String>,
        /// Parameter types
        parameter_types: Vec<String>,
        /// Invocation kind
        invoke: InvokeKind,
    },
    /// A class named in metadata only
    Mention {
        /// Class name
        name: String,
        /// Where it appears
        site: MentionSite,
    },
}

impl Reference {
    /// Class this reference points at (the owner for member references)
    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            Reference::Class { name, .. } | Reference::Mention { name, .. } => name,
            Reference::Field { owner, .. } | Reference::Method { owner, .. } => owner,
        }
    }

    /// True for `<init>` method references
    #[must_use]
    pub fn is_constructor_call(&self) -> bool {
        matches!(self, Reference::Method { name, .. } if name == "<init>")
    }
}

/// Callbacks driven by [`ClassUnit::accept`](crate::ClassUnit::accept)
///
/// Order: `visit_class`, the class-level references, then each field followed by
/// its references, then each method followed by its references, then `visit_end`.
/// All methods default to no-ops.
pub trait UnitVisitor {
    /// Class header
    fn visit_class(&mut self, _header: &ClassHeader) {}

    /// Declared field
    fn visit_field(&mut self, _field: &FieldUnit) {}

    /// Declared method or constructor
    fn visit_method(&mut self, _method: &MethodUnit) {}

    /// Outgoing reference of the class or of the member visited last
    fn visit_reference(&mut self, _reference: &Reference) {}

    /// Unit fully visited
    fn visit_end(&mut self) {}
}
