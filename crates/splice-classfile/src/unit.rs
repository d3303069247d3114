//! Parsed class files

use crate::code::{BootstrapMethod, CodeScope};
use crate::constant::ConstantPool;
use crate::descriptor::{element_class, field_type, method_types};
use crate::error::ClassFileError;
use crate::reader::ByteReader;
use crate::signature::{referenced_classes, MAX_NESTING};
use crate::visitor::{MentionSite, Reference, UnitVisitor};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use tracing::trace;

const MAGIC: u32 = 0xCAFE_BABE;

/// Class, field and method access flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AccessFlags(u16);

impl AccessFlags {
    /// `ACC_PUBLIC`
    pub const PUBLIC: u16 = 0x0001;
    /// `ACC_PRIVATE`
    pub const PRIVATE: u16 = 0x0002;
    /// `ACC_PROTECTED`
    pub const PROTECTED: u16 = 0x0004;
    /// `ACC_STATIC`
    pub const STATIC: u16 = 0x0008;
    /// `ACC_FINAL`
    pub const FINAL: u16 = 0x0010;
    /// `ACC_SUPER` on classes, `ACC_SYNCHRONIZED` on methods
    pub const SUPER: u16 = 0x0020;
    /// `ACC_BRIDGE` on methods, `ACC_VOLATILE` on fields
    pub const BRIDGE: u16 = 0x0040;
    /// `ACC_VARARGS` on methods, `ACC_TRANSIENT` on fields
    pub const VARARGS: u16 = 0x0080;
    /// `ACC_NATIVE`
    pub const NATIVE: u16 = 0x0100;
    /// `ACC_INTERFACE`
    pub const INTERFACE: u16 = 0x0200;
    /// `ACC_ABSTRACT`
    pub const ABSTRACT: u16 = 0x0400;
    /// `ACC_STRICT`
    pub const STRICT: u16 = 0x0800;
    /// `ACC_SYNTHETIC`
    pub const SYNTHETIC: u16 = 0x1000;
    /// `ACC_ANNOTATION`
    pub const ANNOTATION: u16 = 0x2000;
    /// `ACC_ENUM`
    pub const ENUM: u16 = 0x4000;

    /// Wrap raw flag bits
    #[inline]
    #[must_use]
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw flag bits
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every bit of `flag` is set
    #[inline]
    #[must_use]
    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    /// Private member
    #[inline]
    #[must_use]
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// Compiler-generated member
    #[inline]
    #[must_use]
    pub const fn is_synthetic(self) -> bool {
        self.contains(Self::SYNTHETIC)
    }

    /// Interface type
    #[inline]
    #[must_use]
    pub const fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    /// Static member
    #[inline]
    #[must_use]
    pub const fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }
}

/// Identity and supertypes of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    /// Binary name, e.g. `com.acme.Outer$Inner`
    pub name: String,
    /// Superclass, `None` only for `java.lang.Object` and module-info
    pub super_class: Option<String>,
    /// Directly implemented interfaces, in declaration order
    pub interfaces: Vec<String>,
    /// Class access flags
    pub access: AccessFlags,
    /// `(major, minor)` class-file version
    pub version: (u16, u16),
}

/// Declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUnit {
    /// Access flags
    pub access: AccessFlags,
    /// Field name
    pub name: String,
    /// Source-form field type
    pub field_type: String,
    /// Generic signature, if any
    pub signature: Option<String>,
    /// Classes named by the descriptor, signature and annotations
    pub references: Vec<Reference>,
}

/// Declared method or constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodUnit {
    /// Access flags
    pub access: AccessFlags,
    /// Method name, `<init>` for constructors and `<clinit>` for static initializers
    pub name: String,
    /// Return type, `None` for `void`
    pub return_type: Option<String>,
    /// Parameter types
    pub parameter_types: Vec<String>,
    /// Raw descriptor
    pub descriptor: String,
    /// Declared `throws` clause
    pub exceptions: Vec<String>,
    /// Generic signature, if any
    pub signature: Option<String>,
    /// Metadata mentions followed by the references of the method body
    pub references: Vec<Reference>,
}

impl MethodUnit {
    /// Instance constructor
    #[inline]
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Static initializer
    #[inline]
    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    /// Bridge method generated for covariant overrides
    #[inline]
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.access.contains(AccessFlags::BRIDGE)
    }
}

impl Display for MethodUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// A fully parsed class file
///
/// # Example
/// ```no_run
/// use splice_classfile::{ClassUnit, MethodUnit, UnitVisitor};
///
/// struct Methods(Vec<String>);
///
/// impl UnitVisitor for Methods {
///     fn visit_method(&mut self, method: &MethodUnit) {
///         self.0.push(method.to_string());
///     }
/// }
///
/// let bytes = std::fs::read("Foo.class").unwrap();
/// let unit = ClassUnit::parse(&bytes).unwrap();
/// let mut methods = Methods(Vec::new());
/// unit.accept(&mut methods);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassUnit {
    header: ClassHeader,
    fields: Vec<FieldUnit>,
    methods: Vec<MethodUnit>,
    references: Vec<Reference>,
}

impl ClassUnit {
    /// Parse a class file
    ///
    /// # Errors
    /// Returns [`ClassFileError`] for any malformed input.
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor = reader.u16()?;
        let major = reader.u16()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let access = AccessFlags::new(reader.u16()?);
        let name = binary_name(pool.class_name(reader.u16()?)?);
        let super_class = match reader.u16()? {
            0 => None,
            index => Some(binary_name(pool.class_name(index)?)),
        };
        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(binary_name(pool.class_name(reader.u16()?)?));
        }

        let field_count = reader.u16()?;
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for _ in 0..field_count {
            fields.push(parse_field(&mut reader, &pool)?);
        }

        let method_count = reader.u16()?;
        let mut methods = Vec::with_capacity(usize::from(method_count));
        let mut bodies = Vec::with_capacity(usize::from(method_count));
        for _ in 0..method_count {
            let (method, body) = parse_method(&mut reader, &pool)?;
            methods.push(method);
            bodies.push(body);
        }

        // BootstrapMethods follows the methods, so bodies are walked afterwards
        let mut references = Vec::new();
        let mut bootstrap = Vec::new();
        let mut signature = None;
        let attribute_count = reader.u16()?;
        for _ in 0..attribute_count {
            let (attr_name, mut body) = attribute(&mut reader, &pool)?;
            match attr_name {
                "Signature" => signature = Some(pool.utf8(body.u16()?)?.to_string()),
                "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                    annotations(&mut body, &pool, &mut references)?;
                }
                "BootstrapMethods" => bootstrap = bootstrap_methods(&mut body)?,
                _ => {}
            }
        }
        if let Some(signature) = &signature {
            mention_signature(signature, MentionSite::Signature, &mut references)?;
        }

        let scope = CodeScope {
            pool: &pool,
            bootstrap: &bootstrap,
        };
        for (method, body) in methods.iter_mut().zip(bodies) {
            if let Some(body) = body {
                for catch_type in body.catch_types {
                    scope.catch_type(catch_type, &mut method.references)?;
                }
                scope.walk(body.code, &mut method.references)?;
            }
        }

        let header = ClassHeader {
            name,
            super_class,
            interfaces,
            access,
            version: (major, minor),
        };
        trace!(class = %header.name, fields = fields.len(), methods = methods.len(), "parsed class file");
        Ok(Self {
            header,
            fields,
            methods,
            references,
        })
    }

    /// Class identity and supertypes
    #[inline]
    #[must_use]
    pub fn header(&self) -> &ClassHeader {
        &self.header
    }

    /// Binary class name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Declared fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldUnit] {
        &self.fields
    }

    /// Declared methods and constructors
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[MethodUnit] {
        &self.methods
    }

    /// Class-level references (signature and annotations)
    #[inline]
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Drive `visitor` over the unit
    pub fn accept<V: UnitVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_class(&self.header);
        for reference in &self.references {
            visitor.visit_reference(reference);
        }
        for field in &self.fields {
            visitor.visit_field(field);
            for reference in &field.references {
                visitor.visit_reference(reference);
            }
        }
        for method in &self.methods {
            visitor.visit_method(method);
            for reference in &method.references {
                visitor.visit_reference(reference);
            }
        }
        visitor.visit_end();
    }
}

/// Code of a method, walked once the bootstrap table is known
struct PendingBody<'a> {
    code: &'a [u8],
    catch_types: Vec<u16>,
}

fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

fn mention(type_name: &str, site: MentionSite, out: &mut Vec<Reference>) {
    if let Some(name) = element_class(type_name) {
        out.push(Reference::Mention {
            name: name.to_string(),
            site,
        });
    }
}

fn mention_signature(
    signature: &str,
    site: MentionSite,
    out: &mut Vec<Reference>,
) -> Result<(), ClassFileError> {
    for name in referenced_classes(signature)? {
        out.push(Reference::Mention { name, site });
    }
    Ok(())
}

/// Split off one attribute as `(name, body)`
fn attribute<'a, 'p>(
    reader: &mut ByteReader<'a>,
    pool: &'p ConstantPool,
) -> Result<(&'p str, ByteReader<'a>), ClassFileError> {
    let name = pool.utf8(reader.u16()?)?;
    let len = reader.u32()?;
    let len = usize::try_from(len).map_err(|_| ClassFileError::Truncated {
        offset: reader.position(),
        needed: usize::MAX,
    })?;
    Ok((name, ByteReader::new(reader.bytes(len)?)))
}

fn parse_field(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<FieldUnit, ClassFileError> {
    let access = AccessFlags::new(reader.u16()?);
    let name = pool.utf8(reader.u16()?)?.to_string();
    let field_type = field_type(pool.utf8(reader.u16()?)?)?;
    let mut references = Vec::new();
    mention(&field_type, MentionSite::Descriptor, &mut references);
    let mut signature = None;

    let attribute_count = reader.u16()?;
    for _ in 0..attribute_count {
        let (attr_name, mut body) = attribute(reader, pool)?;
        match attr_name {
            "Signature" => {
                let value = pool.utf8(body.u16()?)?;
                mention_signature(value, MentionSite::Signature, &mut references)?;
                signature = Some(value.to_string());
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                annotations(&mut body, pool, &mut references)?;
            }
            _ => {}
        }
    }
    Ok(FieldUnit {
        access,
        name,
        field_type,
        signature,
        references,
    })
}

fn parse_method<'a>(
    reader: &mut ByteReader<'a>,
    pool: &ConstantPool,
) -> Result<(MethodUnit, Option<PendingBody<'a>>), ClassFileError> {
    let access = AccessFlags::new(reader.u16()?);
    let name = pool.utf8(reader.u16()?)?.to_string();
    let descriptor = pool.utf8(reader.u16()?)?.to_string();
    let (parameter_types, return_type) = method_types(&descriptor)?;
    let mut references = Vec::new();
    for ty in parameter_types.iter().chain(return_type.iter()) {
        mention(ty, MentionSite::Descriptor, &mut references);
    }
    let mut exceptions = Vec::new();
    let mut signature = None;
    let mut body = None;

    let attribute_count = reader.u16()?;
    for _ in 0..attribute_count {
        let (attr_name, mut attr) = attribute(reader, pool)?;
        match attr_name {
            "Code" => body = Some(parse_code(&mut attr, pool, &mut references)?),
            "Exceptions" => {
                let count = attr.u16()?;
                for _ in 0..count {
                    let exception = binary_name(pool.class_name(attr.u16()?)?);
                    mention(&exception, MentionSite::Descriptor, &mut references);
                    exceptions.push(exception);
                }
            }
            "Signature" => {
                let value = pool.utf8(attr.u16()?)?;
                mention_signature(value, MentionSite::Signature, &mut references)?;
                signature = Some(value.to_string());
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                annotations(&mut attr, pool, &mut references)?;
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let parameters = attr.u8()?;
                for _ in 0..parameters {
                    annotations(&mut attr, pool, &mut references)?;
                }
            }
            "AnnotationDefault" => element_value(&mut attr, pool, &mut references, 0)?,
            _ => {}
        }
    }
    let method = MethodUnit {
        access,
        name,
        return_type,
        parameter_types,
        descriptor,
        exceptions,
        signature,
        references,
    };
    Ok((method, body))
}

fn parse_code<'a>(
    attr: &mut ByteReader<'a>,
    pool: &ConstantPool,
    references: &mut Vec<Reference>,
) -> Result<PendingBody<'a>, ClassFileError> {
    attr.skip(4)?; // max_stack, max_locals
    let code_len = attr.u32()?;
    let code_len = usize::try_from(code_len).map_err(|_| ClassFileError::Truncated {
        offset: attr.position(),
        needed: usize::MAX,
    })?;
    let code = attr.bytes(code_len)?;

    let handlers = attr.u16()?;
    let mut catch_types = Vec::with_capacity(usize::from(handlers));
    for _ in 0..handlers {
        attr.skip(6)?; // start_pc, end_pc, handler_pc
        catch_types.push(attr.u16()?);
    }

    let attribute_count = attr.u16()?;
    for _ in 0..attribute_count {
        let (attr_name, mut table) = attribute(attr, pool)?;
        match attr_name {
            "LocalVariableTable" => {
                let entries = table.u16()?;
                for _ in 0..entries {
                    table.skip(6)?; // start_pc, length, name
                    let ty = field_type(pool.utf8(table.u16()?)?)?;
                    mention(&ty, MentionSite::LocalVariable, references);
                    table.skip(2)?; // slot
                }
            }
            "LocalVariableTypeTable" => {
                let entries = table.u16()?;
                for _ in 0..entries {
                    table.skip(6)?;
                    let signature = pool.utf8(table.u16()?)?;
                    mention_signature(signature, MentionSite::LocalVariable, references)?;
                    table.skip(2)?;
                }
            }
            _ => {}
        }
    }
    Ok(PendingBody { code, catch_types })
}

fn annotations(
    body: &mut ByteReader<'_>,
    pool: &ConstantPool,
    out: &mut Vec<Reference>,
) -> Result<(), ClassFileError> {
    let count = body.u16()?;
    for _ in 0..count {
        annotation(body, pool, out, 0)?;
    }
    Ok(())
}

fn annotation(
    body: &mut ByteReader<'_>,
    pool: &ConstantPool,
    out: &mut Vec<Reference>,
    depth: usize,
) -> Result<(), ClassFileError> {
    let ty = field_type(pool.utf8(body.u16()?)?)?;
    mention(&ty, MentionSite::Annotation, out);
    let pairs = body.u16()?;
    for _ in 0..pairs {
        body.skip(2)?; // element name
        element_value(body, pool, out, depth)?;
    }
    Ok(())
}

fn element_value(
    body: &mut ByteReader<'_>,
    pool: &ConstantPool,
    out: &mut Vec<Reference>,
    depth: usize,
) -> Result<(), ClassFileError> {
    if depth >= MAX_NESTING {
        return Err(ClassFileError::TooDeep(MAX_NESTING));
    }
    let tag = body.u8()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => body.skip(2)?,
        b'e' => {
            let ty = field_type(pool.utf8(body.u16()?)?)?;
            mention(&ty, MentionSite::Annotation, out);
            body.skip(2)?;
        }
        b'c' => {
            let descriptor = pool.utf8(body.u16()?)?;
            if descriptor != "V" {
                let ty = field_type(descriptor)?;
                mention(&ty, MentionSite::Annotation, out);
            }
        }
        b'@' => annotation(body, pool, out, depth + 1)?,
        b'[' => {
            let count = body.u16()?;
            for _ in 0..count {
                element_value(body, pool, out, depth + 1)?;
            }
        }
        other => return Err(ClassFileError::BadElementTag(char::from(other))),
    }
    Ok(())
}

fn bootstrap_methods(body: &mut ByteReader<'_>) -> Result<Vec<BootstrapMethod>, ClassFileError> {
    let count = body.u16()?;
    let mut methods = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let handle = body.u16()?;
        let argument_count = body.u16()?;
        let mut arguments = SmallVec::with_capacity(usize::from(argument_count));
        for _ in 0..argument_count {
            arguments.push(body.u16()?);
        }
        methods.push(BootstrapMethod { handle, arguments });
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_flag_queries() {
        let flags = AccessFlags::new(AccessFlags::PUBLIC | AccessFlags::SYNTHETIC);
        assert!(flags.is_synthetic());
        assert!(!flags.is_private());
        assert!(flags.contains(AccessFlags::PUBLIC));
        assert_eq!(flags.bits(), 0x1001);
    }

    #[test]
    fn rejects_bad_magic() {
        assert_eq!(
            ClassUnit::parse(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 52]),
            Err(ClassFileError::BadMagic(0xdead_beef))
        );
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            ClassUnit::parse(&[0xca, 0xfe, 0xba, 0xbe, 0, 0]),
            Err(ClassFileError::Truncated { offset: 6, .. })
        ));
    }
}
