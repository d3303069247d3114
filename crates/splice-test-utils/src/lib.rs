//! Testing utilities for splice workspace
//!
//! [`ClassWriter`] emits real class files so tests exercise the reader, the
//! scanner and the injector on the same bytes a JVM toolchain would produce.
//! Class names are given in binary form (`com.acme.Foo`), descriptors in JVM
//! form (`(I)V`, `Lcom/acme/Foo;`).

#![allow(missing_docs)]

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;

/// Method handle kinds
pub const REF_GET_FIELD: u8 = 1;
pub const REF_INVOKE_VIRTUAL: u8 = 5;
pub const REF_INVOKE_STATIC: u8 = 6;
pub const REF_NEW_INVOKE_SPECIAL: u8 = 8;

fn internal(name: &str) -> String {
    name.replace('.', "/")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Entry {
    Utf8(String),
    Integer(i32),
    Class(u16),
    NameAndType(u16, u16),
    Field(u16, u16),
    Method(u16, u16),
    InterfaceMethod(u16, u16),
    MethodType(u16),
    MethodHandle(u8, u16),
    InvokeDynamic(u16, u16),
}

#[derive(Debug, Default)]
struct Pool {
    bytes: Vec<u8>,
    next: u16,
    index: HashMap<Entry, u16>,
}

impl Pool {
    fn add(&mut self, entry: Entry) -> u16 {
        if let Some(index) = self.index.get(&entry) {
            return *index;
        }
        if self.next == 0 {
            self.next = 1;
        }
        let index = self.next;
        self.next += 1;
        match &entry {
            Entry::Utf8(s) => {
                self.bytes.push(1);
                self.bytes.extend((s.len() as u16).to_be_bytes());
                self.bytes.extend(s.as_bytes());
            }
            Entry::Integer(v) => {
                self.bytes.push(3);
                self.bytes.extend(v.to_be_bytes());
            }
            Entry::Class(name) => {
                self.bytes.push(7);
                self.bytes.extend(name.to_be_bytes());
            }
            Entry::NameAndType(name, desc) => {
                self.bytes.push(12);
                self.bytes.extend(name.to_be_bytes());
                self.bytes.extend(desc.to_be_bytes());
            }
            Entry::Field(class, nat) | Entry::Method(class, nat) | Entry::InterfaceMethod(class, nat) => {
                let tag = match entry {
                    Entry::Field(..) => 9,
                    Entry::Method(..) => 10,
                    _ => 11,
                };
                self.bytes.push(tag);
                self.bytes.extend(class.to_be_bytes());
                self.bytes.extend(nat.to_be_bytes());
            }
            Entry::MethodType(desc) => {
                self.bytes.push(16);
                self.bytes.extend(desc.to_be_bytes());
            }
            Entry::MethodHandle(kind, reference) => {
                self.bytes.push(15);
                self.bytes.push(*kind);
                self.bytes.extend(reference.to_be_bytes());
            }
            Entry::InvokeDynamic(bootstrap, nat) => {
                self.bytes.push(18);
                self.bytes.extend(bootstrap.to_be_bytes());
                self.bytes.extend(nat.to_be_bytes());
            }
        }
        self.index.insert(entry, index);
        index
    }

    fn utf8(&mut self, s: &str) -> u16 {
        self.add(Entry::Utf8(s.to_string()))
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(&internal(name));
        self.add(Entry::Class(name))
    }

    fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        self.add(Entry::NameAndType(name, desc))
    }

    fn member(&mut self, kind: MemberKind, owner: &str, name: &str, desc: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, desc);
        match kind {
            MemberKind::Field => self.add(Entry::Field(class, nat)),
            MemberKind::Method => self.add(Entry::Method(class, nat)),
            MemberKind::InterfaceMethod => self.add(Entry::InterfaceMethod(class, nat)),
        }
    }

    fn handle(&mut self, handle: &Handle) -> u16 {
        let kind = if handle.kind <= 4 {
            MemberKind::Field
        } else if handle.interface {
            MemberKind::InterfaceMethod
        } else {
            MemberKind::Method
        };
        let reference = self.member(kind, &handle.owner, &handle.name, &handle.descriptor);
        self.add(Entry::MethodHandle(handle.kind, reference))
    }
}

#[derive(Debug, Clone, Copy)]
enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

/// A method handle constant
#[derive(Debug, Clone)]
pub struct Handle {
    pub kind: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

impl Handle {
    pub fn new(kind: u8, owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface: false,
        }
    }
}

/// Static argument of a bootstrap method
#[derive(Debug, Clone)]
pub enum BootstrapArg {
    Class(String),
    MethodType(String),
    Handle(Handle),
    Int(i32),
}

/// One instruction with symbolic operands
#[derive(Debug, Clone)]
pub enum Insn {
    InvokeVirtual(String, String, String),
    InvokeSpecial(String, String, String),
    InvokeStatic(String, String, String),
    InvokeInterface(String, String, String),
    GetField(String, String, String),
    PutField(String, String, String),
    GetStatic(String, String, String),
    PutStatic(String, String, String),
    New(String),
    ANewArray(String),
    MultiANewArray(String, u8),
    CheckCast(String),
    InstanceOf(String),
    LdcClass(String),
    LdcInt(i32),
    LdcMethodType(String),
    LdcHandle(Handle),
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: Handle,
        args: Vec<BootstrapArg>,
    },
    /// Bytes copied verbatim
    Raw(Vec<u8>),
}

fn triple(owner: &str, name: &str, desc: &str) -> (String, String, String) {
    (owner.to_string(), name.to_string(), desc.to_string())
}

/// Field declaration
#[derive(Debug, Clone)]
pub struct FieldDef {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    annotations: Vec<String>,
}

impl FieldDef {
    pub fn new(access: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            annotations: Vec::new(),
        }
    }

    pub fn public(name: &str, descriptor: &str) -> Self {
        Self::new(ACC_PUBLIC, name, descriptor)
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn annotate(mut self, descriptor: &str) -> Self {
        self.annotations.push(descriptor.to_string());
        self
    }
}

/// Method declaration with an optional body
#[derive(Debug, Clone)]
pub struct MethodDef {
    access: u16,
    name: String,
    descriptor: String,
    exceptions: Vec<String>,
    signature: Option<String>,
    annotations: Vec<String>,
    code: Option<Vec<Insn>>,
    catch_types: Vec<String>,
    locals: Vec<(String, String)>,
}

impl MethodDef {
    pub fn new(access: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            exceptions: Vec::new(),
            signature: None,
            annotations: Vec::new(),
            code: Some(Vec::new()),
            catch_types: Vec::new(),
            locals: Vec::new(),
        }
    }

    pub fn public(name: &str, descriptor: &str) -> Self {
        Self::new(ACC_PUBLIC, name, descriptor)
    }

    pub fn constructor(descriptor: &str) -> Self {
        Self::new(ACC_PUBLIC, "<init>", descriptor)
    }

    /// Abstract or native: no `Code` attribute
    pub fn without_code(mut self) -> Self {
        self.code = None;
        self
    }

    pub fn throws(mut self, class: &str) -> Self {
        self.exceptions.push(class.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn annotate(mut self, descriptor: &str) -> Self {
        self.annotations.push(descriptor.to_string());
        self
    }

    pub fn catches(mut self, class: &str) -> Self {
        self.catch_types.push(class.to_string());
        self
    }

    pub fn local(mut self, name: &str, descriptor: &str) -> Self {
        self.locals.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub fn insn(mut self, insn: Insn) -> Self {
        self.code.get_or_insert_with(Vec::new).push(insn);
        self
    }

    pub fn invoke_virtual(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::InvokeVirtual(o, n, d))
    }

    pub fn invoke_special(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::InvokeSpecial(o, n, d))
    }

    pub fn invoke_static(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::InvokeStatic(o, n, d))
    }

    pub fn invoke_interface(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::InvokeInterface(o, n, d))
    }

    pub fn get_field(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::GetField(o, n, d))
    }

    pub fn put_field(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::PutField(o, n, d))
    }

    pub fn get_static(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::GetStatic(o, n, d))
    }

    pub fn put_static(self, owner: &str, name: &str, desc: &str) -> Self {
        let (o, n, d) = triple(owner, name, desc);
        self.insn(Insn::PutStatic(o, n, d))
    }

    pub fn new_object(self, class: &str) -> Self {
        self.insn(Insn::New(class.to_string()))
    }

    pub fn check_cast(self, class: &str) -> Self {
        self.insn(Insn::CheckCast(class.to_string()))
    }

    pub fn instance_of(self, class: &str) -> Self {
        self.insn(Insn::InstanceOf(class.to_string()))
    }

    pub fn ldc_class(self, class: &str) -> Self {
        self.insn(Insn::LdcClass(class.to_string()))
    }
}

/// Class-file writer
///
/// ```
/// use splice_test_utils::{ClassWriter, MethodDef};
///
/// let bytes = ClassWriter::new("com.acme.A")
///     .method(MethodDef::public("foo", "(I)V"))
///     .build();
/// assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);
/// ```
#[derive(Debug, Clone)]
pub struct ClassWriter {
    name: String,
    access: u16,
    super_class: Option<String>,
    interfaces: Vec<String>,
    signature: Option<String>,
    annotations: Vec<String>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
}

impl ClassWriter {
    /// Public class extending `java.lang.Object`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: ACC_PUBLIC | 0x0020,
            super_class: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            signature: None,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut writer = Self::new(name);
        writer.access = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        writer
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn extends(mut self, super_class: &str) -> Self {
        self.super_class = Some(super_class.to_string());
        self
    }

    pub fn no_super(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn annotate(mut self, descriptor: &str) -> Self {
        self.annotations.push(descriptor.to_string());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = Pool::default();
        let mut bootstrap: Vec<(u16, Vec<u16>)> = Vec::new();

        let this = pool.class(&self.name);
        let super_index = self.super_class.as_deref().map_or(0, |s| pool.class(s));
        let interfaces: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();

        let mut fields = Vec::new();
        for field in &self.fields {
            fields.extend(field.access.to_be_bytes());
            fields.extend(pool.utf8(&field.name).to_be_bytes());
            fields.extend(pool.utf8(&field.descriptor).to_be_bytes());
            let mut attrs = Vec::new();
            if let Some(sig) = &field.signature {
                attrs.push(signature_attr(&mut pool, sig));
            }
            if !field.annotations.is_empty() {
                attrs.push(annotations_attr(&mut pool, &field.annotations));
            }
            write_attrs(&mut fields, &attrs);
        }

        let mut methods = Vec::new();
        for method in &self.methods {
            methods.extend(method.access.to_be_bytes());
            methods.extend(pool.utf8(&method.name).to_be_bytes());
            methods.extend(pool.utf8(&method.descriptor).to_be_bytes());
            let mut attrs = Vec::new();
            if let Some(code) = &method.code {
                attrs.push(code_attr(&mut pool, &mut bootstrap, method, code));
            }
            if !method.exceptions.is_empty() {
                let mut body = (method.exceptions.len() as u16).to_be_bytes().to_vec();
                for exception in &method.exceptions {
                    body.extend(pool.class(exception).to_be_bytes());
                }
                attrs.push(attr(&mut pool, "Exceptions", body));
            }
            if let Some(sig) = &method.signature {
                attrs.push(signature_attr(&mut pool, sig));
            }
            if !method.annotations.is_empty() {
                attrs.push(annotations_attr(&mut pool, &method.annotations));
            }
            write_attrs(&mut methods, &attrs);
        }

        let mut class_attrs = Vec::new();
        if let Some(sig) = &self.signature {
            class_attrs.push(signature_attr(&mut pool, sig));
        }
        if !self.annotations.is_empty() {
            class_attrs.push(annotations_attr(&mut pool, &self.annotations));
        }
        if !bootstrap.is_empty() {
            let mut body = (bootstrap.len() as u16).to_be_bytes().to_vec();
            for (handle, args) in &bootstrap {
                body.extend(handle.to_be_bytes());
                body.extend((args.len() as u16).to_be_bytes());
                for arg in args {
                    body.extend(arg.to_be_bytes());
                }
            }
            class_attrs.push(attr(&mut pool, "BootstrapMethods", body));
        }

        let mut out = vec![0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 61];
        out.extend(pool.next.max(1).to_be_bytes());
        out.extend(&pool.bytes);
        out.extend(self.access.to_be_bytes());
        out.extend(this.to_be_bytes());
        out.extend(super_index.to_be_bytes());
        out.extend((interfaces.len() as u16).to_be_bytes());
        for interface in interfaces {
            out.extend(interface.to_be_bytes());
        }
        out.extend((self.fields.len() as u16).to_be_bytes());
        out.extend(fields);
        out.extend((self.methods.len() as u16).to_be_bytes());
        out.extend(methods);
        write_attrs(&mut out, &class_attrs);
        out
    }
}

fn attr(pool: &mut Pool, name: &str, body: Vec<u8>) -> Vec<u8> {
    let mut out = pool.utf8(name).to_be_bytes().to_vec();
    out.extend((body.len() as u32).to_be_bytes());
    out.extend(body);
    out
}

fn write_attrs(out: &mut Vec<u8>, attrs: &[Vec<u8>]) {
    out.extend((attrs.len() as u16).to_be_bytes());
    for a in attrs {
        out.extend(a);
    }
}

fn signature_attr(pool: &mut Pool, signature: &str) -> Vec<u8> {
    let index = pool.utf8(signature);
    attr(pool, "Signature", index.to_be_bytes().to_vec())
}

fn annotations_attr(pool: &mut Pool, descriptors: &[String]) -> Vec<u8> {
    let mut body = (descriptors.len() as u16).to_be_bytes().to_vec();
    for descriptor in descriptors {
        body.extend(pool.utf8(descriptor).to_be_bytes());
        body.extend(0u16.to_be_bytes());
    }
    attr(pool, "RuntimeVisibleAnnotations", body)
}

fn bootstrap_arg(pool: &mut Pool, arg: &BootstrapArg) -> u16 {
    match arg {
        BootstrapArg::Class(name) => pool.class(name),
        BootstrapArg::MethodType(desc) => {
            let desc = pool.utf8(desc);
            pool.add(Entry::MethodType(desc))
        }
        BootstrapArg::Handle(handle) => pool.handle(handle),
        BootstrapArg::Int(v) => pool.add(Entry::Integer(*v)),
    }
}

fn ldc(code: &mut Vec<u8>, index: u16) {
    if index < 256 {
        code.push(0x12);
        code.push(index as u8);
    } else {
        code.push(0x13);
        code.extend(index.to_be_bytes());
    }
}

#[allow(clippy::too_many_arguments)]
fn member_insn(
    code: &mut Vec<u8>,
    pool: &mut Pool,
    op: u8,
    kind: MemberKind,
    owner: &str,
    name: &str,
    desc: &str,
) {
    code.push(op);
    code.extend(pool.member(kind, owner, name, desc).to_be_bytes());
}

fn code_attr(
    pool: &mut Pool,
    bootstrap: &mut Vec<(u16, Vec<u16>)>,
    method: &MethodDef,
    insns: &[Insn],
) -> Vec<u8> {
    let mut code = Vec::new();
    for insn in insns {
        match insn {
            Insn::InvokeVirtual(o, n, d) => member_insn(&mut code, pool, 0xb6, MemberKind::Method, o, n, d),
            Insn::InvokeSpecial(o, n, d) => member_insn(&mut code, pool, 0xb7, MemberKind::Method, o, n, d),
            Insn::InvokeStatic(o, n, d) => member_insn(&mut code, pool, 0xb8, MemberKind::Method, o, n, d),
            Insn::InvokeInterface(o, n, d) => {
                member_insn(&mut code, pool, 0xb9, MemberKind::InterfaceMethod, o, n, d);
                code.extend([1, 0]);
            }
            Insn::GetStatic(o, n, d) => member_insn(&mut code, pool, 0xb2, MemberKind::Field, o, n, d),
            Insn::PutStatic(o, n, d) => member_insn(&mut code, pool, 0xb3, MemberKind::Field, o, n, d),
            Insn::GetField(o, n, d) => member_insn(&mut code, pool, 0xb4, MemberKind::Field, o, n, d),
            Insn::PutField(o, n, d) => member_insn(&mut code, pool, 0xb5, MemberKind::Field, o, n, d),
            Insn::New(c) => {
                code.push(0xbb);
                code.extend(pool.class(c).to_be_bytes());
            }
            Insn::ANewArray(c) => {
                code.push(0xbd);
                code.extend(pool.class(c).to_be_bytes());
            }
            Insn::MultiANewArray(c, dims) => {
                code.push(0xc5);
                code.extend(pool.class(c).to_be_bytes());
                code.push(*dims);
            }
            Insn::CheckCast(c) => {
                code.push(0xc0);
                code.extend(pool.class(c).to_be_bytes());
            }
            Insn::InstanceOf(c) => {
                code.push(0xc1);
                code.extend(pool.class(c).to_be_bytes());
            }
            Insn::LdcClass(c) => {
                let index = pool.class(c);
                ldc(&mut code, index);
            }
            Insn::LdcInt(v) => {
                let index = pool.add(Entry::Integer(*v));
                ldc(&mut code, index);
            }
            Insn::LdcMethodType(d) => {
                let desc = pool.utf8(d);
                let index = pool.add(Entry::MethodType(desc));
                ldc(&mut code, index);
            }
            Insn::LdcHandle(h) => {
                let index = pool.handle(h);
                ldc(&mut code, index);
            }
            Insn::InvokeDynamic {
                name,
                descriptor,
                bootstrap: handle,
                args,
            } => {
                let handle = pool.handle(handle);
                let args: Vec<u16> = args.iter().map(|a| bootstrap_arg(pool, a)).collect();
                let slot = bootstrap.len() as u16;
                bootstrap.push((handle, args));
                let nat = pool.name_and_type(name, descriptor);
                let index = pool.add(Entry::InvokeDynamic(slot, nat));
                code.push(0xba);
                code.extend(index.to_be_bytes());
                code.extend([0, 0]);
            }
            Insn::Raw(bytes) => code.extend(bytes),
        }
    }
    code.push(0xb1);

    let mut body = Vec::new();
    body.extend(16u16.to_be_bytes());
    body.extend(16u16.to_be_bytes());
    body.extend((code.len() as u32).to_be_bytes());
    let code_len = code.len() as u16;
    body.extend(code);
    body.extend((method.catch_types.len() as u16).to_be_bytes());
    for catch in &method.catch_types {
        body.extend(0u16.to_be_bytes());
        body.extend(code_len.to_be_bytes());
        body.extend(0u16.to_be_bytes());
        body.extend(pool.class(catch).to_be_bytes());
    }
    let mut attrs = Vec::new();
    if !method.locals.is_empty() {
        let mut table = (method.locals.len() as u16).to_be_bytes().to_vec();
        for (slot, (name, descriptor)) in method.locals.iter().enumerate() {
            table.extend(0u16.to_be_bytes());
            table.extend(code_len.to_be_bytes());
            table.extend(pool.utf8(name).to_be_bytes());
            table.extend(pool.utf8(descriptor).to_be_bytes());
            table.extend((slot as u16).to_be_bytes());
        }
        attrs.push(attr(pool, "LocalVariableTable", table));
    }
    write_attrs(&mut body, &attrs);
    attr(pool, "Code", body)
}
