//! Instruction walker

use crate::constant::{Constant, ConstantPool};
use crate::descriptor::{class_from_internal, element_class, field_type, method_types};
use crate::error::ClassFileError;
use crate::reader::{i32_at, u16_at, u8_at};
use crate::visitor::{ClassUsage, FieldAccess, InvokeKind, MentionSite, Reference};
use smallvec::SmallVec;

/// Dynamic constants may name each other through bootstrap arguments
const MAX_CONSTANT_DEPTH: usize = 8;

/// Entry of the `BootstrapMethods` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BootstrapMethod {
    pub(crate) handle: u16,
    pub(crate) arguments: SmallVec<[u16; 4]>,
}

/// Everything needed to turn constant-pool indices into references
pub(crate) struct CodeScope<'a> {
    pub(crate) pool: &'a ConstantPool,
    pub(crate) bootstrap: &'a [BootstrapMethod],
}

impl CodeScope<'_> {
    /// Walk one `Code` array, appending every reference its instructions make
    pub(crate) fn walk(&self, code: &[u8], out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        let mut pc = 0usize;
        while pc < code.len() {
            let opcode = code[pc];
            let len = instruction_length(code, pc, opcode)?;
            if pc + len > code.len() {
                return Err(ClassFileError::Truncated {
                    offset: pc,
                    needed: pc + len - code.len(),
                });
            }
            match opcode {
                0x12 => self.constant(u16::from(u8_at(code, pc + 1)?), 0, out)?,
                0x13 | 0x14 => self.constant(u16_at(code, pc + 1)?, 0, out)?,
                0xb2..=0xb5 => {
                    let access = match opcode {
                        0xb2 => FieldAccess::GetStatic,
                        0xb3 => FieldAccess::PutStatic,
                        0xb4 => FieldAccess::Get,
                        _ => FieldAccess::Put,
                    };
                    self.field(u16_at(code, pc + 1)?, access, out)?;
                }
                0xb6..=0xb9 => {
                    let invoke = match opcode {
                        0xb6 => InvokeKind::Virtual,
                        0xb7 => InvokeKind::Special,
                        0xb8 => InvokeKind::Static,
                        _ => InvokeKind::Interface,
                    };
                    self.method(u16_at(code, pc + 1)?, invoke, out)?;
                }
                0xba => self.call_site(u16_at(code, pc + 1)?, out)?,
                0xbb => self.class(u16_at(code, pc + 1)?, ClassUsage::New, out)?,
                0xbd | 0xc5 => self.class(u16_at(code, pc + 1)?, ClassUsage::NewArray, out)?,
                0xc0 => self.class(u16_at(code, pc + 1)?, ClassUsage::CheckCast, out)?,
                0xc1 => self.class(u16_at(code, pc + 1)?, ClassUsage::InstanceOf, out)?,
                _ => {}
            }
            pc += len;
        }
        Ok(())
    }

    /// Catch type of an exception-table entry
    pub(crate) fn catch_type(&self, index: u16, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        if index == 0 {
            // finally
            return Ok(());
        }
        self.class(index, ClassUsage::Catch, out)
    }

    fn class(&self, index: u16, usage: ClassUsage, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        if let Some(name) = class_from_internal(self.pool.class_name(index)?)? {
            out.push(Reference::Class { name, usage });
        }
        Ok(())
    }

    fn field(&self, index: u16, access: FieldAccess, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        let member = self.pool.member_ref(index)?;
        if !member.is_field {
            return Err(ClassFileError::WrongConstant {
                index,
                expected: "field reference",
            });
        }
        if member.owner.starts_with('[') {
            return Ok(());
        }
        out.push(Reference::Field {
            owner: member.owner.replace('/', "."),
            name: member.name.to_string(),
            field_type: field_type(member.descriptor)?,
            access,
        });
        Ok(())
    }

    fn method(&self, index: u16, invoke: InvokeKind, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        let member = self.pool.member_ref(index)?;
        if member.is_field {
            return Err(ClassFileError::WrongConstant {
                index,
                expected: "method reference",
            });
        }
        if member.owner.starts_with('[') {
            return Ok(());
        }
        let (parameter_types, return_type) = method_types(member.descriptor)?;
        out.push(Reference::Method {
            owner: member.owner.replace('/', "."),
            name: member.name.to_string(),
            return_type,
            parameter_types,
            invoke,
        });
        Ok(())
    }

    fn handle(&self, kind: u8, reference: u16, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        match kind {
            1..=4 => self.field(reference, FieldAccess::Handle, out),
            5..=9 => self.method(reference, InvokeKind::Handle, out),
            _ => Err(ClassFileError::WrongConstant {
                index: reference,
                expected: "method handle kind 1-9",
            }),
        }
    }

    fn call_site(&self, index: u16, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        let Constant::InvokeDynamic { bootstrap, name_and_type } = self.pool.get(index)? else {
            return Err(ClassFileError::WrongConstant {
                index,
                expected: "invokedynamic",
            });
        };
        let (_, descriptor) = self.pool.name_and_type(*name_and_type)?;
        self.method_type(descriptor, out)?;
        self.bootstrap_method(*bootstrap, 0, out)
    }

    fn bootstrap_method(&self, slot: u16, depth: usize, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        let method = self
            .bootstrap
            .get(usize::from(slot))
            .ok_or(ClassFileError::BadBootstrap(slot))?;
        self.constant(method.handle, depth, out)?;
        for argument in &method.arguments {
            self.constant(*argument, depth, out)?;
        }
        Ok(())
    }

    /// Loadable constant: class, method type, method handle or dynamic constant
    fn constant(&self, index: u16, depth: usize, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        match self.pool.get(index)? {
            Constant::Class { .. } => self.class(index, ClassUsage::Constant, out),
            Constant::MethodType { descriptor } => {
                let descriptor = self.pool.utf8(*descriptor)?;
                self.method_type(descriptor, out)
            }
            Constant::MethodHandle { kind, reference } => self.handle(*kind, *reference, out),
            Constant::Dynamic { bootstrap, name_and_type } => {
                if depth >= MAX_CONSTANT_DEPTH {
                    return Ok(());
                }
                let (_, descriptor) = self.pool.name_and_type(*name_and_type)?;
                if let Some(name) = element_class(&field_type(descriptor)?) {
                    out.push(Reference::Mention {
                        name: name.to_string(),
                        site: MentionSite::MethodType,
                    });
                }
                self.bootstrap_method(*bootstrap, depth + 1, out)
            }
            _ => Ok(()),
        }
    }

    fn method_type(&self, descriptor: &str, out: &mut Vec<Reference>) -> Result<(), ClassFileError> {
        let (params, ret) = method_types(descriptor)?;
        for ty in params.iter().chain(ret.iter()) {
            if let Some(name) = element_class(ty) {
                out.push(Reference::Mention {
                    name: name.to_string(),
                    site: MentionSite::MethodType,
                });
            }
        }
        Ok(())
    }
}

/// Total length in bytes of the instruction at `pc`, operands included
fn instruction_length(code: &[u8], pc: usize, opcode: u8) -> Result<usize, ClassFileError> {
    let len = match opcode {
        0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 | 0xac..=0xb1 => 1,
        0xbe | 0xbf | 0xc2 | 0xc3 | 0xca | 0xfe | 0xff => 1,
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 => 3,
        0xbb | 0xbd | 0xc0 | 0xc1 | 0xc6 | 0xc7 => 3,
        0xc5 => 4,
        0xb9 | 0xba | 0xc8 | 0xc9 => 5,
        0xaa => table_switch_length(code, pc)?,
        0xab => lookup_switch_length(code, pc)?,
        0xc4 => match u8_at(code, pc + 1)? {
            0x84 => 6,
            0x15..=0x19 | 0x36..=0x3a | 0xa9 => 4,
            other => {
                return Err(ClassFileError::UnknownOpcode {
                    opcode: other,
                    pc: pc + 1,
                })
            }
        },
        _ => return Err(ClassFileError::UnknownOpcode { opcode, pc }),
    };
    Ok(len)
}

/// Operands of the switches start at the next 4-byte boundary of the code array
fn switch_operands(pc: usize) -> usize {
    let after = pc + 1;
    after + (4 - after % 4) % 4
}

fn table_switch_length(code: &[u8], pc: usize) -> Result<usize, ClassFileError> {
    let base = switch_operands(pc);
    let low = i64::from(i32_at(code, base + 4)?);
    let high = i64::from(i32_at(code, base + 8)?);
    if high < low {
        return Err(ClassFileError::BadSwitch(pc));
    }
    let entries = usize::try_from(high - low + 1).map_err(|_| ClassFileError::BadSwitch(pc))?;
    let end = entries
        .checked_mul(4)
        .and_then(|table| table.checked_add(base + 12))
        .ok_or(ClassFileError::BadSwitch(pc))?;
    Ok(end - pc)
}

fn lookup_switch_length(code: &[u8], pc: usize) -> Result<usize, ClassFileError> {
    let base = switch_operands(pc);
    let pairs = usize::try_from(i32_at(code, base + 4)?).map_err(|_| ClassFileError::BadSwitch(pc))?;
    let end = pairs
        .checked_mul(8)
        .and_then(|table| table.checked_add(base + 8))
        .ok_or(ClassFileError::BadSwitch(pc))?;
    Ok(end - pc)
}
