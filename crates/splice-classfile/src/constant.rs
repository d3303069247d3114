//! Constant pool

use crate::error::ClassFileError;
use crate::reader::ByteReader;

/// One constant-pool entry
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Constant {
    /// Index 0 and the second slot of `Long`/`Double`
    Unusable,
    Utf8(String),
    Integer,
    Float,
    Long,
    Double,
    Class { name: u16 },
    String,
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module,
    Package,
}

/// A resolved field or method reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemberRef<'a> {
    pub(crate) owner: &'a str,
    pub(crate) name: &'a str,
    pub(crate) descriptor: &'a str,
    pub(crate) is_field: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Unusable);
        let mut index: u16 = 1;
        while index < count {
            let tag = reader.u8()?;
            let entry = match tag {
                1 => {
                    let len = reader.u16()?;
                    let bytes = reader.bytes(usize::from(len))?;
                    Constant::Utf8(decode_modified_utf8(bytes).ok_or(ClassFileError::BadUtf8(index))?)
                }
                3 => {
                    reader.skip(4)?;
                    Constant::Integer
                }
                4 => {
                    reader.skip(4)?;
                    Constant::Float
                }
                5 => {
                    reader.skip(8)?;
                    Constant::Long
                }
                6 => {
                    reader.skip(8)?;
                    Constant::Double
                }
                7 => Constant::Class { name: reader.u16()? },
                8 => {
                    reader.skip(2)?;
                    Constant::String
                }
                9 => Constant::FieldRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                10 => Constant::MethodRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: reader.u8()?,
                    reference: reader.u16()?,
                },
                16 => Constant::MethodType {
                    descriptor: reader.u16()?,
                },
                17 => Constant::Dynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                19 => {
                    reader.skip(2)?;
                    Constant::Module
                }
                20 => {
                    reader.skip(2)?;
                    Constant::Package
                }
                _ => return Err(ClassFileError::UnknownTag { tag, index }),
            };
            let wide = matches!(entry, Constant::Long | Constant::Double);
            entries.push(entry);
            index += 1;
            if wide {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        match self.entries.get(usize::from(index)) {
            None | Some(Constant::Unusable) => Err(ClassFileError::BadIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(ClassFileError::WrongConstant { index, expected: "utf8" }),
        }
    }

    /// Internal name (or array descriptor) held by a `Class` constant
    pub(crate) fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            _ => Err(ClassFileError::WrongConstant { index, expected: "class" }),
        }
    }

    pub(crate) fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(ClassFileError::WrongConstant {
                index,
                expected: "name-and-type",
            }),
        }
    }

    pub(crate) fn member_ref(&self, index: u16) -> Result<MemberRef<'_>, ClassFileError> {
        let (class, name_and_type, is_field) = match self.get(index)? {
            Constant::FieldRef { class, name_and_type } => (*class, *name_and_type, true),
            Constant::MethodRef { class, name_and_type }
            | Constant::InterfaceMethodRef { class, name_and_type } => {
                (*class, *name_and_type, false)
            }
            _ => {
                return Err(ClassFileError::WrongConstant {
                    index,
                    expected: "member reference",
                })
            }
        };
        let owner = self.class_name(class)?;
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner,
            name,
            descriptor,
            is_field,
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Decode the JVM's modified UTF-8 (two-byte NUL, surrogate pairs as two 3-byte units)
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() && !bytes.contains(&0) {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return None;
            }
            units.push(u16::from(b0));
            i += 1;
        } else if b0 & 0xe0 == 0xc0 {
            let b1 = *bytes.get(i + 1)?;
            if b1 & 0xc0 != 0x80 {
                return None;
            }
            units.push((u16::from(b0 & 0x1f) << 6) | u16::from(b1 & 0x3f));
            i += 2;
        } else if b0 & 0xf0 == 0xe0 {
            let b1 = *bytes.get(i + 1)?;
            let b2 = *bytes.get(i + 2)?;
            if b1 & 0xc0 != 0x80 || b2 & 0xc0 != 0x80 {
                return None;
            }
            units.push(
                (u16::from(b0 & 0x0f) << 12) | (u16::from(b1 & 0x3f) << 6) | u16::from(b2 & 0x3f),
            );
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}
