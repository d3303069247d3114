//! Error types for class-file reading

/// Errors while reading a binary unit
///
/// Every malformed input maps to one of these; the reader never panics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassFileError {
    /// File does not start with `0xCAFEBABE`
    #[error("bad magic: {0:#010x}")]
    BadMagic(u32),

    /// Input ended early
    #[error("truncated at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    /// Constant-pool index out of range or pointing at a padding slot
    #[error("invalid constant-pool index {0}")]
    BadIndex(u16),

    /// Constant-pool entry has the wrong kind for its use
    #[error("constant {index} is not a {expected}")]
    WrongConstant { index: u16, expected: &'static str },

    /// Unknown constant-pool tag
    #[error("unknown constant tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: u16 },

    /// Invalid modified UTF-8 in a string constant
    #[error("invalid modified utf-8 in constant {0}")]
    BadUtf8(u16),

    /// Malformed field or method descriptor
    #[error("malformed descriptor: {0}")]
    BadDescriptor(String),

    /// Malformed generic signature
    #[error("malformed signature: {0}")]
    BadSignature(String),

    /// Unknown instruction in a code body
    #[error("unknown opcode {opcode:#04x} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    /// Switch instruction with an impossible range
    #[error("malformed switch at pc {0}")]
    BadSwitch(usize),

    /// Invokedynamic or dynamic constant naming a missing bootstrap method
    #[error("bootstrap method {0} not declared")]
    BadBootstrap(u16),

    /// Unknown annotation element tag
    #[error("unknown annotation element tag {0:?}")]
    BadElementTag(char),

    /// Annotation values or signature type arguments nested too deeply
    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),
}
