//! Big-endian cursor over class-file bytes

use crate::error::ClassFileError;

#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(ClassFileError::Truncated {
                offset: self.pos,
                needed: len - self.data.len().saturating_sub(self.pos).min(len),
            }),
        }
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.bytes(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Read a `u8` at an absolute offset of a code array
pub(crate) fn u8_at(code: &[u8], pos: usize) -> Result<u8, ClassFileError> {
    code.get(pos).copied().ok_or(ClassFileError::Truncated {
        offset: pos,
        needed: 1,
    })
}

/// Read a big-endian `u16` at an absolute offset of a code array
pub(crate) fn u16_at(code: &[u8], pos: usize) -> Result<u16, ClassFileError> {
    Ok(u16::from_be_bytes([u8_at(code, pos)?, u8_at(code, pos + 1)?]))
}

/// Read a big-endian `i32` at an absolute offset of a code array
pub(crate) fn i32_at(code: &[u8], pos: usize) -> Result<i32, ClassFileError> {
    Ok(i32::from_be_bytes([
        u8_at(code, pos)?,
        u8_at(code, pos + 1)?,
        u8_at(code, pos + 2)?,
        u8_at(code, pos + 3)?,
    ]))
}
