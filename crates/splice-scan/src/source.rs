//! Where binary units come from

use crate::error::ScanError;
use splice_classfile::ClassUnit;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

/// Resolves a binary class name to class-file bytes
///
/// `Ok(None)` means the class does not exist in this source; `Err` is a read
/// failure. Implemented by code-loading contexts and by plain maps in tests.
pub trait UnitSource {
    /// Bytes of `class_name` (`com.acme.Foo`), if present
    ///
    /// # Errors
    /// Returns an I/O error when the unit exists but cannot be read.
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>>;
}

impl<T: UnitSource + ?Sized> UnitSource for &T {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).read_unit(class_name)
    }
}

impl<T: UnitSource + ?Sized> UnitSource for Arc<T> {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).read_unit(class_name)
    }
}

impl UnitSource for HashMap<String, Vec<u8>> {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.get(class_name).cloned())
    }
}

impl UnitSource for BTreeMap<String, Vec<u8>> {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.get(class_name).cloned())
    }
}

/// Read and parse `class_name` from `source`
///
/// # Errors
/// [`ScanError::Io`] when the read fails, [`ScanError::Malformed`] when the
/// bytes do not parse or declare a different class.
pub fn load_unit<S: UnitSource + ?Sized>(
    source: &S,
    class_name: &str,
) -> Result<Option<ClassUnit>, ScanError> {
    let Some(bytes) = source.read_unit(class_name).map_err(|source| ScanError::Io {
        class: class_name.to_string(),
        source,
    })?
    else {
        return Ok(None);
    };
    let unit = ClassUnit::parse(&bytes).map_err(|source| ScanError::Malformed {
        class: class_name.to_string(),
        source,
    })?;
    if unit.name() != class_name {
        return Err(ScanError::Malformed {
            class: class_name.to_string(),
            source: splice_classfile::ClassFileError::BadDescriptor(format!(
                "unit declares {}",
                unit.name()
            )),
        });
    }
    Ok(Some(unit))
}
