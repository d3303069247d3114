//! Generic signatures
//!
//! A recursive-descent reader over class, method and field signatures that only
//! collects the classes they name. Type variables and primitives are skipped.

use crate::error::ClassFileError;

/// Type arguments nest through mutual recursion
pub(crate) const MAX_NESTING: usize = 64;

/// Every class named by a class, method or field signature, in order of appearance
///
/// Inner classes are reported with `$` joins (`Outer<TT;>.Inner` names both
/// `Outer` and `Outer$Inner`). Duplicates are kept; callers dedup.
///
/// ```
/// use splice_classfile::signature::referenced_classes;
///
/// let names = referenced_classes("<T:Ljava/lang/Object;>(Ljava/util/List<+TT;>;)Lcom/acme/Box<TT;>;").unwrap();
/// assert_eq!(names, ["java.lang.Object", "java.util.List", "com.acme.Box"]);
/// ```
pub fn referenced_classes(signature: &str) -> Result<Vec<String>, ClassFileError> {
    let mut parser = SignatureParser {
        input: signature.as_bytes(),
        source: signature,
        pos: 0,
        depth: 0,
        found: Vec::new(),
    };
    parser.parse()?;
    Ok(parser.found)
}

struct SignatureParser<'a> {
    input: &'a [u8],
    source: &'a str,
    pos: usize,
    depth: usize,
    found: Vec<String>,
}

impl<'a> SignatureParser<'a> {
    fn parse(&mut self) -> Result<(), ClassFileError> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.pos += 1;
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.pos += 1;
            if self.peek() == Some(b'V') {
                self.pos += 1;
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.pos += 1;
                self.reference_type()?;
            }
        } else {
            // superclass and interfaces, or a single field type
            if self.at_end() {
                return Err(self.error());
            }
            while !self.at_end() {
                self.reference_type()?;
            }
        }
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn type_parameters(&mut self) -> Result<(), ClassFileError> {
        self.expect(b'<')?;
        loop {
            self.identifier(b':')?;
            self.pos += 1;
            // class bound may be empty
            if !matches!(self.peek(), Some(b':' | b'>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.pos += 1;
                self.reference_type()?;
            }
            if self.peek() == Some(b'>') {
                self.pos += 1;
                return Ok(());
            }
        }
    }

    fn java_type(&mut self) -> Result<(), ClassFileError> {
        match self.peek() {
            Some(b'Z' | b'B' | b'C' | b'S' | b'I' | b'J' | b'F' | b'D') => {
                self.pos += 1;
                Ok(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<(), ClassFileError> {
        if self.depth >= MAX_NESTING {
            return Err(ClassFileError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = self.reference_type_inner();
        self.depth -= 1;
        result
    }

    fn reference_type_inner(&mut self) -> Result<(), ClassFileError> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.pos += 1;
                self.identifier(b';')?;
                self.pos += 1;
                Ok(())
            }
            Some(b'[') => {
                self.pos += 1;
                self.java_type()
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<(), ClassFileError> {
        self.expect(b'L')?;
        let mut name = self.class_segment()?.replace('/', ".");
        loop {
            match self.peek() {
                Some(b'<') => self.type_arguments()?,
                Some(b'.') => {
                    self.found.push(name.clone());
                    self.pos += 1;
                    let inner = self.class_segment()?;
                    name.push('$');
                    name.push_str(inner);
                }
                Some(b';') => {
                    self.pos += 1;
                    self.found.push(name);
                    return Ok(());
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn type_arguments(&mut self) -> Result<(), ClassFileError> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.pos += 1,
                Some(b'+' | b'-') => {
                    self.pos += 1;
                    self.reference_type()?;
                }
                Some(_) => self.reference_type()?,
                None => return Err(self.error()),
            }
        }
        self.pos += 1;
        Ok(())
    }

    /// Class path segment up to `<`, `.` or `;`
    fn class_segment(&mut self) -> Result<&'a str, ClassFileError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'<' | b'.' | b';') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start || self.at_end() {
            return Err(self.error());
        }
        let source = self.source;
        match source.get(start..self.pos) {
            Some(segment) => Ok(segment),
            None => Err(self.error()),
        }
    }

    /// Identifier up to (not including) `end`
    fn identifier(&mut self, end: u8) -> Result<(), ClassFileError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == end {
                break;
            }
            if matches!(b, b'<' | b'>' | b';' | b'.' | b'/' | b'[' | b':') {
                return Err(self.error());
            }
            self.pos += 1;
        }
        if self.pos == start || self.at_end() {
            return Err(self.error());
        }
        Ok(())
    }

    fn expect(&mut self, byte: u8) -> Result<(), ClassFileError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self) -> ClassFileError {
        ClassFileError::BadSignature(self.source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_signature() {
        assert_eq!(
            referenced_classes("Ljava/util/Map<Ljava/lang/String;[Lcom/acme/A;>;").unwrap(),
            ["java.lang.String", "com.acme.A", "java.util.Map"]
        );
        assert!(referenced_classes("TT;").unwrap().is_empty());
    }

    #[test]
    fn class_signature_with_bounds() {
        let names = referenced_classes(
            "<K::Ljava/lang/Comparable<TK;>;V:Ljava/lang/Object;>Lcom/acme/Base<TK;>;Lcom/acme/Api;",
        )
        .unwrap();
        assert_eq!(
            names,
            ["java.lang.Comparable", "java.lang.Object", "com.acme.Base", "com.acme.Api"]
        );
    }

    #[test]
    fn inner_class_segments() {
        assert_eq!(
            referenced_classes("Lcom/acme/Outer<TT;>.Inner<*>;").unwrap(),
            ["com.acme.Outer", "com.acme.Outer$Inner"]
        );
    }

    #[test]
    fn method_signature_with_throws() {
        assert_eq!(
            referenced_classes("<E:Ljava/lang/Exception;>(I[TE;)V^TE;^Lcom/acme/Fault;").unwrap(),
            ["java.lang.Exception", "com.acme.Fault"]
        );
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let deep = format!("{}I", "[".repeat(MAX_NESTING + 1));
        assert_eq!(referenced_classes(&deep), Err(ClassFileError::TooDeep(MAX_NESTING)));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "L", "Lcom/acme/A", "<T>V", "(I", "Q", "Lcom/acme/A;X", "TT"] {
            assert!(referenced_classes(bad).is_err(), "{bad}");
        }
    }
}
