//! Field and method descriptors, rendered as source-form type names

use crate::error::ClassFileError;

/// Source-form names of the primitive types
pub const PRIMITIVES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// Render a field descriptor (`I`, `[Ljava/lang/String;`) as a source-form type name
///
/// ```
/// use splice_classfile::descriptor::field_type;
///
/// assert_eq!(field_type("[[I").unwrap(), "int[][]");
/// assert_eq!(field_type("Lcom/acme/Outer$Inner;").unwrap(), "com.acme.Outer$Inner");
/// ```
pub fn field_type(descriptor: &str) -> Result<String, ClassFileError> {
    let (ty, rest) = parse_type(descriptor, descriptor)?;
    if !rest.is_empty() {
        return Err(ClassFileError::BadDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

/// Parameter types and return type (`None` for `void`) of a method descriptor
pub fn method_types(descriptor: &str) -> Result<(Vec<String>, Option<String>), ClassFileError> {
    let bad = || ClassFileError::BadDescriptor(descriptor.to_string());
    let mut rest = descriptor.strip_prefix('(').ok_or_else(bad)?;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        let (ty, after) = parse_type(rest, descriptor)?;
        params.push(ty);
        rest = after;
    }
    let ret = if rest == "V" {
        None
    } else {
        Some(field_type(rest).map_err(|_| bad())?)
    };
    Ok((params, ret))
}

/// Binary class name held by a `Class` constant, or `None` for primitive arrays
///
/// Array constants (`[Lcom/acme/A;`) name their element class.
pub fn class_from_internal(internal: &str) -> Result<Option<String>, ClassFileError> {
    if internal.starts_with('[') {
        let ty = field_type(internal)?;
        Ok(element_class(&ty).map(str::to_string))
    } else if internal.is_empty() {
        Err(ClassFileError::BadDescriptor(String::new()))
    } else {
        Ok(Some(internal.replace('/', ".")))
    }
}

/// Class named by a source-form type, stripping array suffixes; `None` for primitives
///
/// ```
/// use splice_classfile::descriptor::element_class;
///
/// assert_eq!(element_class("com.acme.A[][]"), Some("com.acme.A"));
/// assert_eq!(element_class("int[]"), None);
/// ```
#[must_use]
pub fn element_class(type_name: &str) -> Option<&str> {
    let base = type_name.trim_end_matches("[]");
    if base.is_empty() || PRIMITIVES.contains(&base) {
        None
    } else {
        Some(base)
    }
}

/// Parse one type from the front of `input`, returning it and the remainder
fn parse_type<'a>(input: &'a str, whole: &str) -> Result<(String, &'a str), ClassFileError> {
    let bad = || ClassFileError::BadDescriptor(whole.to_string());
    let mut dims = 0usize;
    let mut rest = input;
    while let Some(after) = rest.strip_prefix('[') {
        dims += 1;
        rest = after;
    }
    let mut chars = rest.chars();
    let base = match chars.next().ok_or_else(bad)? {
        'Z' => "boolean".to_string(),
        'B' => "byte".to_string(),
        'C' => "char".to_string(),
        'S' => "short".to_string(),
        'I' => "int".to_string(),
        'J' => "long".to_string(),
        'F' => "float".to_string(),
        'D' => "double".to_string(),
        'L' => {
            let body = &rest[1..];
            let end = body.find(';').ok_or_else(bad)?;
            if end == 0 {
                return Err(bad());
            }
            let name = body[..end].replace('/', ".");
            rest = &body[end + 1..];
            return Ok((with_dims(name, dims), rest));
        }
        _ => return Err(bad()),
    };
    Ok((with_dims(base, dims), chars.as_str()))
}

fn with_dims(mut name: String, dims: usize) -> String {
    for _ in 0..dims {
        name.push_str("[]");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_field_types() {
        assert_eq!(field_type("Z").unwrap(), "boolean");
        assert_eq!(field_type("Ljava/lang/String;").unwrap(), "java.lang.String");
        assert_eq!(field_type("[Ljava/lang/Object;").unwrap(), "java.lang.Object[]");
        assert!(field_type("V").is_err());
        assert!(field_type("II").is_err());
        assert!(field_type("Lcom/acme/A").is_err());
        assert!(field_type("L;").is_err());
    }

    #[test]
    fn splits_method_descriptors() {
        let (params, ret) = method_types("(I[JLcom/acme/A;)V").unwrap();
        assert_eq!(params, vec!["int", "long[]", "com.acme.A"]);
        assert_eq!(ret, None);

        let (params, ret) = method_types("()[Ljava/lang/String;").unwrap();
        assert!(params.is_empty());
        assert_eq!(ret.as_deref(), Some("java.lang.String[]"));

        assert!(method_types("I)V").is_err());
        assert!(method_types("(I").is_err());
        assert!(method_types("()").is_err());
    }

    #[test]
    fn class_constants_name_element_class() {
        assert_eq!(class_from_internal("com/acme/A").unwrap().as_deref(), Some("com.acme.A"));
        assert_eq!(
            class_from_internal("[[Lcom/acme/A;").unwrap().as_deref(),
            Some("com.acme.A")
        );
        assert_eq!(class_from_internal("[I").unwrap(), None);
        assert!(class_from_internal("").is_err());
    }
}
