//! Property tests for structural containment and member ordering

use proptest::prelude::*;
use splice_fingerprint::{
    ClassFingerprint, ConstructorFingerprint, FieldFingerprint, LibraryFingerprint,
    MethodFingerprint,
};

fn type_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("int".to_string()),
        Just("long".to_string()),
        Just("boolean".to_string()),
        Just("java.lang.String".to_string()),
        Just("com.acme.Widget".to_string()),
        Just("byte[]".to_string()),
    ]
}

fn field() -> impl Strategy<Value = FieldFingerprint> {
    ("[a-z]{1,6}", type_name()).prop_map(|(name, ty)| FieldFingerprint::new(name, ty))
}

fn method() -> impl Strategy<Value = MethodFingerprint> {
    (
        "[a-z]{1,6}",
        proptest::option::of(type_name()),
        proptest::collection::vec(type_name(), 0..3),
        proptest::collection::vec(type_name(), 0..2),
    )
        .prop_map(|(name, ret, params, throws)| MethodFingerprint::new(name, ret, params, throws))
}

fn constructor() -> impl Strategy<Value = ConstructorFingerprint> {
    proptest::collection::vec(type_name(), 0..3)
        .prop_map(|params| ConstructorFingerprint::new(params, Vec::new()))
}

fn class_named(name: &'static str) -> impl Strategy<Value = ClassFingerprint> {
    (
        proptest::collection::vec(constructor(), 0..3),
        proptest::collection::vec(method(), 0..5),
        proptest::collection::vec(field(), 0..5),
    )
        .prop_map(move |(ctors, methods, fields)| {
            ClassFingerprint::new(name, None, ctors, methods, fields)
        })
}

fn union(a: &ClassFingerprint, b: &ClassFingerprint) -> ClassFingerprint {
    ClassFingerprint::new(
        a.name(),
        a.super_class().map(str::to_string),
        a.constructors().iter().chain(b.constructors()).cloned(),
        a.methods().iter().chain(b.methods()).cloned(),
        a.fields().iter().chain(b.fields()).cloned(),
    )
}

proptest! {
    #[test]
    fn prop_containment_is_reflexive(class in class_named("com.acme.A")) {
        prop_assert!(class.compatible(&class));
    }

    #[test]
    fn prop_adding_live_members_never_breaks_compatibility(
        required in class_named("com.acme.A"),
        extra in class_named("com.acme.A"),
    ) {
        // live side starts as exactly what is required, then grows
        let live = required.clone();
        prop_assert!(live.compatible(&required));
        let grown = union(&live, &extra);
        prop_assert!(grown.compatible(&required));
    }

    #[test]
    fn prop_removing_a_required_method_breaks_compatibility(
        required in class_named("com.acme.A"),
    ) {
        prop_assume!(!required.methods().is_empty());
        let dropped = required.methods().iter().next().cloned().unwrap();
        let live = ClassFingerprint::new(
            required.name(),
            None,
            required.constructors().iter().cloned(),
            required.methods().iter().filter(|m| **m != dropped).cloned(),
            required.fields().iter().cloned(),
        );
        prop_assert!(!live.compatible(&required));
    }

    #[test]
    fn prop_field_order_is_lexicographic_by_name(fields in proptest::collection::vec(field(), 0..12)) {
        let class = ClassFingerprint::new("a.A", None, [], [], fields);
        let names: Vec<&str> = class.fields().iter().map(FieldFingerprint::name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        prop_assert_eq!(names, sorted);
    }

    #[test]
    fn prop_method_order_is_name_then_parameters(methods in proptest::collection::vec(method(), 0..12)) {
        let class = ClassFingerprint::new("a.A", None, [], methods, []);
        let keys: Vec<(&str, &[String])> = class
            .methods()
            .iter()
            .map(|m| (m.name(), m.parameter_types()))
            .collect();
        for pair in keys.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn prop_blob_decodes_to_equal_fingerprint(
        a in class_named("com.acme.A"),
        b in class_named("com.acme.B"),
    ) {
        let fp = LibraryFingerprint::new(vec![b, a]);
        let bytes = fp.to_bytes().unwrap();
        let decoded = LibraryFingerprint::from_bytes(&bytes).unwrap();
        prop_assert_eq!(decoded.to_bytes().unwrap(), bytes);
        for (got, want) in decoded.classes().iter().zip(fp.classes()) {
            let throws = |c: &ClassFingerprint| -> Vec<Vec<String>> {
                c.methods().iter().map(|m| m.exception_types().to_vec()).collect()
            };
            prop_assert_eq!(throws(got), throws(want));
        }
        prop_assert_eq!(decoded, fp);
    }
}
