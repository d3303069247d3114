//! Fingerprint build and compatibility, end to end over generated class files

use pretty_assertions::assert_eq;
use splice_fingerprint::{LibraryFingerprint, MethodFingerprint, Reason};
use splice_scan::{CompatibilityChecker, FingerprintBuilder, Phase, ScanConfig, Verdict};
use splice_test_utils::{ClassWriter, FieldDef, MethodDef};
use std::collections::HashMap;

type Source = HashMap<String, Vec<u8>>;

fn source<const N: usize>(classes: [(&str, Vec<u8>); N]) -> Source {
    classes.into_iter().map(|(name, bytes)| (name.to_string(), bytes)).collect()
}

fn advice_calling(owner: &str, name: &str, descriptor: &str) -> Vec<u8> {
    ClassWriter::new("p.Advice")
        .method(MethodDef::public("enter", "()V").invoke_virtual(owner, name, descriptor))
        .build()
}

fn build(packaged: &Source) -> LibraryFingerprint {
    FingerprintBuilder::new(packaged).root("p.Advice").build().unwrap()
}

fn packaged_with_foo() -> Source {
    source([
        ("p.Advice", advice_calling("lib.A", "foo", "(I)V")),
        (
            "lib.A",
            ClassWriter::new("lib.A").method(MethodDef::public("foo", "(I)V")).build(),
        ),
    ])
}

#[test]
fn extra_live_members_are_compatible() {
    let fp = build(&packaged_with_foo());
    assert_eq!(fp.len(), 1);
    let a = fp.class("lib.A").unwrap();
    assert_eq!(
        a.methods().iter().collect::<Vec<_>>(),
        vec![&MethodFingerprint::new("foo", None, vec!["int".into()], vec![])]
    );

    let live = source([(
        "lib.A",
        ClassWriter::new("lib.A")
            .method(MethodDef::public("foo", "(I)V"))
            .method(MethodDef::public("bar", "()V"))
            .build(),
    )]);
    assert_eq!(CompatibilityChecker::new(&live).check(&fp), Verdict::Compatible);
}

#[test]
fn changed_parameter_type_is_a_mismatch() {
    let fp = build(&packaged_with_foo());
    let live = source([(
        "lib.A",
        ClassWriter::new("lib.A")
            .method(MethodDef::public("foo", "(Ljava/lang/String;)V"))
            .build(),
    )]);

    let verdict = CompatibilityChecker::new(&live).check(&fp);
    let errors = verdict.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reason(), Reason::Mismatch);
    assert_eq!(errors[0].class_name(), "lib.A");
    assert!(errors[0].to_string().contains("foo(int)"));
}

#[test]
fn absent_class_is_missing() {
    let packaged = source([
        (
            "p.Advice",
            ClassWriter::new("p.Advice")
                .method(
                    MethodDef::public("enter", "()V")
                        .new_object("lib.B")
                        .invoke_special("lib.B", "<init>", "()V"),
                )
                .build(),
        ),
        (
            "lib.B",
            ClassWriter::new("lib.B").method(MethodDef::constructor("()V")).build(),
        ),
    ]);
    let fp = build(&packaged);
    assert!(fp.class("lib.B").is_some());

    let live = Source::new();
    let verdict = CompatibilityChecker::new(&live).check(&fp);
    let errors = verdict.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reason(), Reason::Missing);
    assert_eq!(errors[0].class_name(), "lib.B");
    assert!(errors[0].actual().is_none());
}

#[test]
fn platform_references_are_not_recorded() {
    let packaged = source([(
        "p.Advice",
        ClassWriter::new("p.Advice")
            .method(
                MethodDef::public("enter", "(Ljava/util/List;)V")
                    .invoke_interface("java.util.List", "size", "()I")
                    .get_static("java.lang.System", "out", "Ljava/io/PrintStream;"),
            )
            .build(),
    )]);
    assert!(build(&packaged).is_empty());
}

#[test]
fn mentions_alone_are_not_required() {
    let packaged = source([(
        "p.Advice",
        ClassWriter::new("p.Advice")
            .method(MethodDef::public("enter", "(Llib/Mentioned;)V").signature("(Llib/Mentioned;)V"))
            .field(FieldDef::public("other", "Llib/Other;"))
            .build(),
    )]);
    assert!(build(&packaged).is_empty());

    let all = FingerprintBuilder::new(&packaged)
        .root("p.Advice")
        .with_config(ScanConfig::new().with_collate_phase(Phase::None))
        .build()
        .unwrap();
    let names: Vec<&str> = all.classes().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["lib.Mentioned", "lib.Other"]);
}

#[test]
fn inherited_field_reference_is_pruned() {
    // Reading `Sub.shared` where `shared` is declared on `Base`: once `Sub`
    // has been visited without declaring it, the field log is dropped.
    let packaged = source([
        (
            "p.Advice",
            ClassWriter::new("p.Advice")
                .method(MethodDef::public("enter", "()V").get_field("lib.Sub", "shared", "I"))
                .build(),
        ),
        ("lib.Sub", ClassWriter::new("lib.Sub").extends("lib.Base").build()),
        (
            "lib.Base",
            ClassWriter::new("lib.Base").field(FieldDef::public("shared", "I")).build(),
        ),
    ]);
    let fp = build(&packaged);
    let sub = fp.class("lib.Sub").unwrap();
    assert!(sub.fields().is_empty());
    assert_eq!(sub.super_class(), Some("lib.Base"));

    // without deepening, the reference survives
    let shallow = FingerprintBuilder::new(&packaged)
        .root("p.Advice")
        .with_config(ScanConfig::new().with_compass_depth(0))
        .build()
        .unwrap();
    assert_eq!(shallow.class("lib.Sub").unwrap().fields().len(), 1);
}

#[test]
fn persisted_fingerprint_checks_the_same() {
    let fp = build(&packaged_with_foo());
    let restored = LibraryFingerprint::from_bytes(&fp.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, fp);

    let live = packaged_with_foo();
    assert!(CompatibilityChecker::new(&live).check(&restored).is_compatible());
}
