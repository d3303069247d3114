//! Subcommand implementations

use crate::config::SpliceConfig;
use anyhow::{Context, Result};
use splice_fingerprint::LibraryFingerprint;
use splice_inject::{CodeContext, DirContext};
use splice_scan::{CompatibilityChecker, FingerprintBuilder, Phase, Verdict};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Process exit status of `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckStatus {
    Compatible = 0,
    Incompatible = 1,
    Undetermined = 2,
}

pub(crate) struct BuildArgs {
    pub(crate) classpath: Vec<PathBuf>,
    pub(crate) roots: Vec<String>,
    pub(crate) owned: Option<PathBuf>,
    pub(crate) depth: Option<usize>,
    pub(crate) phase: Option<Phase>,
    pub(crate) out: PathBuf,
}

/// Directories as one delegation chain; the first directory is consulted first
fn classpath(dirs: &[PathBuf]) -> Result<Arc<dyn CodeContext>> {
    let mut context: Option<Arc<dyn CodeContext>> = None;
    for dir in dirs {
        anyhow::ensure!(dir.is_dir(), "class path entry {} is not a directory", dir.display());
        context = Some(Arc::new(DirContext::new(dir.clone(), context)));
    }
    context.context("no class path given")
}

fn read_fingerprint(path: &Path) -> Result<LibraryFingerprint> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    LibraryFingerprint::from_bytes(&bytes).with_context(|| format!("invalid fingerprint {}", path.display()))
}

pub(crate) fn build(config: &SpliceConfig, args: BuildArgs, out: &mut impl Write) -> Result<()> {
    let mut scan = config.scan.clone();
    if let Some(depth) = args.depth {
        scan = scan.with_compass_depth(depth);
    }
    if let Some(phase) = args.phase {
        scan = scan.with_collate_phase(phase);
    }

    let mut dirs = args.classpath;
    let mut owned = Vec::new();
    if let Some(dir) = args.owned {
        owned = DirContext::new(dir.clone(), None)
            .class_names()
            .with_context(|| format!("failed to list {}", dir.display()))?;
        dirs.push(dir);
    }
    let source = classpath(&dirs)?;

    let fingerprint = FingerprintBuilder::new(&*source)
        .with_config(scan)
        .roots(args.roots)
        .owned(owned)
        .build()?;
    let bytes = fingerprint.to_bytes()?;
    std::fs::write(&args.out, &bytes).with_context(|| format!("failed to write {}", args.out.display()))?;

    let digest = fingerprint.digest()?;
    info!(out = %args.out.display(), %digest, "fingerprint written");
    writeln!(
        out,
        "{} classes -> {} ({})",
        fingerprint.len(),
        args.out.display(),
        digest.short()
    )?;
    Ok(())
}

pub(crate) fn check(
    config: &SpliceConfig,
    fingerprint: &Path,
    dirs: &[PathBuf],
    out: &mut impl Write,
) -> Result<CheckStatus> {
    let fingerprint = read_fingerprint(fingerprint)?;
    let live = classpath(dirs)?;

    let status = match CompatibilityChecker::new(&*live).check(&fingerprint) {
        Verdict::Compatible => {
            writeln!(out, "compatible ({} classes)", fingerprint.len())?;
            CheckStatus::Compatible
        }
        Verdict::Incompatible(errors) => {
            writeln!(out, "incompatible:")?;
            for error in &errors {
                writeln!(out, "  {error}")?;
            }
            CheckStatus::Incompatible
        }
        Verdict::Undetermined { class, reason } => {
            let policy = if config.inject.fail_on_missing_fingerprint {
                "deny"
            } else {
                "permit"
            };
            writeln!(out, "undetermined: {class}: {reason} (default policy: {policy})")?;
            CheckStatus::Undetermined
        }
    };
    Ok(status)
}

pub(crate) fn dump(fingerprint: &Path, json: bool, out: &mut impl Write) -> Result<()> {
    let fingerprint = read_fingerprint(fingerprint)?;
    if json {
        writeln!(out, "{}", fingerprint.to_json()?)?;
        return Ok(());
    }
    writeln!(out, "# {} classes, digest {}", fingerprint.len(), fingerprint.digest()?)?;
    for class in fingerprint.classes() {
        writeln!(out, "{class}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_test_utils::{ClassWriter, MethodDef};

    fn write_class(dir: &Path, name: &str, bytes: &[u8]) {
        let path = dir.join(format!("{}.class", name.replace('.', "/")));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn lib_a(methods: &[&str]) -> Vec<u8> {
        methods
            .iter()
            .fold(ClassWriter::new("lib.A"), |w, m| w.method(MethodDef::public(m, "(I)V")))
            .build()
    }

    #[test]
    fn build_then_check_and_dump() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        let plugin = dir.path().join("plugin");
        write_class(&lib, "lib.A", &lib_a(&["foo"]));
        write_class(
            &plugin,
            "p.Advice",
            &ClassWriter::new("p.Advice")
                .method(MethodDef::public("enter", "()V").invoke_virtual("lib.A", "foo", "(I)V"))
                .build(),
        );
        let fp_path = dir.path().join("plugin.spfp");
        let config = SpliceConfig::default();

        let mut out = Vec::new();
        build(
            &config,
            BuildArgs {
                classpath: vec![lib.clone()],
                roots: vec!["p.Advice".into()],
                owned: Some(plugin),
                depth: None,
                phase: None,
                out: fp_path.clone(),
            },
            &mut out,
        )
        .unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("1 classes"));

        let mut out = Vec::new();
        let status = check(&config, &fp_path, &[lib], &mut out).unwrap();
        assert_eq!(status, CheckStatus::Compatible);

        let changed = dir.path().join("changed");
        write_class(&changed, "lib.A", &lib_a(&["bar"]));
        let mut out = Vec::new();
        let status = check(&config, &fp_path, &[changed], &mut out).unwrap();
        assert_eq!(status, CheckStatus::Incompatible);
        assert!(String::from_utf8(out).unwrap().contains("MISMATCH lib.A"));

        let mut out = Vec::new();
        dump(&fp_path, false, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("void foo(int)"));
    }

    #[test]
    fn unreadable_live_class_is_undetermined() {
        let dir = tempfile::tempdir().unwrap();
        let fp_path = dir.path().join("fp.spfp");
        let fp = LibraryFingerprint::new(vec![splice_fingerprint::ClassFingerprint::builder("lib.A").build()]);
        std::fs::write(&fp_path, fp.to_bytes().unwrap()).unwrap();
        write_class(dir.path(), "lib.A", b"junk");

        let mut out = Vec::new();
        let status = check(&SpliceConfig::default(), &fp_path, &[dir.path().to_path_buf()], &mut out).unwrap();
        assert_eq!(status, CheckStatus::Undetermined);
        assert!(String::from_utf8(out).unwrap().contains("default policy: permit"));
    }

    #[test]
    fn missing_classpath_is_an_error() {
        assert!(classpath(&[]).is_err());
        assert!(classpath(&[PathBuf::from("/nonexistent/classes")]).is_err());
    }
}
