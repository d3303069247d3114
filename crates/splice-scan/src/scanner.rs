//! Reachability scanner
//!
//! Reads one class at a time and feeds its declared shape and every outgoing
//! reference into a [`LogSet`]. [`Scanner::compass`] then deepens the
//! still-unresolved logs breadth-first, bounded by a class budget.
//!
//! # Phases
//!
//! | Source | Recorded as | Phase |
//! |---|---|---|
//! | scanned class | class log with supertypes | scan phase |
//! | superclass, interfaces, descriptor/signature/annotation mentions | class log | NONE |
//! | declared non-private, non-synthetic members | field/method log, resolved | scan phase |
//! | declared constructors | `<init>` log, resolved at `visit_end` | scan phase |
//! | `new`, casts, array creation, class constants, catch types, `<init>` calls | class log | LOAD |
//! | field instructions | field log, unresolved | CALL |
//! | method calls and handles | method log, resolved | CALL |
//!
//! A reference is recorded at the weaker of its table phase and the phase its
//! class is scanned at, so deepening a merely mentioned class never raises
//! requirements.

use crate::error::ScanError;
use crate::exclusion::Exclusions;
use crate::log::Log;
use crate::phase::Phase;
use crate::registry::LogSet;
use crate::source::{load_unit, UnitSource};
use splice_classfile::{ClassHeader, FieldUnit, MethodUnit, Reference, UnitVisitor};
use splice_fingerprint::ClassFingerprint;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Superclass treated as "no superclass" in fingerprints
pub(crate) const ROOT_CLASS: &str = "java.lang.Object";

/// Single-build scanner over a [`UnitSource`]
#[derive(Debug)]
pub struct Scanner<'s, S: UnitSource + ?Sized> {
    source: &'s S,
    exclusions: Exclusions,
    owned: HashSet<String>,
    logs: LogSet,
    attempted: HashSet<String>,
    unreadable: HashSet<String>,
}

impl<'s, S: UnitSource + ?Sized> Scanner<'s, S> {
    /// Create scanner with an empty registry
    #[must_use]
    pub fn new(source: &'s S, exclusions: Exclusions) -> Self {
        Self {
            source,
            exclusions,
            owned: HashSet::new(),
            logs: LogSet::new(),
            attempted: HashSet::new(),
            unreadable: HashSet::new(),
        }
    }

    /// Classes that belong to the scanned code itself; compass scans them at LOAD
    #[must_use]
    pub fn with_owned(mut self, owned: impl IntoIterator<Item = String>) -> Self {
        self.owned.extend(owned);
        self
    }

    /// Scan one class at `phase`
    ///
    /// Returns `false` when the class is excluded or cannot be read. Reading
    /// failures are logged and leave the class's logs resolved, so the class
    /// stays in the registry and is never pulled again. Each class is scanned
    /// at most once.
    pub fn fingerprint(&mut self, phase: Phase, class_name: &str) -> bool {
        if self.exclusions.is_excluded(class_name) {
            debug!(class = class_name, "excluded; not scanned");
            return false;
        }
        if !self.attempted.insert(class_name.to_string()) {
            return !self.unreadable.contains(class_name);
        }
        match load_unit(self.source, class_name) {
            Ok(Some(unit)) => {
                let mut visitor = ScanVisitor {
                    logs: &mut self.logs,
                    exclusions: &self.exclusions,
                    class_name,
                    phase,
                };
                unit.accept(&mut visitor);
                debug!(class = class_name, %phase, logs = self.logs.len(), "scanned");
                true
            }
            Ok(None) => {
                warn!(class = class_name, "class not found; continuing without it");
                self.skip(class_name);
                false
            }
            Err(err) => {
                warn!(class = class_name, error = %err, "unreadable class; continuing without it");
                self.skip(class_name);
                false
            }
        }
    }

    fn skip(&mut self, class_name: &str) {
        self.unreadable.insert(class_name.to_string());
        self.logs.mark_unreadable(class_name);
    }

    /// Deepen up to `depth` classes named by unresolved logs, in insertion order
    ///
    /// Logs whose class was already scanned are settled without using budget.
    /// Returns the number of classes scanned.
    pub fn compass(&mut self, depth: usize) -> usize {
        let mut scanned = 0;
        while scanned < depth {
            let Some(next) = self.logs.next_unresolved() else {
                break;
            };
            let class_name = next.class_name().to_string();
            if self.unreadable.contains(&class_name) || self.exclusions.is_excluded(&class_name) {
                self.logs.mark_unreadable(&class_name);
                continue;
            }
            if self.attempted.contains(&class_name) {
                self.logs.mark_all_resolved(&class_name);
                continue;
            }
            let phase = if self.owned.contains(&class_name) {
                Phase::Load
            } else {
                Phase::None
            };
            self.fingerprint(phase, &class_name);
            scanned += 1;
        }
        debug!(scanned, depth, pending = self.logs.next_unresolved().is_some(), "compass finished");
        scanned
    }

    /// Registry built so far
    #[inline]
    #[must_use]
    pub fn logs(&self) -> &LogSet {
        &self.logs
    }

    /// Take the registry
    #[must_use]
    pub fn into_logs(self) -> LogSet {
        self.logs
    }

    /// Collate the registry at `cutoff`
    ///
    /// # Errors
    /// See [`LogSet::collate`].
    pub fn collate(&self, cutoff: Phase) -> Result<Vec<ClassFingerprint>, ScanError> {
        self.logs.collate(cutoff)
    }
}

struct ScanVisitor<'a> {
    logs: &'a mut LogSet,
    exclusions: &'a Exclusions,
    class_name: &'a str,
    phase: Phase,
}

impl ScanVisitor<'_> {
    /// Phase a reference is recorded at
    fn cap(&self, table_phase: Phase) -> Phase {
        self.phase.weakest(table_phase)
    }

    fn class(&mut self, name: &str, table_phase: Phase) {
        if !self.exclusions.is_excluded(name) {
            let phase = self.cap(table_phase);
            self.logs.add(Log::class(name, phase));
        }
    }
}

impl UnitVisitor for ScanVisitor<'_> {
    fn visit_class(&mut self, header: &ClassHeader) {
        let super_class = header.super_class.clone().filter(|s| s != ROOT_CLASS);
        self.logs.add(Log::declared_class(
            self.class_name,
            super_class,
            header.interfaces.clone(),
            self.phase,
        ));
        if let Some(super_class) = &header.super_class {
            self.class(super_class, Phase::None);
        }
        for interface in &header.interfaces {
            self.class(interface, Phase::None);
        }
    }

    fn visit_field(&mut self, field: &FieldUnit) {
        if field.access.is_private() || field.access.is_synthetic() {
            return;
        }
        self.logs.add(
            Log::field(self.class_name, field.name.as_str(), field.field_type.as_str(), self.phase)
                .resolved(),
        );
    }

    fn visit_method(&mut self, method: &MethodUnit) {
        if method.access.is_private()
            || method.access.is_synthetic()
            || method.is_bridge()
            || method.is_static_initializer()
        {
            return;
        }
        let log = Log::method(
            self.class_name,
            method.name.as_str(),
            method.return_type.clone(),
            method.parameter_types.clone(),
            method.exceptions.clone(),
            self.phase,
        );
        // constructors are swept to resolved when the class is finished
        self.logs.add(if method.is_constructor() { log } else { log.resolved() });
    }

    fn visit_reference(&mut self, reference: &Reference) {
        match reference {
            Reference::Class { name, .. } => self.class(name, Phase::Load),
            Reference::Mention { name, .. } => self.class(name, Phase::None),
            Reference::Field {
                owner,
                name,
                field_type,
                ..
            } => {
                if self.exclusions.is_excluded(owner) {
                    return;
                }
                let phase = self.cap(Phase::Call);
                self.logs.add(Log::class(owner.as_str(), phase));
                self.logs.add(Log::field(owner.as_str(), name.as_str(), field_type.as_str(), phase));
            }
            Reference::Method { owner, .. } if reference.is_constructor_call() => {
                self.class(owner, Phase::Load);
            }
            Reference::Method {
                owner,
                name,
                return_type,
                parameter_types,
                ..
            } => {
                if self.exclusions.is_excluded(owner) {
                    return;
                }
                let phase = self.cap(Phase::Call);
                self.logs.add(Log::class(owner.as_str(), phase));
                self.logs.add(
                    Log::method(
                        owner.as_str(),
                        name.as_str(),
                        return_type.clone(),
                        parameter_types.clone(),
                        Vec::new(),
                        phase,
                    )
                    .resolved(),
                );
            }
        }
    }

    fn visit_end(&mut self) {
        self.logs.mark_all_resolved(self.class_name);
    }
}
