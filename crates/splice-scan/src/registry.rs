//! Log registry
//!
//! [`LogSet`] is an insertion-ordered arena of logs indexed by structural key.
//! Entries are mutated only through the registry, so a phase or resolution
//! change never disturbs the key index. It is both the work queue of the
//! scanner and the input of collation.
//!
//! Not thread-safe; each fingerprint build owns one registry.

use crate::error::ScanError;
use crate::log::{Log, LogKey, LogKind};
use crate::phase::Phase;
use indexmap::IndexMap;
use splice_fingerprint::{ClassFingerprint, ConstructorFingerprint, FieldFingerprint, MethodFingerprint};
use std::collections::BTreeMap;
use tracing::trace;

/// Deduplicated, insertion-ordered log registry
#[derive(Debug, Default, Clone)]
pub struct LogSet {
    logs: IndexMap<LogKey, Log>,
    /// Every entry before this index is resolved
    cursor: usize,
}

impl LogSet {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    /// True when empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Logs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Log> {
        self.logs.values()
    }

    /// Look up by key
    #[must_use]
    pub fn get(&self, key: &LogKey) -> Option<&Log> {
        self.logs.get(key)
    }

    /// Insert or merge `log`, returning the stored entry
    ///
    /// An existing entry is kept unless `log` is resolved and it is not. The
    /// stored phase becomes the stronger of the two, and details only a visited
    /// declaration carries (supertypes, exceptions) are filled in.
    pub fn add(&mut self, log: Log) -> &mut Log {
        let key = log.key();
        match self.logs.entry(key) {
            indexmap::map::Entry::Occupied(entry) => {
                let stored = entry.into_mut();
                if log.is_resolved() && !stored.is_resolved() {
                    let phase = stored.phase();
                    let previous = std::mem::replace(stored, log);
                    stored.lower_phase(phase);
                    stored.fill_details(&previous);
                } else {
                    stored.lower_phase(log.phase());
                    stored.fill_details(&log);
                }
                stored
            }
            indexmap::map::Entry::Vacant(entry) => {
                trace!(log = %log, "new log");
                entry.insert(log)
            }
        }
    }

    /// First unresolved log in insertion order
    pub fn next_unresolved(&mut self) -> Option<&Log> {
        while let Some((_, log)) = self.logs.get_index(self.cursor) {
            if !log.is_resolved() {
                return Some(log);
            }
            self.cursor += 1;
        }
        None
    }

    /// Close out a class whose declaration has been visited
    ///
    /// Its class log and constructor logs become resolved. Any other log of the
    /// class still unresolved was not found among its declarations and is
    /// dropped.
    pub fn mark_all_resolved(&mut self, class_name: &str) {
        let before = self.logs.len();
        self.logs.retain(|_, log| {
            if log.class_name() != class_name || log.is_resolved() {
                return true;
            }
            if matches!(log.kind(), LogKind::Class(_)) || log.is_constructor() {
                log.mark_resolved();
                true
            } else {
                trace!(log = %log, "dropping unmatched log");
                false
            }
        });
        // dropped entries were unresolved, so they sat at or after the cursor
        self.cursor = self.cursor.min(self.logs.len());
        trace!(class = class_name, dropped = before - self.logs.len(), "class resolved");
    }

    /// Resolve every log of a class that could not be read, keeping them all
    pub fn mark_unreadable(&mut self, class_name: &str) {
        for log in self.logs.values_mut() {
            if log.class_name() == class_name {
                log.mark_resolved();
            }
        }
    }

    /// Group logs at or above `cutoff` strength into one fingerprint per class
    ///
    /// Classes come out in name order. Within a class the class log must sort
    /// first (class, methods, fields); anything else is a broken invariant.
    ///
    /// # Errors
    /// Returns [`ScanError::Collation`] when a class has member logs but no
    /// class log at the cutoff.
    pub fn collate(&self, cutoff: Phase) -> Result<Vec<ClassFingerprint>, ScanError> {
        let mut groups: BTreeMap<&str, Vec<&Log>> = BTreeMap::new();
        for log in self.logs.values().filter(|log| log.phase().meets(cutoff)) {
            groups.entry(log.class_name()).or_default().push(log);
        }

        let mut classes = Vec::with_capacity(groups.len());
        for (class, mut logs) in groups {
            logs.sort_by_key(|log| log.rank());
            let mut members = logs.into_iter();
            let Some(LogKind::Class(head)) = members.next().map(Log::kind) else {
                return Err(ScanError::Collation {
                    class: class.to_string(),
                });
            };
            let mut fingerprint = ClassFingerprint::builder(class);
            if let Some(super_class) = &head.super_class {
                fingerprint = fingerprint.super_class(super_class.clone());
            }
            for log in members {
                fingerprint = match log.kind() {
                    LogKind::Method(m) if m.is_constructor() => fingerprint.constructor(
                        ConstructorFingerprint::new(m.parameter_types.clone(), m.exception_types.clone()),
                    ),
                    LogKind::Method(m) => fingerprint.method(MethodFingerprint::new(
                        m.name.clone(),
                        m.return_type.clone(),
                        m.parameter_types.clone(),
                        m.exception_types.clone(),
                    )),
                    LogKind::Field(f) => {
                        fingerprint.field(FieldFingerprint::new(f.name.clone(), f.field_type.clone()))
                    }
                    LogKind::Class(_) => fingerprint,
                };
            }
            classes.push(fingerprint.build());
        }
        Ok(classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn method(class: &str, name: &str, phase: Phase) -> Log {
        Log::method(class, name, None, vec![], vec![], phase)
    }

    #[test]
    fn add_keeps_strongest_phase() {
        let mut set = LogSet::new();
        set.add(Log::class("a.A", Phase::None));
        assert_eq!(set.add(Log::class("a.A", Phase::Load)).phase(), Phase::Load);
        assert_eq!(set.add(Log::class("a.A", Phase::Call)).phase(), Phase::Load);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn resolved_entry_wins_and_keeps_phase() {
        let mut set = LogSet::new();
        set.add(Log::field("a.A", "f", "int", Phase::Call));
        let stored = set.add(Log::field("a.A", "f", "int", Phase::None).resolved());
        assert!(stored.is_resolved());
        assert_eq!(stored.phase(), Phase::Call);
    }

    #[test]
    fn unresolved_never_replaces_resolved() {
        let mut set = LogSet::new();
        set.add(Log::method("a.A", "m", None, vec![], vec!["a.E".into()], Phase::None).resolved());
        let stored = set.add(method("a.A", "m", Phase::Call));
        assert!(stored.is_resolved());
        assert_eq!(stored.phase(), Phase::Call);
        let LogKind::Method(m) = stored.kind() else { panic!("method log expected") };
        assert_eq!(m.exception_types, vec!["a.E"]);
    }

    #[test]
    fn returned_entry_is_authoritative() {
        let mut set = LogSet::new();
        set.add(Log::class("a.A", Phase::Call));
        set.add(Log::class("a.A", Phase::None)).mark_resolved();
        assert!(set.get(&LogKey::Class("a.A".into())).unwrap().is_resolved());
    }

    #[test]
    fn next_unresolved_follows_insertion_order() {
        let mut set = LogSet::new();
        set.add(Log::class("a.A", Phase::Load).resolved());
        set.add(Log::class("a.B", Phase::Load));
        set.add(Log::class("a.C", Phase::Load));
        assert_eq!(set.next_unresolved().unwrap().class_name(), "a.B");
        set.mark_all_resolved("a.B");
        assert_eq!(set.next_unresolved().unwrap().class_name(), "a.C");
        set.mark_all_resolved("a.C");
        assert!(set.next_unresolved().is_none());
    }

    #[test]
    fn mark_all_resolved_drops_unmatched_members() {
        let mut set = LogSet::new();
        set.add(Log::class("a.A", Phase::Call));
        set.add(Log::field("a.A", "inherited", "int", Phase::Call));
        set.add(method("a.A", "<init>", Phase::Load));
        set.add(Log::field("a.A", "declared", "int", Phase::None).resolved());
        set.add(Log::field("a.B", "other", "int", Phase::Call));

        set.mark_all_resolved("a.A");

        let names: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "class a.A [call, resolved]",
                "method a.A.<init>() [load, resolved]",
                "field a.A.declared: int [none, resolved]",
                "field a.B.other: int [call]",
            ]
        );
        assert_eq!(set.next_unresolved().unwrap().class_name(), "a.B");
    }

    #[test]
    fn unreadable_class_keeps_its_logs() {
        let mut set = LogSet::new();
        set.add(Log::class("a.Gone", Phase::Load));
        set.add(Log::field("a.Gone", "f", "int", Phase::Call));
        set.mark_unreadable("a.Gone");
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(Log::is_resolved));
    }

    #[test]
    fn collate_groups_and_filters() {
        let mut set = LogSet::new();
        set.add(Log::declared_class("a.B", Some("a.Base".into()), vec![], Phase::Call));
        set.add(Log::field("a.B", "f", "int", Phase::Call));
        set.add(Log::class("a.A", Phase::Load));
        set.add(method("a.A", "<init>", Phase::Load));
        set.add(method("a.A", "run", Phase::Call));
        set.add(method("a.A", "hidden", Phase::None));
        set.add(Log::class("a.Only", Phase::None));

        let classes = set.collate(Phase::Call).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].name(), "a.A");
        assert_eq!(classes[0].constructors().len(), 1);
        assert_eq!(classes[0].methods().len(), 1);
        assert_eq!(classes[1].name(), "a.B");
        assert_eq!(classes[1].super_class(), Some("a.Base"));
        assert_eq!(classes[1].fields().len(), 1);

        assert_eq!(set.collate(Phase::None).unwrap().len(), 3);
        assert_eq!(set.collate(Phase::Load).unwrap().len(), 1);
    }

    #[test]
    fn collate_rejects_member_without_class() {
        let mut set = LogSet::new();
        set.add(Log::class("a.A", Phase::None));
        set.add(method("a.A", "run", Phase::Call));
        let err = set.collate(Phase::Call).unwrap_err();
        assert!(matches!(err, ScanError::Collation { class } if class == "a.A"));
    }

    #[test]
    fn collate_is_idempotent() {
        let mut set = LogSet::new();
        set.add(Log::class("a.A", Phase::Load));
        set.add(method("a.A", "run", Phase::Call));
        set.add(Log::field("a.A", "f", "long", Phase::Call));
        assert_eq!(set.collate(Phase::Call).unwrap(), set.collate(Phase::Call).unwrap());
    }
}
