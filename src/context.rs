//! Mutable merge state shared by pipeline steps.
//!
//! Transient per-field flags are kept in a [`FlagTable`] keyed by record side
//! and [`FieldId`], so records themselves never carry merge bookkeeping.

use crate::config::MergeConfig;
use crate::record::{FieldId, Record};
use serde::Serialize;
use std::collections::HashMap;

/// Which record of the pair a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The record being retained
    Base,
    /// The record being absorbed
    Source,
}

/// Transient flags attached to a field during one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    /// Content was merged into this field
    pub merged: bool,
    /// The field was copied from the source
    pub added: bool,
    /// The field was consumed and is removed at postprocessing
    pub deleted: bool,
    /// ISBD punctuation must be restored at postprocessing
    pub needs_punctuation: bool,
}

/// Side table of [`FieldFlags`].
#[derive(Debug, Default)]
pub struct FlagTable {
    flags: HashMap<(Side, FieldId), FieldFlags>,
}

impl FlagTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags of a field; all clear when never set
    #[must_use]
    pub fn get(&self, side: Side, id: FieldId) -> FieldFlags {
        self.flags.get(&(side, id)).copied().unwrap_or_default()
    }

    /// Update the flags of a field in place
    pub fn update(&mut self, side: Side, id: FieldId, f: impl FnOnce(&mut FieldFlags)) {
        f(self.flags.entry((side, id)).or_default());
    }

    /// Record that content was merged into a field
    pub fn mark_merged(&mut self, side: Side, id: FieldId) {
        self.update(side, id, |flags| flags.merged = true);
    }

    /// Record that a field was copied from the source
    pub fn mark_added(&mut self, side: Side, id: FieldId) {
        self.update(side, id, |flags| flags.added = true);
    }

    /// Record that a field is removed at postprocessing
    pub fn mark_deleted(&mut self, side: Side, id: FieldId) {
        self.update(side, id, |flags| flags.deleted = true);
    }

    /// Record that a field needs its punctuation restored
    pub fn mark_needs_punctuation(&mut self, side: Side, id: FieldId) {
        self.update(side, id, |flags| flags.needs_punctuation = true);
    }

    /// Whether a field is marked for removal
    #[must_use]
    pub fn is_deleted(&self, side: Side, id: FieldId) -> bool {
        self.get(side, id).deleted
    }

    /// Ids on one side whose flags satisfy `predicate`, in no particular order
    pub fn ids_where(&self, side: Side, predicate: impl Fn(&FieldFlags) -> bool) -> Vec<FieldId> {
        self.flags
            .iter()
            .filter(|((s, _), flags)| *s == side && predicate(flags))
            .map(|((_, id), _)| *id)
            .collect()
    }

    /// Number of fields with any flag recorded
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether no flag was ever set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Forget every flag
    pub fn clear(&mut self) {
        self.flags.clear();
    }
}

/// Counts of what a merge did, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Source fields merged into an existing base field
    pub merged: usize,
    /// Source fields copied into the base
    pub added: usize,
    /// Source fields dropped as verbatim duplicates of base fields
    pub duplicates: usize,
    /// Source fields neither merged nor added
    pub skipped: usize,
    /// Fields changed by pre- and postprocessing directives
    pub directive_changes: usize,
    /// Linked groups removed by duplicate collapse
    pub collapsed: usize,
    /// Linkage subfields removed for lack of a partner
    pub unlinked: usize,
    /// Fields joined into a preceding continued field
    pub joined: usize,
}

/// Everything a pipeline step may read or change.
#[derive(Debug)]
pub struct MergeContext<'a> {
    /// The record being retained
    pub base: &'a mut Record,
    /// The record being absorbed
    pub source: &'a mut Record,
    /// Tunable behavior
    pub config: &'a MergeConfig,
    /// Transient field flags
    pub flags: FlagTable,
    /// Running counts
    pub report: MergeReport,
}

impl<'a> MergeContext<'a> {
    /// Create a context borrowing both records exclusively
    #[must_use]
    pub fn new(base: &'a mut Record, source: &'a mut Record, config: &'a MergeConfig) -> Self {
        MergeContext {
            base,
            source,
            config,
            flags: FlagTable::new(),
            report: MergeReport::default(),
        }
    }

    /// Mark a source field consumed
    pub fn consume(&mut self, id: FieldId) {
        self.flags.mark_deleted(Side::Source, id);
    }
}
