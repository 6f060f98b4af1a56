//! The merge pipeline: an ordered fold of reducers over a record pair.
//!
//! [`Pipeline::default`] runs, in order:
//!
//! 1. [`LeaderGate`] rejects records of different types;
//! 2. [`Preprocess`] drops malformed source fields, joins continued fields and
//!    applies pre-merge directives;
//! 3. [`LinkageOffset`] renumbers source linkage above the base numbering;
//! 4. [`ControlFieldReducer`] copies missing control fields;
//! 5. [`DataFieldReducer`] merges or adds every source data field;
//! 6. [`Postprocess`] repairs linkage, restores punctuation, applies
//!    post-merge directives and removes consumed source fields.
//!
//! Each step completes before the next one starts. A merge owns both records
//! exclusively for its duration; [`merge_batch`] runs independent pairs in
//! parallel.
//!
//! # Examples
//!
//! ```
//! use mrrc_merge::{merge_records, Field, Leader, MergeConfig, Record};
//!
//! let base = Record::builder(Leader::default())
//!     .field(Field::builder("100", '1', ' ').subfield('a', "Virtanen, Matti,").subfield('d', "1984-").build())
//!     .build();
//! let source = Record::builder(Leader::default())
//!     .field(Field::builder("100", '1', ' ').subfield('a', "Virtanen, Matti,").subfield('d', "1984-2020").build())
//!     .build();
//!
//! let outcome = merge_records(base, source, &MergeConfig::default())?;
//! assert_eq!(outcome.base.get_field("100").unwrap().get_subfield('d'), Some("1984-2020"));
//! assert!(outcome.source.is_empty());
//! # Ok::<(), mrrc_merge::MergeError>(())
//! ```

use crate::config::MergeConfig;
use crate::context::{MergeContext, MergeReport, Side};
use crate::directive::{apply_directives, builtin_preprocess};
use crate::error::Result;
use crate::field_merge::{find_duplicate, merge_field};
use crate::linkage::{
    collapse_duplicate_groups, effective_tag, join_continuations, offset_source_links,
    remove_pairless_links, retag_field,
};
use crate::punctuation::restore_punctuation;
use crate::record::{FieldId, Record};
use crate::schema::{added_entry_tag, is_at_most_one, is_main_entry, ALTERNATE_SCRIPT_TAG, MAIN_ENTRY_TAGS};
use log::{debug, trace, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One step of the merge pipeline.
pub trait Reducer: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &'static str;

    /// Run the step over the merge context.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the whole merge.
    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()>;
}

/// Result of a successful merge.
#[derive(Debug)]
pub struct MergeOutcome {
    /// The merged record
    pub base: Record,
    /// What is left of the source record after consumed fields were removed
    pub source: Record,
    /// Counts of what the merge did
    pub report: MergeReport,
}

/// An ordered list of reducers.
pub struct Pipeline {
    reducers: Vec<Box<dyn Reducer>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.reducers.iter().map(|r| r.name()))
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new()
            .with(LeaderGate)
            .with(Preprocess)
            .with(LinkageOffset)
            .with(ControlFieldReducer)
            .with(DataFieldReducer)
            .with(Postprocess)
    }
}

impl Pipeline {
    /// Create a pipeline without steps
    #[must_use]
    pub fn new() -> Self {
        Pipeline {
            reducers: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn with(mut self, reducer: impl Reducer + 'static) -> Self {
        self.reducers.push(Box::new(reducer));
        self
    }

    /// Names of the steps, in order
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.reducers.iter().map(|r| r.name()).collect()
    }

    /// Run every step over the pair, mutating both records in place.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a step; later steps do not run.
    pub fn run(&self, base: &mut Record, source: &mut Record, config: &MergeConfig) -> Result<MergeReport> {
        let mut ctx = MergeContext::new(base, source, config);
        for reducer in &self.reducers {
            trace!("Running {}", reducer.name());
            reducer.reduce(&mut ctx)?;
        }
        Ok(ctx.report)
    }
}

/// Merge `source` into `base` in place with the default pipeline.
///
/// # Errors
///
/// Returns [`crate::MergeError::IncompatibleLeader`] before touching either
/// record when their types differ, and [`crate::MergeError::InvalidDirective`]
/// when a configured directive does not compile.
pub fn merge_in_place(base: &mut Record, source: &mut Record, config: &MergeConfig) -> Result<MergeReport> {
    Pipeline::default().run(base, source, config)
}

/// Merge `source` into `base` with the default pipeline.
///
/// # Errors
///
/// See [`merge_in_place`].
pub fn merge_records(mut base: Record, mut source: Record, config: &MergeConfig) -> Result<MergeOutcome> {
    let report = merge_in_place(&mut base, &mut source, config)?;
    Ok(MergeOutcome {
        base,
        source,
        report,
    })
}

/// Merge independent `(base, source)` pairs in parallel.
///
/// Results are returned in input order; a failing pair does not affect the
/// others.
#[must_use]
pub fn merge_batch(pairs: Vec<(Record, Record)>, config: &MergeConfig) -> Vec<Result<MergeOutcome>> {
    pairs
        .into_par_iter()
        .map(|(base, source)| merge_records(base, source, config))
        .collect()
}

/// Rejects pairs whose leaders disagree on type of record or bibliographic level.
#[derive(Debug, Clone, Copy)]
pub struct LeaderGate;

impl Reducer for LeaderGate {
    fn name(&self) -> &'static str {
        "leader gate"
    }

    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()> {
        ctx.base.leader.check_merge_compatible(&ctx.source.leader)
    }
}

/// Input cleanup and pre-merge directives.
#[derive(Debug, Clone, Copy)]
pub struct Preprocess;

impl Reducer for Preprocess {
    fn name(&self) -> &'static str {
        "preprocess"
    }

    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()> {
        for field in ctx.source.remove_fields_where(|f| f.is_empty_data_field()) {
            warn!("Dropping source field {} without subfields", field.tag);
        }

        ctx.report.joined += join_continuations(ctx.base);
        ctx.report.joined += join_continuations(ctx.source);

        ctx.report.directive_changes += apply_directives(&builtin_preprocess(), ctx.base, ctx.source)?;
        ctx.report.directive_changes += apply_directives(&ctx.config.preprocess, ctx.base, ctx.source)?;
        Ok(())
    }
}

/// Moves source linkage numbering above the base numbering.
#[derive(Debug, Clone, Copy)]
pub struct LinkageOffset;

impl Reducer for LinkageOffset {
    fn name(&self) -> &'static str {
        "linkage offset"
    }

    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()> {
        offset_source_links(ctx.base, ctx.source);
        Ok(())
    }
}

/// Copies control fields the base lacks.
#[derive(Debug, Clone, Copy)]
pub struct ControlFieldReducer;

impl Reducer for ControlFieldReducer {
    fn name(&self) -> &'static str {
        "control fields"
    }

    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()> {
        let ids: Vec<FieldId> = ctx
            .source
            .entries()
            .filter(|(_, f)| f.is_control_field())
            .map(|(id, _)| id)
            .collect();

        for id in ids {
            let Some(field) = ctx.source.get(id).cloned() else {
                continue;
            };
            if ctx.config.is_add_skipped(&field.tag) {
                ctx.report.skipped += 1;
                continue;
            }
            if find_duplicate(ctx.base, &field).is_some() {
                ctx.consume(id);
                ctx.report.duplicates += 1;
                continue;
            }
            if is_at_most_one(&field.tag) && ctx.base.has_tag(&field.tag) {
                debug!("Keeping base {}, source value differs", field.tag);
                ctx.report.skipped += 1;
                continue;
            }
            let new_id = ctx.base.insert_in_tag_order(field);
            ctx.flags.mark_added(Side::Base, new_id);
            ctx.consume(id);
            ctx.report.added += 1;
        }
        Ok(())
    }
}

/// Merges or adds every source data field.
#[derive(Debug, Clone, Copy)]
pub struct DataFieldReducer;

impl DataFieldReducer {
    /// Source ids in processing order: regular fields, then 880s.
    fn processing_order(source: &Record) -> Vec<FieldId> {
        let (alternates, regular): (Vec<_>, Vec<_>) = source
            .entries()
            .filter(|(_, f)| !f.is_control_field())
            .partition(|(_, f)| f.tag == ALTERNATE_SCRIPT_TAG);
        regular
            .into_iter()
            .chain(alternates)
            .map(|(id, _)| id)
            .collect()
    }

    /// At-most-one tags the source carries more than once.
    fn ambiguous_tags(source: &Record) -> HashSet<(bool, String)> {
        let mut counts: HashMap<(bool, String), usize> = HashMap::new();
        for field in source.fields().filter(|f| !f.is_control_field()) {
            let tag = effective_tag(field);
            if is_at_most_one(&tag) {
                *counts
                    .entry((field.tag == ALTERNATE_SCRIPT_TAG, tag))
                    .or_default() += 1;
            }
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key)
            .collect()
    }

    fn add_field(ctx: &mut MergeContext<'_>, id: FieldId) {
        let Some(tag) = ctx.source.get(id).map(|f| f.tag.clone()) else {
            return;
        };
        if ctx.config.is_add_skipped(&tag) {
            ctx.report.skipped += 1;
            return;
        }

        if is_main_entry(&tag) && MAIN_ENTRY_TAGS.iter().any(|t| ctx.base.has_tag(t)) {
            if let Some(added) = added_entry_tag(&tag) {
                debug!("Base has a main entry, adding source {tag} as {added}");
                retag_field(ctx.source, id, added);
            }
        }

        let Some(field) = ctx.source.get(id).cloned() else {
            return;
        };
        let alternate = field.tag == ALTERNATE_SCRIPT_TAG;
        let effective = effective_tag(&field);
        let occupied = is_at_most_one(&effective)
            && ctx
                .base
                .fields()
                .any(|f| (f.tag == ALTERNATE_SCRIPT_TAG) == alternate && effective_tag(f) == effective);
        if occupied {
            warn!("Not adding {field}: base already has its only {effective}");
            ctx.report.skipped += 1;
            return;
        }

        let new_id = ctx.base.insert_in_tag_order(field);
        debug!("Added source field as {new_id}");
        ctx.flags.mark_added(Side::Base, new_id);
        ctx.consume(id);
        ctx.report.added += 1;
    }
}

impl Reducer for DataFieldReducer {
    fn name(&self) -> &'static str {
        "data fields"
    }

    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()> {
        let ambiguous = Self::ambiguous_tags(ctx.source);
        for (alternate, tag) in &ambiguous {
            warn!(
                "Source has several {}{tag} fields, leaving base unchanged",
                if *alternate { "880 " } else { "" }
            );
        }

        for id in Self::processing_order(ctx.source) {
            let Some(field) = ctx.source.get(id) else {
                continue;
            };
            let key = (field.tag == ALTERNATE_SCRIPT_TAG, effective_tag(field));
            if ambiguous.contains(&key) {
                ctx.report.skipped += 1;
                continue;
            }

            if ctx.config.is_merge_skipped(&field.tag) {
                if find_duplicate(ctx.base, field).is_some() {
                    ctx.consume(id);
                    ctx.report.duplicates += 1;
                } else {
                    Self::add_field(ctx, id);
                }
                continue;
            }

            if !merge_field(ctx, id) {
                Self::add_field(ctx, id);
            }
        }
        Ok(())
    }
}

/// Linkage repair, punctuation, post-merge directives and flag removal.
#[derive(Debug, Clone, Copy)]
pub struct Postprocess;

impl Reducer for Postprocess {
    fn name(&self) -> &'static str {
        "postprocess"
    }

    fn reduce(&self, ctx: &mut MergeContext<'_>) -> Result<()> {
        ctx.report.collapsed += collapse_duplicate_groups(ctx.base);
        ctx.report.unlinked += remove_pairless_links(ctx.base);

        for id in ctx.flags.ids_where(Side::Base, |f| f.needs_punctuation) {
            if let Some(field) = ctx.base.get_mut(id) {
                restore_punctuation(field);
            }
        }

        ctx.report.directive_changes += apply_directives(&ctx.config.postprocess, ctx.base, ctx.source)?;

        for id in ctx.flags.ids_where(Side::Source, |f| f.deleted) {
            ctx.source.remove(id);
        }
        ctx.flags.clear();
        debug!("Merge finished: {:?}", ctx.report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;
    use crate::leader::Leader;
    use crate::record::Field;

    fn record(fields: Vec<Field>) -> Record {
        let mut record = Record::new(Leader::default());
        for field in fields {
            record.add_field(field);
        }
        record
    }

    #[test]
    fn test_default_pipeline_order() {
        assert_eq!(
            Pipeline::default().step_names(),
            vec![
                "leader gate",
                "preprocess",
                "linkage offset",
                "control fields",
                "data fields",
                "postprocess"
            ]
        );
    }

    #[test]
    fn test_leader_gate_aborts_before_mutation() {
        let mut base = record(vec![Field::builder("041", '0', ' ').subfield('a', "und").build()]);
        let mut source = record(vec![Field::builder("041", '0', ' ').subfield('a', "fin").build()]);
        source.leader.record_type = 'j';
        let before = base.clone();

        let err = merge_in_place(&mut base, &mut source, &MergeConfig::default()).unwrap_err();
        assert!(matches!(err, MergeError::IncompatibleLeader { .. }));
        assert_eq!(base, before);
    }

    #[test]
    fn test_empty_source_fields_dropped() {
        let base = record(vec![]);
        let source = record(vec![
            Field::new("500", ' ', ' '),
            Field::builder("500", ' ', ' ').subfield('a', "Huomautus.").build(),
        ]);
        let outcome = merge_records(base, source, &MergeConfig::default()).unwrap();
        assert_eq!(outcome.base.fields_by_tag("500").count(), 1);
        assert_eq!(outcome.report.added, 1);
    }

    #[test]
    fn test_control_fields() {
        let base = record(vec![
            Field::control("001", "000111"),
            Field::control("007", "ta"),
        ]);
        let source = record(vec![
            Field::control("001", "000222"),
            Field::control("007", "ta"),
            Field::control("007", "cr|||||||||||"),
            Field::control("008", "200101s2020    fi ||||| |||| 00| 0 fin d"),
        ]);
        let outcome = merge_records(base, source, &MergeConfig::default()).unwrap();
        let base = outcome.base;

        assert_eq!(base.get_control_field("001"), Some("000111"));
        assert_eq!(base.fields_by_tag("007").count(), 2);
        assert_eq!(
            base.get_control_field("008"),
            Some("200101s2020    fi ||||| |||| 00| 0 fin d")
        );
        let tags: Vec<&str> = base.fields().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["001", "007", "007", "008"]);
        assert_eq!(outcome.source.get_control_field("001"), Some("000222"));
    }

    #[test]
    fn test_main_entry_added_as_added_entry() {
        let base = record(vec![
            Field::builder("100", '1', ' ').subfield('a', "Virtanen, Matti.").build(),
            Field::builder("245", '1', '0').subfield('a', "Kissat.").build(),
        ]);
        let source = record(vec![
            Field::builder("100", '1', ' ').subfield('a', "Korhonen, Liisa.").build(),
            Field::builder("245", '1', '0').subfield('a', "Kissat.").build(),
        ]);
        let outcome = merge_records(base, source, &MergeConfig::default()).unwrap();
        let base = outcome.base;
        assert_eq!(base.fields_by_tag("100").count(), 1);
        assert_eq!(
            base.get_field("700").unwrap().get_subfield('a'),
            Some("Korhonen, Liisa.")
        );
        assert!(outcome.source.is_empty());
    }

    #[test]
    fn test_second_title_refused() {
        let base = record(vec![Field::builder("245", '1', '0').subfield('a', "Kissat.").build()]);
        let source = record(vec![Field::builder("245", '1', '0').subfield('a', "Koirat.").build()]);
        let outcome = merge_records(base, source, &MergeConfig::default()).unwrap();
        assert_eq!(outcome.base.fields_by_tag("245").count(), 1);
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.source.len(), 1);
    }

    #[test]
    fn test_ambiguous_source_tag_skipped() {
        let base = record(vec![Field::builder("245", '1', '0').subfield('a', "Kissat").build()]);
        let source = record(vec![
            Field::builder("245", '1', '0')
                .subfield('a', "Kissat")
                .subfield('b', "romaani")
                .build(),
            Field::builder("245", '1', '0').subfield('a', "Kissat").build(),
        ]);
        let before = base.clone();
        let outcome = merge_records(base, source, &MergeConfig::default()).unwrap();
        assert_eq!(outcome.base, before);
        assert_eq!(outcome.report.skipped, 2);
    }

    #[test]
    fn test_add_skip_tags_stay_in_source() {
        let base = record(vec![]);
        let source = record(vec![
            Field::builder("040", ' ', ' ').subfield('a', "FI-NL").build(),
            Field::builder("CAT", ' ', ' ').subfield('a', "LOAD").build(),
        ]);
        let outcome = merge_records(base, source, &MergeConfig::default()).unwrap();
        assert!(outcome.base.is_empty());
        assert_eq!(outcome.source.len(), 2);
    }

    #[test]
    fn test_postprocess_directives() {
        let config = MergeConfig::from_json(
            r#"{"postprocess": [{"operation": "removeSubfield", "codes": ["9"], "target": "base",
                "field": {"tag": "650"}}]}"#,
        )
        .unwrap();
        let base = record(vec![Field::builder("650", ' ', '7')
            .subfield('a', "kissat")
            .subfield('9', "FENNI<KEEP>")
            .build()]);
        let source = record(vec![]);
        let outcome = merge_records(base, source, &config).unwrap();
        assert!(!outcome.base.get_field("650").unwrap().has_subfield('9'));
        assert_eq!(outcome.report.directive_changes, 1);
    }

    #[test]
    fn test_merge_batch_keeps_order() {
        let mut incompatible = record(vec![]);
        incompatible.leader.bibliographic_level = 's';
        let pairs = vec![
            (
                record(vec![Field::builder("500", ' ', ' ').subfield('a', "A").build()]),
                record(vec![Field::builder("500", ' ', ' ').subfield('a', "B").build()]),
            ),
            (record(vec![]), incompatible),
        ];
        let results = merge_batch(pairs, &MergeConfig::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().base.len(), 2);
        assert!(results[1].is_err());
    }
}
