#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # MRRC Merge: MARC record reconciliation
//!
//! Merges a *source* bibliographic record into a *base* record following
//! cataloging conventions: equivalent fields are found and merged subfield by
//! subfield, new fields are added in tag order, and alternate-script (`$6`)
//! and field-link (`$8`) linkage stays consistent throughout.
//!
//! ## Quick Start
//!
//! ```
//! use mrrc_merge::{merge_records, Field, Leader, MergeConfig, Record};
//!
//! # fn main() -> Result<(), mrrc_merge::MergeError> {
//! let base = Record::builder(Leader::default())
//!     .field(Field::builder("020", ' ', ' ').subfield('a', "951-9123-45-6").build())
//!     .field(Field::builder("041", '0', ' ').subfield('a', "und").build())
//!     .build();
//! let source = Record::builder(Leader::default())
//!     .control_field("008", "200101s2020    fi ||||| |||| 00| 0 fin d")
//!     .field(Field::builder("020", ' ', ' ').subfield('a', "9519123456").build())
//!     .field(Field::builder("041", '0', ' ').subfield('a', "fin").build())
//!     .build();
//!
//! let outcome = merge_records(base, source, &MergeConfig::default())?;
//! let merged = outcome.base;
//! assert_eq!(merged.get_field("020").unwrap().get_subfield_values('a'), vec!["951-9123-45-6"]);
//! assert_eq!(merged.get_field("041").unwrap().get_subfield('a'), Some("fin"));
//! assert!(merged.get_control_field("008").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`] — Record, field and subfield structures with stable field ids
//! - [`leader`] — MARC record leader and the record-type merge gate
//! - [`schema`] — Per-tag MARC 21 tables consulted by the engine
//! - [`normalize`] — Comparison, identifier and fingerprint normalization
//! - [`linkage`] — `$6`/`$8` linkage parsing and repair, continued fields
//! - [`subfield_merge`] — Skip/replace/append decisions for single subfields
//! - [`counterpart`] — Matching a source field to its base counterpart
//! - [`field_merge`] — Indicator and subfield merging for one field pair
//! - [`directive`] — Declarative pre- and post-merge field operations
//! - [`punctuation`] — ISBD punctuation restoration
//! - [`pipeline`] — The reducer pipeline and merge entry points
//! - [`config`] — Merge configuration
//! - [`context`] — Merge state and transient field flags
//! - [`error`] — Error types

pub mod config;
pub mod context;
pub mod counterpart;
pub mod directive;
pub mod error;
pub mod field_merge;
pub mod leader;
pub mod linkage;
pub mod normalize;
pub mod pipeline;
pub mod punctuation;
pub mod record;
pub mod schema;
pub mod subfield_merge;

pub use config::{IndicatorPreference, MergeConfig};
pub use context::{FieldFlags, FlagTable, MergeContext, MergeReport, Side};
pub use counterpart::{find_counterpart, is_mergeable_pair};
pub use directive::{Directive, FieldSpec, Operation, SubfieldFilter, Target};
pub use error::{MergeError, Result};
pub use field_merge::{merge_field, merge_indicators};
pub use leader::Leader;
pub use linkage::{GroupLink, LinkageInfo};
pub use pipeline::{
    merge_batch, merge_in_place, merge_records, MergeOutcome, Pipeline, Reducer,
};
pub use record::{Field, FieldBuilder, FieldId, Record, RecordBuilder, Subfield};
pub use subfield_merge::{merge_or_add_subfield, ReplaceReason, SkipReason, SubfieldDecision};
