//! Declarative field and subfield operations applied before and after a merge.
//!
//! A [`Directive`] pairs an [`Operation`] with a [`FieldSpec`] selecting the
//! fields it touches, the record(s) it applies to and an optional
//! precondition that the *other* record must satisfy. Directives are plain
//! data and deserialize from JSON:
//!
//! ```
//! use mrrc_merge::directive::{Directive, Operation, Target};
//!
//! let directive: Directive = serde_json::from_str(
//!     r#"{"operation": "removeSubfield", "codes": ["9"], "target": "source",
//!         "field": {"tag": "650|651", "subfields": [{"code": "2", "value": "ysa"}]}}"#,
//! )
//! .unwrap();
//! assert_eq!(directive.target, Target::Source);
//! assert!(matches!(directive.operation, Operation::RemoveSubfield { .. }));
//! ```

use crate::error::{MergeError, Result};
use crate::linkage::retag_field;
use crate::record::{Field, FieldId, Record};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which record(s) a directive applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// The record being retained
    Base,
    /// The record being absorbed
    Source,
    /// Both records, each checked against the other for preconditions
    #[default]
    Both,
}

/// Subfield filter of a [`FieldSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubfieldFilter {
    /// Subfield code that must be present
    pub code: char,
    /// Exact value the subfield must have
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Regular expression the subfield value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Selects fields by tag, indicators and subfield content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Tag regular expression, matched against the whole tag
    pub tag: String,
    /// Required first indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator1: Option<char>,
    /// Required second indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator2: Option<char>,
    /// Every filter must be satisfied by some subfield
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subfields: Vec<SubfieldFilter>,
    /// Codes that must not occur in the field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<char>,
}

impl FieldSpec {
    /// Spec matching every field with the given tag pattern
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        FieldSpec {
            tag: tag.into(),
            indicator1: None,
            indicator2: None,
            subfields: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Require a subfield with the exact value
    #[must_use]
    pub fn with_subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.subfields.push(SubfieldFilter {
            code,
            value: Some(value.into()),
            pattern: None,
        });
        self
    }

    /// Require the absence of a subfield code
    #[must_use]
    pub fn without(mut self, code: char) -> Self {
        self.missing.push(code);
        self
    }

    fn compile(&self) -> Result<FieldMatcher<'_>> {
        let tag = compile_pattern(&format!("^(?:{})$", self.tag))?;
        let patterns = self
            .subfields
            .iter()
            .map(|filter| filter.pattern.as_deref().map(compile_pattern).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(FieldMatcher {
            spec: self,
            tag,
            patterns,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MergeError::InvalidDirective(format!("{pattern}: {e}")))
}

/// A [`FieldSpec`] with its regular expressions compiled.
struct FieldMatcher<'a> {
    spec: &'a FieldSpec,
    tag: Regex,
    patterns: Vec<Option<Regex>>,
}

impl FieldMatcher<'_> {
    fn matches(&self, field: &Field) -> bool {
        if !self.tag.is_match(&field.tag) {
            return false;
        }
        if field.is_control_field() {
            return self.spec.subfields.is_empty();
        }
        if self.spec.indicator1.is_some_and(|c| c != field.indicator1)
            || self.spec.indicator2.is_some_and(|c| c != field.indicator2)
        {
            return false;
        }
        if self.spec.missing.iter().any(|code| field.has_subfield(*code)) {
            return false;
        }
        self.spec
            .subfields
            .iter()
            .zip(&self.patterns)
            .all(|(filter, pattern)| {
                field.subfields.iter().any(|sf| {
                    sf.code == filter.code
                        && filter.value.as_ref().map_or(true, |v| *v == sf.value)
                        && pattern.as_ref().map_or(true, |re| re.is_match(&sf.value))
                })
            })
    }

    fn matching_ids(&self, record: &Record) -> Vec<FieldId> {
        record
            .entries()
            .filter(|(_, field)| self.matches(field))
            .map(|(id, _)| id)
            .collect()
    }

    fn any_match(&self, record: &Record) -> bool {
        record.fields().any(|field| self.matches(field))
    }
}

/// The change a directive makes to each selected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Operation {
    /// Remove the selected fields
    RemoveField,
    /// Remove subfields with the given codes, optionally only those whose
    /// value matches `pattern`; fields left empty are removed
    RemoveSubfield {
        /// Codes to remove
        codes: Vec<char>,
        /// Value pattern a removed subfield must match
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    /// Change subfield code `from` to `to`
    RenameSubfield {
        /// Current code
        from: char,
        /// New code
        to: char,
    },
    /// Change the tag, keeping alternate-script links consistent
    Retag {
        /// New tag
        to: String,
    },
    /// Exchange the selected fields between base and source
    SwapFields,
}

/// A declarative record operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// What to do with each selected field
    #[serde(flatten)]
    pub operation: Operation,
    /// Record(s) the operation applies to
    #[serde(default)]
    pub target: Target,
    /// Fields the operation applies to
    pub field: FieldSpec,
    /// A field the other record must contain for the directive to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<FieldSpec>,
}

impl Directive {
    /// Create a directive without a precondition
    #[must_use]
    pub fn new(operation: Operation, target: Target, field: FieldSpec) -> Self {
        Directive {
            operation,
            target,
            field,
            precondition: None,
        }
    }

    /// Require the other record to contain a field matching `spec`
    #[must_use]
    pub fn when_other_has(mut self, spec: FieldSpec) -> Self {
        self.precondition = Some(spec);
        self
    }

    /// Check that every pattern in the directive compiles.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidDirective`] for the first invalid pattern.
    pub fn validate(&self) -> Result<()> {
        self.field.compile()?;
        if let Some(precondition) = &self.precondition {
            precondition.compile()?;
        }
        if let Operation::RemoveSubfield {
            pattern: Some(pattern),
            ..
        } = &self.operation
        {
            compile_pattern(pattern)?;
        }
        Ok(())
    }

    /// Apply the directive, returning the number of fields it changed.
    ///
    /// For [`Operation::SwapFields`] the target is ignored and the
    /// precondition is checked against the source record.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidDirective`] if a pattern does not compile.
    pub fn apply(&self, base: &mut Record, source: &mut Record) -> Result<usize> {
        let matcher = self.field.compile()?;
        let precondition = self.precondition.as_ref().map(FieldSpec::compile).transpose()?;
        let subfield_pattern = match &self.operation {
            Operation::RemoveSubfield {
                pattern: Some(pattern),
                ..
            } => Some(compile_pattern(pattern)?),
            _ => None,
        };
        let allowed = |other: &Record| precondition.as_ref().map_or(true, |p| p.any_match(other));

        if self.operation == Operation::SwapFields {
            if !allowed(source) {
                return Ok(0);
            }
            return Ok(swap_fields(&matcher, base, source));
        }

        let mut changed = 0;
        if matches!(self.target, Target::Base | Target::Both) && allowed(source) {
            changed += self.apply_to(&matcher, subfield_pattern.as_ref(), base);
        }
        if matches!(self.target, Target::Source | Target::Both) && allowed(base) {
            changed += self.apply_to(&matcher, subfield_pattern.as_ref(), source);
        }
        Ok(changed)
    }

    fn apply_to(&self, matcher: &FieldMatcher<'_>, pattern: Option<&Regex>, record: &mut Record) -> usize {
        let ids = matcher.matching_ids(record);
        let mut changed = 0;

        for id in ids {
            match &self.operation {
                Operation::RemoveField => {
                    if record.remove(id).is_some() {
                        changed += 1;
                    }
                },
                Operation::RemoveSubfield { codes, .. } => {
                    let Some(field) = record.get_mut(id) else {
                        continue;
                    };
                    let removed = field.remove_subfields_where(|sf| {
                        codes.contains(&sf.code) && pattern.map_or(true, |re| re.is_match(&sf.value))
                    });
                    if removed.is_empty() {
                        continue;
                    }
                    changed += 1;
                    if field.is_empty_data_field() {
                        record.remove(id);
                    }
                },
                Operation::RenameSubfield { from, to } => {
                    let Some(field) = record.get_mut(id) else {
                        continue;
                    };
                    let mut renamed = false;
                    for sf in field.subfields.iter_mut().filter(|sf| sf.code == *from) {
                        sf.code = *to;
                        renamed = true;
                    }
                    if renamed {
                        changed += 1;
                    }
                },
                Operation::Retag { to } => {
                    if retag_field(record, id, to) {
                        changed += 1;
                    }
                },
                Operation::SwapFields => {},
            }
        }

        if changed > 0 {
            debug!("Directive {:?} on '{}' changed {changed} field(s)", self.operation, self.field.tag);
        }
        changed
    }
}

fn swap_fields(matcher: &FieldMatcher<'_>, base: &mut Record, source: &mut Record) -> usize {
    let from_base: Vec<Field> = matcher
        .matching_ids(base)
        .into_iter()
        .filter_map(|id| base.remove(id))
        .collect();
    let from_source: Vec<Field> = matcher
        .matching_ids(source)
        .into_iter()
        .filter_map(|id| source.remove(id))
        .collect();
    let swapped = from_base.len() + from_source.len();

    for field in from_source {
        base.insert_in_tag_order(field);
    }
    for field in from_base {
        source.insert_in_tag_order(field);
    }
    swapped
}

/// Apply directives in order, returning the total number of changed fields.
///
/// # Errors
///
/// Returns the first [`MergeError::InvalidDirective`] encountered.
pub fn apply_directives(directives: &[Directive], base: &mut Record, source: &mut Record) -> Result<usize> {
    directives
        .iter()
        .try_fold(0, |total, directive| Ok(total + directive.apply(base, source)?))
}

/// Directives always run before merging.
///
/// An undetermined language code (`041 $a und`) is dropped from the base when
/// the source carries a language field of its own.
#[must_use]
pub fn builtin_preprocess() -> Vec<Directive> {
    vec![Directive::new(
        Operation::RemoveSubfield {
            codes: vec!['a'],
            pattern: Some("^und$".to_string()),
        },
        Target::Base,
        FieldSpec::tag("041").with_subfield('a', "und"),
    )
    .when_other_has(FieldSpec::tag("041"))]
}
