//! MARC bibliographic record structures and operations.
//!
//! This module provides the core record types the merge engine works on:
//! - [`Record`] — Leader plus an ordered sequence of fields
//! - [`Field`] — Control field (001-009) or data field (010+)
//! - [`Subfield`] — Coded data element within a data field
//! - [`FieldId`] — Stable identity of a field within one record
//!
//! Fields keep their position in the record, and every field added to a record
//! receives a [`FieldId`] that stays valid while other fields are inserted or
//! removed. Merge bookkeeping (flags, worklists) is keyed on these ids rather
//! than on positions.
//!
//! # Examples
//!
//! ```
//! use mrrc_merge::{Field, Leader, Record};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field("001", "12345")
//!     .field(
//!         Field::builder("245", '1', '0')
//!             .subfield('a', "Title")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.get_control_field("001"), Some("12345"));
//! assert_eq!(record.get_field("245").and_then(|f| f.get_subfield('a')), Some("Title"));
//! ```

use crate::leader::Leader;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;

/// Stable identity of a field inside one [`Record`].
///
/// Ids are allocated by the record when a field is added and are never reused
/// by that record. They carry no meaning across records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A MARC bibliographic record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 characters)
    pub leader: Leader,
    slots: Vec<Slot>,
    next_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    id: FieldId,
    field: Field,
}

/// A field in a MARC record.
///
/// Control fields (001-009) carry their data in `value` and have no subfields;
/// data fields carry indicators and subfields and leave `value` as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 digits, or a short alphabetic code for local fields)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
    /// Control field data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Subfield {
    /// Create a new subfield
    #[must_use]
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }

    /// Whether the code is a control subfield code (`0`-`9`).
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.code.is_ascii_digit()
    }
}

/// Sort key placing numeric tags before alphabetic local tags.
fn tag_order(a: &str, b: &str) -> Ordering {
    let numeric = |t: &str| t.chars().all(|c| c.is_ascii_digit());
    match (numeric(a), numeric(b)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

impl PartialEq for Record {
    /// Records are equal when leaders and field sequences are equal; field ids are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.leader == other.leader
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.field == b.field)
    }
}

impl Eq for Record {}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Create a builder for fluently constructing MARC records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    fn allocate_id(&mut self) -> FieldId {
        let id = FieldId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a field at the end of the record
    pub fn add_field(&mut self, field: Field) -> FieldId {
        let id = self.allocate_id();
        self.slots.push(Slot { id, field });
        id
    }

    /// Append a control field at the end of the record
    pub fn add_control_field(&mut self, tag: impl Into<String>, value: impl Into<String>) -> FieldId {
        self.add_field(Field::control(tag, value))
    }

    /// Insert a field after the last field whose tag sorts at or before its tag.
    ///
    /// Numeric tags sort before alphabetic local tags.
    pub fn insert_in_tag_order(&mut self, field: Field) -> FieldId {
        let position = self
            .slots
            .iter()
            .rposition(|slot| tag_order(&slot.field.tag, &field.tag) != Ordering::Greater)
            .map_or(0, |p| p + 1);
        let id = self.allocate_id();
        self.slots.insert(position, Slot { id, field });
        id
    }

    /// Position of a field in the record
    #[must_use]
    pub fn position(&self, id: FieldId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    /// Id of the field directly after `id`
    #[must_use]
    pub fn following(&self, id: FieldId) -> Option<FieldId> {
        let position = self.position(id)?;
        self.slots.get(position + 1).map(|slot| slot.id)
    }

    /// Get a field by id
    #[must_use]
    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.slots.iter().find(|s| s.id == id).map(|s| &s.field)
    }

    /// Get a mutable field by id
    pub fn get_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.slots
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| &mut s.field)
    }

    /// Remove a field by id, returning it
    pub fn remove(&mut self, id: FieldId) -> Option<Field> {
        let position = self.position(id)?;
        Some(self.slots.remove(position).field)
    }

    /// Remove fields matching a predicate
    ///
    /// Returns the removed fields.
    pub fn remove_fields_where<F>(&mut self, predicate: F) -> Vec<Field>
    where
        F: Fn(&Field) -> bool,
    {
        let mut removed = Vec::new();
        self.slots.retain(|slot| {
            if predicate(&slot.field) {
                removed.push(slot.field.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the record has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over all fields in record order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.slots.iter().map(|s| &s.field)
    }

    /// Iterate over all fields with their ids
    pub fn entries(&self) -> impl Iterator<Item = (FieldId, &Field)> {
        self.slots.iter().map(|s| (s.id, &s.field))
    }

    /// Iterate mutably over all fields
    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.slots.iter_mut().map(|s| &mut s.field)
    }

    /// Snapshot of all field ids in record order
    #[must_use]
    pub fn ids(&self) -> Vec<FieldId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    /// Snapshot of the ids of fields with the given tag
    #[must_use]
    pub fn ids_by_tag(&self, tag: &str) -> Vec<FieldId> {
        self.slots
            .iter()
            .filter(|s| s.field.tag == tag)
            .map(|s| s.id)
            .collect()
    }

    /// Iterate over fields matching a specific tag
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields().filter(move |f| f.tag == tag)
    }

    /// Get first field with a given tag
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields().find(|f| f.tag == tag)
    }

    /// Get the value of the first control field with a given tag
    #[must_use]
    pub fn get_control_field<'a>(&'a self, tag: &str) -> Option<&'a str> {
        self.fields()
            .filter(|f| f.tag == tag)
            .find_map(Field::control_value)
    }

    /// Whether any field carries the given tag
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.fields().any(|f| f.tag == tag)
    }
}

/// Builder for fluently constructing MARC records
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field to the record being built
    #[must_use]
    pub fn control_field(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.add_control_field(tag, value);
        self
    }

    /// Add a field to the record being built
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: impl Into<String>, indicator1: char, indicator2: char) -> Self {
        Field {
            tag: tag.into(),
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
            value: None,
        }
    }

    /// Create a new control field
    #[must_use]
    pub fn control(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            indicator1: ' ',
            indicator2: ' ',
            subfields: SmallVec::new(),
            value: Some(value.into()),
        }
    }

    /// Create a builder for constructing data fields fluently
    ///
    /// # Examples
    ///
    /// ```
    /// use mrrc_merge::Field;
    ///
    /// let field = Field::builder("245", '1', '0')
    ///     .subfield('a', "The Great Gatsby /")
    ///     .subfield('c', "F. Scott Fitzgerald.")
    ///     .build();
    /// assert_eq!(field.subfields.len(), 2);
    /// ```
    #[must_use]
    pub fn builder(tag: impl Into<String>, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Whether this is a control field
    #[must_use]
    pub fn is_control_field(&self) -> bool {
        self.value.is_some()
    }

    /// Control field data, if this is a control field
    #[must_use]
    pub fn control_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether this is a data field with no subfields
    #[must_use]
    pub fn is_empty_data_field(&self) -> bool {
        self.value.is_none() && self.subfields.is_empty()
    }

    /// Indicator by position (1 or 2)
    #[must_use]
    pub fn indicator(&self, position: u8) -> char {
        if position == 1 {
            self.indicator1
        } else {
            self.indicator2
        }
    }

    /// Set indicator by position (1 or 2)
    pub fn set_indicator(&mut self, position: u8, value: char) {
        if position == 1 {
            self.indicator1 = value;
        } else {
            self.indicator2 = value;
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        self.subfields.push(Subfield::new(code, value));
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Get all values for a subfield code
    #[must_use]
    pub fn get_subfield_values(&self, code: char) -> Vec<&str> {
        self.subfields_by_code(code).collect()
    }

    /// Iterate over subfields with a specific code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Whether the field has a subfield with the given code
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.subfields.iter().any(|sf| sf.code == code)
    }

    /// Remove subfields matching a predicate
    ///
    /// Returns the removed subfields.
    pub fn remove_subfields_where<F>(&mut self, predicate: F) -> Vec<Subfield>
    where
        F: Fn(&Subfield) -> bool,
    {
        let mut removed = Vec::new();
        self.subfields.retain(|sf| {
            if predicate(sf) {
                removed.push(sf.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}

impl fmt::Display for Field {
    /// Line format: `245 10 $a Title $c Author` or `001 12345`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = &self.value {
            return write!(f, "{} {value}", self.tag);
        }
        write!(f, "{} {}{}", self.tag, self.indicator1, self.indicator2)?;
        for sf in &self.subfields {
            write!(f, " ${} {}", sf.code, sf.value)?;
        }
        Ok(())
    }
}

/// Builder for fluently constructing MARC fields
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield to the field being built
    #[must_use]
    pub fn subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}
