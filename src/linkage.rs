//! Field linkage bookkeeping for merged records.
//!
//! Two independent linkage schemes tie fields of a MARC record together, and
//! both must stay consistent while fields are merged, added, retagged or
//! dropped:
//!
//! - **Alternate graphic representation** (subfield 6): a field and its 880
//!   counterpart carry mirror values such as `880-01` and `100-01`. The numeric
//!   part is the occurrence number; `00` is reserved for 880 fields without a
//!   linked field.
//! - **Field link and sequence** (subfield 8): `1.2\c` style values whose first
//!   number groups the parts of a split or concatenated field.
//!
//! # Examples
//!
//! Subfield 6 format: `NNN-XX` or `NNN-XX/script/r`
//! - `100: $6 880-01$a Smith, John` (original field with linkage)
//! - `880: $6 100-01/(3/r$a سميث، جون` (880 field with reverse linkage)
//!
//! A third, scheme-independent linkage joins adjacent fields whose last value
//! ends in a continuation marker; see [`join_continuations`].

use crate::normalize::field_fingerprint;
use crate::record::{Field, FieldId, Record, Subfield};
use crate::schema::ALTERNATE_SCRIPT_TAG;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Occurrence number reserved for 880 fields without a linked field.
pub const SENTINEL_OCCURRENCE: u32 = 0;

/// Largest occurrence number a subfield 6 value can carry.
pub const MAX_OCCURRENCE: u32 = 999;

/// Tags whose values may continue in the next field, with their marker.
const CONTINUATION_MARKERS: &[(&str, &str)] = &[("505", "--"), ("520", "...")];

lazy_static! {
    // TAG-OCC[/SCRIPT][/r]
    // SCRIPT = (2 (Hebrew), (3 (Arabic), (B (Latin), (N (Cyrillic), (S (Greek), $1 (CJK)
    static ref LINKAGE: Regex =
        Regex::new(r"^(\d{3})-(\d{2,3})(?:/([\(\$][A-Za-z0-9]))?(/r)?$").unwrap();
    // LINK[.SEQUENCE...]\TYPE
    static ref GROUP_LINK: Regex = Regex::new(r"^(\d+)((?:\.\d+)*)\\([a-z])$").unwrap();
}

/// Information extracted from MARC subfield 6 (Linkage).
///
/// # Examples
///
/// ```
/// use mrrc_merge::LinkageInfo;
///
/// let info = LinkageInfo::parse("100-01").unwrap();
/// assert_eq!(info.tag, "100");
/// assert_eq!(info.occurrence_number(), 1);
/// assert_eq!(info.with_occurrence(12).to_string(), "100-12");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageInfo {
    /// The 3-digit field tag from the linkage (e.g., "880", "245")
    pub tag: String,

    /// Occurrence number (00-999) linking fields together
    pub occurrence: String,

    /// Script identification code (e.g., "(2" for Hebrew, "(3" for Arabic,
    /// "$1" for CJK, "(N" for Cyrillic, "(S" for Greek)
    pub script_id: String,

    /// Whether reverse script is flagged (after `/r`)
    pub is_reverse: bool,
}

impl LinkageInfo {
    /// Parse a MARC subfield 6 value into linkage information.
    ///
    /// Returns `None` if the value does not match `TAG-OCC[/script][/r]`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let caps = LINKAGE.captures(value)?;

        Some(LinkageInfo {
            tag: caps.get(1)?.as_str().to_string(),
            occurrence: caps.get(2)?.as_str().to_string(),
            script_id: caps
                .get(3)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            is_reverse: caps.get(4).is_some(),
        })
    }

    /// Occurrence number as an integer
    #[must_use]
    pub fn occurrence_number(&self) -> u32 {
        self.occurrence.parse().unwrap_or(SENTINEL_OCCURRENCE)
    }

    /// Whether this is the reserved "no linked field" occurrence
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.occurrence_number() == SENTINEL_OCCURRENCE
    }

    /// Copy with a new occurrence number, keeping at least the original width.
    #[must_use]
    pub fn with_occurrence(&self, occurrence: u32) -> Self {
        let width = self.occurrence.len().max(2);
        LinkageInfo {
            occurrence: format!("{occurrence:0width$}"),
            ..self.clone()
        }
    }

    /// Copy pointing at a different tag
    #[must_use]
    pub fn with_tag(&self, tag: &str) -> Self {
        LinkageInfo {
            tag: tag.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for LinkageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tag, self.occurrence)?;
        if !self.script_id.is_empty() {
            write!(f, "/{}", self.script_id)?;
        }
        if self.is_reverse {
            write!(f, "/r")?;
        }
        Ok(())
    }
}

/// Information extracted from MARC subfield 8 (Field link and sequence number).
///
/// # Examples
///
/// ```
/// use mrrc_merge::linkage::GroupLink;
///
/// let link = GroupLink::parse(r"3.1\c").unwrap();
/// assert_eq!(link.number, 3);
/// assert_eq!(link.with_number(7).to_string(), r"7.1\c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLink {
    /// Link number grouping the fields
    pub number: u32,
    /// Sequence part including leading dots (e.g., ".1"), possibly empty
    pub sequence: String,
    /// Field link type code (e.g., 'c' constituent item, 'x' general sequencing)
    pub link_type: char,
}

impl GroupLink {
    /// Parse a subfield 8 value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let caps = GROUP_LINK.captures(value)?;
        Some(GroupLink {
            number: caps.get(1)?.as_str().parse().ok()?,
            sequence: caps.get(2)?.as_str().to_string(),
            link_type: caps.get(3)?.as_str().chars().next()?,
        })
    }

    /// Copy with a different link number
    #[must_use]
    pub fn with_number(&self, number: u32) -> Self {
        GroupLink {
            number,
            ..self.clone()
        }
    }
}

impl fmt::Display for GroupLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\\{}", self.number, self.sequence, self.link_type)
    }
}

/// Parsed linkage of the field's first subfield 6, if valid.
#[must_use]
pub fn link_info(field: &Field) -> Option<LinkageInfo> {
    field.get_subfield('6').and_then(LinkageInfo::parse)
}

/// The tag whose rules apply to a field.
///
/// An 880 field follows the rules of the field it represents; every other
/// field follows its own tag.
#[must_use]
pub fn effective_tag(field: &Field) -> String {
    if field.tag == ALTERNATE_SCRIPT_TAG {
        if let Some(info) = link_info(field) {
            return info.tag;
        }
    }
    field.tag.clone()
}

/// Whether two fields form a valid alternate-script pair.
///
/// Both must link to each other's tag with the same non-sentinel occurrence
/// number, and exactly one of them must be an 880.
#[must_use]
pub fn is_pair(a: &Field, b: &Field) -> bool {
    let (Some(la), Some(lb)) = (link_info(a), link_info(b)) else {
        return false;
    };
    la.tag == b.tag
        && lb.tag == a.tag
        && !la.is_sentinel()
        && la.occurrence_number() == lb.occurrence_number()
        && ((a.tag == ALTERNATE_SCRIPT_TAG) != (b.tag == ALTERNATE_SCRIPT_TAG))
}

/// Ids of every field forming a valid pair with `id`.
#[must_use]
pub fn partners(record: &Record, id: FieldId) -> Vec<FieldId> {
    let Some(field) = record.get(id) else {
        return Vec::new();
    };
    if link_info(field).is_none() {
        return Vec::new();
    }
    record
        .entries()
        .filter(|(other_id, other)| *other_id != id && is_pair(field, other))
        .map(|(other_id, _)| other_id)
        .collect()
}

/// Highest subfield 6 occurrence number in the record (0 if none).
#[must_use]
pub fn max_link_occurrence(record: &Record) -> u32 {
    record
        .fields()
        .flat_map(|f| f.subfields_by_code('6'))
        .filter_map(LinkageInfo::parse)
        .map(|info| info.occurrence_number())
        .max()
        .unwrap_or(0)
}

/// Highest subfield 8 link number in the record (0 if none).
#[must_use]
pub fn max_group_number(record: &Record) -> u32 {
    record
        .fields()
        .flat_map(|f| f.subfields_by_code('8'))
        .filter_map(GroupLink::parse)
        .map(|link| link.number)
        .max()
        .unwrap_or(0)
}

/// Shift every occurrence number in `record` so that it cannot collide with
/// numbering already used in `base`.
///
/// Subfield 6 occurrences are shifted by the highest occurrence in `base`,
/// subfield 8 link numbers by the highest link number in `base`. Sentinel
/// occurrences are left untouched, as are values whose shifted number would
/// no longer be representable (above 999 for subfield 6, beyond `u32` for
/// subfield 8). Returns the `(link, group)` offsets applied.
pub fn offset_source_links(base: &Record, source: &mut Record) -> (u32, u32) {
    let link_offset = max_link_occurrence(base);
    let group_offset = max_group_number(base);
    if link_offset == 0 && group_offset == 0 {
        return (0, 0);
    }

    for field in source.fields_mut() {
        for sf in &mut field.subfields {
            match sf.code {
                '6' if link_offset > 0 => {
                    let Some(info) = LinkageInfo::parse(&sf.value) else {
                        continue;
                    };
                    if info.is_sentinel() {
                        continue;
                    }
                    match info
                        .occurrence_number()
                        .checked_add(link_offset)
                        .filter(|n| *n <= MAX_OCCURRENCE)
                    {
                        Some(occurrence) => sf.value = info.with_occurrence(occurrence).to_string(),
                        None => warn!(
                            "Cannot offset subfield 6 '{}' by {link_offset}, leaving it unchanged",
                            sf.value
                        ),
                    }
                },
                '8' if group_offset > 0 => {
                    let Some(link) = GroupLink::parse(&sf.value) else {
                        continue;
                    };
                    match link.number.checked_add(group_offset) {
                        Some(number) => sf.value = link.with_number(number).to_string(),
                        None => warn!(
                            "Cannot offset subfield 8 '{}' by {group_offset}, leaving it unchanged",
                            sf.value
                        ),
                    }
                },
                _ => {},
            }
        }
    }

    debug!("Offset source linkage by {link_offset} (subfield 6) and {group_offset} (subfield 8)");
    (link_offset, group_offset)
}

/// Point subfield 6 references from `from_tag` to `to_tag` for one occurrence.
///
/// Returns the number of subfields rewritten.
pub fn retarget_links(record: &mut Record, from_tag: &str, to_tag: &str, occurrence: u32) -> usize {
    let mut rewritten = 0;
    for field in record.fields_mut() {
        for sf in field.subfields.iter_mut().filter(|sf| sf.code == '6') {
            if let Some(info) = LinkageInfo::parse(&sf.value) {
                if info.tag == from_tag && info.occurrence_number() == occurrence {
                    sf.value = info.with_tag(to_tag).to_string();
                    rewritten += 1;
                }
            }
        }
    }
    rewritten
}

/// Change a field's tag and keep its alternate-script partner pointing at it.
///
/// Returns `false` if the field is not in the record.
pub fn retag_field(record: &mut Record, id: FieldId, new_tag: &str) -> bool {
    let Some(field) = record.get_mut(id) else {
        return false;
    };
    let old_tag = std::mem::replace(&mut field.tag, new_tag.to_string());
    if old_tag == new_tag || old_tag == ALTERNATE_SCRIPT_TAG {
        return true;
    }
    if let Some(info) = link_info(field) {
        if info.tag == ALTERNATE_SCRIPT_TAG && !info.is_sentinel() {
            let occurrence = info.occurrence_number();
            let rewritten = retarget_links(record, &old_tag, new_tag, occurrence);
            debug!("Retagged {old_tag} to {new_tag}, {rewritten} linked 880 field(s) updated");
        }
    }
    true
}

/// Strip subfield 6 links whose partner cannot be found.
///
/// A field left without any subfield after stripping is removed. Returns the
/// number of links removed.
pub fn remove_pairless_links(record: &mut Record) -> usize {
    let mut removed = 0;
    for id in record.ids() {
        let Some(info) = record.get(id).and_then(link_info) else {
            continue;
        };
        if info.is_sentinel() || !partners(record, id).is_empty() {
            continue;
        }

        let Some(field) = record.get_mut(id) else {
            continue;
        };
        field.remove_subfields_where(|sf| {
            sf.code == '6' && LinkageInfo::parse(&sf.value).is_some_and(|i| !i.is_sentinel())
        });
        removed += 1;
        if field.subfields.is_empty() {
            debug!("Dropping {} left empty by pairless link removal", field.tag);
            record.remove(id);
        }
    }
    removed
}

/// Remove later copies of fields (or linked field groups) already present.
///
/// A group is a field together with its alternate-script partner. Groups are
/// compared by fingerprint with occurrence numbers abstracted, so a group that
/// differs only in its linkage numbering counts as a duplicate. Returns the
/// number of fields removed.
pub fn collapse_duplicate_groups(record: &mut Record) -> usize {
    let mut seen = HashSet::new();
    let mut visited = HashSet::new();
    let mut removed = 0;

    for id in record.ids() {
        if visited.contains(&id) {
            continue;
        }
        let Some(field) = record.get(id) else {
            continue;
        };
        if field.is_control_field() {
            continue;
        }

        let mut group = vec![id];
        group.extend(partners(record, id).into_iter().take(1));
        let mut prints: Vec<String> = group
            .iter()
            .filter_map(|member| record.get(*member).map(field_fingerprint))
            .collect();
        prints.sort();
        let key = prints.join("\u{1f}");

        visited.extend(group.iter().copied());
        if !seen.insert(key) {
            for member in group {
                if let Some(field) = record.remove(member) {
                    debug!("Removed duplicate field {field}");
                    removed += 1;
                }
            }
        }
    }
    removed
}

fn continuation_marker(field: &Field) -> Option<&'static str> {
    let (_, marker) = CONTINUATION_MARKERS.iter().find(|(tag, _)| *tag == field.tag)?;
    let last = field.subfields.last()?;
    last.value.trim_end().ends_with(marker).then_some(*marker)
}

/// Join adjacent same-tag fields whose value continues into the next field.
///
/// The next field's first value is appended to the last value of the
/// continued field (space separated) when their codes agree; its remaining
/// subfields are inherited. The consumed field is removed. Returns the number
/// of joins performed.
pub fn join_continuations(record: &mut Record) -> usize {
    let mut joined = 0;
    let mut worklist: VecDeque<FieldId> = record.ids().into();

    while let Some(id) = worklist.pop_front() {
        let Some(field) = record.get(id) else {
            continue;
        };
        if continuation_marker(field).is_none() {
            continue;
        }
        let Some(next_id) = record.following(id) else {
            continue;
        };
        let tag = field.tag.clone();
        let Some(next) = record.get(next_id).filter(|next| next.tag == tag) else {
            continue;
        };
        let mut inherited: VecDeque<Subfield> = next.subfields.iter().cloned().collect();

        let Some(field) = record.get_mut(id) else {
            continue;
        };
        if let (Some(last), Some(first)) = (field.subfields.last_mut(), inherited.front()) {
            if last.code == first.code {
                let trimmed = last.value.trim_end().to_string();
                last.value = format!("{trimmed} {}", first.value.trim_start());
                inherited.pop_front();
            }
        }
        field.subfields.extend(inherited);
        record.remove(next_id);
        joined += 1;
        debug!("Joined continued {tag} field");

        // The joined value may itself continue
        worklist.push_front(id);
    }
    joined
}
