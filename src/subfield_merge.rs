//! Per-subfield merge decisions.
//!
//! [`decide`] is a pure function from a target field and an incoming subfield
//! to a [`SubfieldDecision`]; [`merge_or_add_subfield`] applies it. The rules
//! are checked in a fixed order:
//!
//! 1. skip meaningless placeholder values;
//! 2. skip identifiers already present under another prefix spelling;
//! 3. skip exact and trailing-punctuation duplicates;
//! 4. skip normalized duplicates (unless the subfield keeps formatting variants apart);
//! 5. replace an existing value with a better form of the same information;
//! 6. append, unless the code is non-repeatable or the tag forbids duplicates.

use crate::linkage::effective_tag;
use crate::normalize::{
    identifier_digits, is_hyphenated, normalize_for_comparison, normalize_identifier,
    strip_trailing_punctuation,
};
use crate::record::{Field, Subfield};
use crate::schema::{
    forbids_duplicate_subfields, is_hyphenated_identifier, is_identifier_subfield,
    is_normalization_exempt, is_placeholder, is_repeatable_subfield, synonym_rank,
};
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

/// Longest plausible life span accepted by date range completion.
const MAX_LIFE_SPAN: u32 = 125;

/// Control subfields kept at the end of a field.
const TRAILING_CONTROL_CODES: &[char] = &['0', '1', '2', '4', '5', '9'];

/// Personal name tags whose `$d` holds life dates.
const LIFE_DATE_TAGS: &[&str] = &["100", "600", "700", "800"];

lazy_static! {
    static ref FULL_SPAN: Regex = Regex::new(r"^(\d{4})-(\d{4})$").unwrap();
    static ref BIRTH_ONLY: Regex = Regex::new(r"^(?:s\.\s*|b\.\s*|born\s+)?(\d{4})-?$").unwrap();
    static ref DEATH_ONLY: Regex = Regex::new(r"^(?:-|k\.\s*|d\.\s*|died\s+)(\d{4})$").unwrap();
}

/// Why an incoming subfield was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The value carries no information
    Placeholder,
    /// An identifier equal after prefix canonicalization exists
    IdentifierDuplicate,
    /// The value exists verbatim or up to trailing punctuation
    Duplicate,
    /// The value exists up to case, diacritics and punctuation
    NormalizedDuplicate,
    /// A preferred synonym of the value exists
    Synonym,
    /// The code exists and may not repeat
    NonRepeatable,
    /// The tag never receives a second copy of an existing code
    NoDuplicateCodes,
}

/// Why an existing subfield was overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    /// A birth or death year is completed to a full life span
    DateRange,
    /// A standard number gains its hyphenated form
    Hyphenation,
    /// An `http` URL is replaced by its `https` equivalent
    SecureUrl,
    /// A synonym is replaced by the preferred term
    PreferredSynonym,
    /// A placeholder is replaced by real content
    Placeholder,
}

/// Outcome of considering one incoming subfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubfieldDecision {
    /// Leave the target unchanged
    Skip(SkipReason),
    /// Overwrite the value of the subfield at `index`
    Replace {
        /// Position in the target's subfield list
        index: usize,
        /// Rule that fired
        reason: ReplaceReason,
    },
    /// Insert the subfield
    Append,
}

impl SubfieldDecision {
    /// Whether applying the decision changes the target
    #[must_use]
    pub fn changes_field(&self) -> bool {
        !matches!(self, SubfieldDecision::Skip(_))
    }
}

/// Decide what to do with `candidate` against `target`.
///
/// Rules for an 880 target are those of the field it represents.
///
/// # Examples
///
/// ```
/// use mrrc_merge::{Field, Subfield};
/// use mrrc_merge::subfield_merge::{decide, SkipReason, SubfieldDecision};
///
/// let target = Field::builder("650", ' ', '7').subfield('a', "Kissat.").build();
/// assert_eq!(
///     decide(&target, &Subfield::new('a', "kissat")),
///     SubfieldDecision::Skip(SkipReason::NormalizedDuplicate)
/// );
/// assert_eq!(decide(&target, &Subfield::new('2', "yso/fin")), SubfieldDecision::Append);
/// ```
#[must_use]
pub fn decide(target: &Field, candidate: &Subfield) -> SubfieldDecision {
    let tag = effective_tag(target);
    let tag = tag.as_str();
    let code = candidate.code;
    let value = candidate.value.as_str();

    if value.trim().is_empty() || is_placeholder(tag, code, value) {
        return SubfieldDecision::Skip(SkipReason::Placeholder);
    }

    let existing: Vec<(usize, &str)> = target
        .subfields
        .iter()
        .enumerate()
        .filter(|(_, sf)| sf.code == code)
        .map(|(i, sf)| (i, sf.value.as_str()))
        .collect();

    if is_identifier_duplicate(tag, code, value, &existing) {
        return SubfieldDecision::Skip(SkipReason::IdentifierDuplicate);
    }

    let stripped = strip_trailing_punctuation(value);
    if existing
        .iter()
        .any(|(_, v)| *v == value || strip_trailing_punctuation(v) == stripped)
    {
        return SubfieldDecision::Skip(SkipReason::Duplicate);
    }

    if !is_normalization_exempt(tag, code) {
        let normalized = normalize_for_comparison(value);
        if !normalized.is_empty()
            && existing
                .iter()
                .any(|(_, v)| normalize_for_comparison(v) == normalized)
        {
            return SubfieldDecision::Skip(SkipReason::NormalizedDuplicate);
        }
    }

    if let Some(decision) = replacement(tag, code, value, &existing) {
        return decision;
    }

    if existing.is_empty() {
        SubfieldDecision::Append
    } else if !is_repeatable_subfield(tag, code) {
        SubfieldDecision::Skip(SkipReason::NonRepeatable)
    } else if forbids_duplicate_subfields(tag) {
        SubfieldDecision::Skip(SkipReason::NoDuplicateCodes)
    } else {
        SubfieldDecision::Append
    }
}

fn is_identifier_duplicate(tag: &str, code: char, value: &str, existing: &[(usize, &str)]) -> bool {
    if is_identifier_subfield(tag, code) {
        let wanted = normalize_identifier(value);
        if existing.iter().any(|(_, v)| normalize_identifier(v) == wanted) {
            return true;
        }
    }
    if is_hyphenated_identifier(tag, code) {
        let digits = identifier_digits(value);
        // A hyphenated candidate may still replace an unhyphenated value
        let upgrade = |v: &str| is_hyphenated(value) && !is_hyphenated(v);
        return !digits.is_empty()
            && existing
                .iter()
                .any(|(_, v)| identifier_digits(v) == digits && !upgrade(v));
    }
    false
}

fn replacement(tag: &str, code: char, value: &str, existing: &[(usize, &str)]) -> Option<SubfieldDecision> {
    if code == 'd' && LIFE_DATE_TAGS.contains(&tag) {
        if let Some(found) = existing
            .iter()
            .find(|(_, v)| completes_date_range(v, value))
            .and_then(replace_at(ReplaceReason::DateRange))
        {
            return Some(found);
        }
    }

    if is_hyphenated_identifier(tag, code) && is_hyphenated(value) {
        let digits = identifier_digits(value);
        if let Some(found) = existing
            .iter()
            .find(|(_, v)| !is_hyphenated(v) && identifier_digits(v) == digits)
            .and_then(replace_at(ReplaceReason::Hyphenation))
        {
            return Some(found);
        }
    }

    if let Some(secure) = value.strip_prefix("https://") {
        if let Some(found) = existing
            .iter()
            .find(|(_, v)| {
                v.strip_prefix("http://")
                    .is_some_and(|rest| rest.eq_ignore_ascii_case(secure))
            })
            .and_then(replace_at(ReplaceReason::SecureUrl))
        {
            return Some(found);
        }
    }

    if let Some((group, rank)) = synonym_rank(tag, code, value) {
        for (index, v) in existing {
            if let Some((other_group, other_rank)) = synonym_rank(tag, code, v) {
                if other_group == group {
                    return Some(if rank < other_rank {
                        SubfieldDecision::Replace {
                            index: *index,
                            reason: ReplaceReason::PreferredSynonym,
                        }
                    } else {
                        SubfieldDecision::Skip(SkipReason::Synonym)
                    });
                }
            }
        }
    }

    existing
        .iter()
        .find(|(_, v)| is_placeholder(tag, code, v))
        .and_then(replace_at(ReplaceReason::Placeholder))
}

fn replace_at(reason: ReplaceReason) -> impl Fn(&(usize, &str)) -> Option<SubfieldDecision> {
    move |(index, _)| {
        Some(SubfieldDecision::Replace {
            index: *index,
            reason,
        })
    }
}

/// Whether `candidate` is a full life span completing `existing`.
fn completes_date_range(existing: &str, candidate: &str) -> bool {
    let Some(span) = FULL_SPAN.captures(strip_trailing_punctuation(candidate)) else {
        return false;
    };
    let (Ok(birth), Ok(death)) = (span[1].parse::<u32>(), span[2].parse::<u32>()) else {
        return false;
    };
    if birth > death || death - birth > MAX_LIFE_SPAN {
        return false;
    }

    let existing = strip_trailing_punctuation(existing);
    let year = |re: &Regex| {
        re.captures(existing)
            .and_then(|caps| caps[1].parse::<u32>().ok())
    };
    year(&BIRTH_ONLY) == Some(birth) || year(&DEATH_ONLY) == Some(death)
}

/// Index at which a new subfield with `code` is inserted.
///
/// `$6` leads the field and `$8` follows it; other codes go after the last
/// subfield with the same code, and new content codes go before the trailing
/// control subfields.
#[must_use]
pub fn insert_position(field: &Field, code: char) -> usize {
    let subfields = &field.subfields;
    match code {
        '6' => 0,
        '8' => subfields.iter().take_while(|sf| sf.code == '6').count(),
        _ => {
            if let Some(last) = subfields.iter().rposition(|sf| sf.code == code) {
                return last + 1;
            }
            if TRAILING_CONTROL_CODES.contains(&code) {
                return subfields.len();
            }
            let trailing = subfields
                .iter()
                .rev()
                .take_while(|sf| TRAILING_CONTROL_CODES.contains(&sf.code))
                .count();
            subfields.len() - trailing
        },
    }
}

/// Apply a decision for `candidate` to `target`.
pub fn apply_decision(target: &mut Field, candidate: &Subfield, decision: SubfieldDecision) {
    match decision {
        SubfieldDecision::Skip(_) => {},
        SubfieldDecision::Replace { index, .. } => {
            if let Some(sf) = target.subfields.get_mut(index) {
                sf.value.clone_from(&candidate.value);
            }
        },
        SubfieldDecision::Append => {
            let position = insert_position(target, candidate.code);
            target.subfields.insert(position, candidate.clone());
        },
    }
}

/// Merge one subfield into `target`, returning the decision taken.
pub fn merge_or_add_subfield(target: &mut Field, candidate: &Subfield) -> SubfieldDecision {
    let decision = decide(target, candidate);
    trace!("{} ${} '{}': {decision:?}", target.tag, candidate.code, candidate.value);
    apply_decision(target, candidate, decision);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf(code: char, value: &str) -> Subfield {
        Subfield::new(code, value)
    }

    fn name(d: &str) -> Field {
        Field::builder("100", '1', ' ')
            .subfield('a', "Virtanen, Matti,")
            .subfield('d', d)
            .subfield('0', "(FIN11)000123456")
            .build()
    }

    #[test]
    fn test_skip_placeholder_candidate() {
        let target = Field::builder("264", ' ', '1').subfield('b', "Otava,").build();
        assert_eq!(
            decide(&target, &sf('a', "[Kustannuspaikka tuntematon] :")),
            SubfieldDecision::Skip(SkipReason::Placeholder)
        );
        assert_eq!(
            decide(&target, &sf('c', "  ")),
            SubfieldDecision::Skip(SkipReason::Placeholder)
        );
    }

    #[test]
    fn test_skip_identifier_duplicate() {
        let target = name("1950-");
        assert_eq!(
            decide(&target, &sf('0', "http://urn.fi/URN:NBN:fi:au:finaf:000123456")),
            SubfieldDecision::Skip(SkipReason::IdentifierDuplicate)
        );
        assert_eq!(decide(&target, &sf('0', "(FIN11)000999999")), SubfieldDecision::Append);
    }

    #[test]
    fn test_skip_exact_and_punctuation_duplicates() {
        let target = Field::builder("245", '1', '0')
            .subfield('a', "Kissojen kirja /")
            .subfield('c', "Matti Virtanen.")
            .build();
        assert_eq!(
            decide(&target, &sf('a', "Kissojen kirja /")),
            SubfieldDecision::Skip(SkipReason::Duplicate)
        );
        assert_eq!(
            decide(&target, &sf('c', "Matti Virtanen")),
            SubfieldDecision::Skip(SkipReason::Duplicate)
        );
    }

    #[test]
    fn test_skip_normalized_duplicate() {
        let target = Field::builder("650", ' ', '7').subfield('a', "Äänitteet").build();
        assert_eq!(
            decide(&target, &sf('a', "aanitteet.")),
            SubfieldDecision::Skip(SkipReason::NormalizedDuplicate)
        );
    }

    #[test]
    fn test_normalization_exempt_keeps_url_variants() {
        let target = Field::builder("856", '4', '0')
            .subfield('u', "http://example.org/Book")
            .build();
        assert_eq!(decide(&target, &sf('u', "http://example.org/book")), SubfieldDecision::Append);
    }

    #[test]
    fn test_date_range_completion() {
        let mut target = name("1984-");
        let decision = merge_or_add_subfield(&mut target, &sf('d', "1984-2020"));
        assert_eq!(
            decision,
            SubfieldDecision::Replace {
                index: 1,
                reason: ReplaceReason::DateRange
            }
        );
        assert_eq!(target.get_subfield('d'), Some("1984-2020"));

        let target = name("-1910.");
        assert!(matches!(
            decide(&target, &sf('d', "1828-1910.")),
            SubfieldDecision::Replace {
                reason: ReplaceReason::DateRange,
                ..
            }
        ));
    }

    #[test]
    fn test_date_range_sanity_bounds() {
        let target = name("1850-");
        assert_eq!(
            decide(&target, &sf('d', "1850-1990")),
            SubfieldDecision::Skip(SkipReason::NonRepeatable)
        );
        let target = name("1950-");
        assert_eq!(
            decide(&target, &sf('d', "1950-1940")),
            SubfieldDecision::Skip(SkipReason::NonRepeatable)
        );
        let target = name("1951-");
        assert_eq!(
            decide(&target, &sf('d', "1950-2001")),
            SubfieldDecision::Skip(SkipReason::NonRepeatable)
        );
    }

    #[test]
    fn test_hyphenated_isbn_wins() {
        let mut target = Field::builder("020", ' ', ' ').subfield('a', "9519123456").build();
        let decision = merge_or_add_subfield(&mut target, &sf('a', "951-9123-45-6"));
        assert!(matches!(
            decision,
            SubfieldDecision::Replace {
                reason: ReplaceReason::Hyphenation,
                ..
            }
        ));
        assert_eq!(target.get_subfield_values('a'), vec!["951-9123-45-6"]);

        assert_eq!(
            decide(&target, &sf('a', "9519123456")),
            SubfieldDecision::Skip(SkipReason::IdentifierDuplicate)
        );
    }

    #[test]
    fn test_unhyphenated_cancelled_isbn_not_appended() {
        let target = Field::builder("020", ' ', ' ')
            .subfield('a', "951-9123-45-6")
            .subfield('z', "951-1-00000-1")
            .build();
        assert_eq!(
            decide(&target, &sf('z', "9511000001")),
            SubfieldDecision::Skip(SkipReason::IdentifierDuplicate)
        );
        assert_eq!(decide(&target, &sf('z', "9511000002")), SubfieldDecision::Append);
    }

    #[test]
    fn test_secure_url_replaces_insecure() {
        let target = Field::builder("856", '4', '0')
            .subfield('u', "http://urn.fi/URN:NBN:fi-fe123")
            .build();
        assert_eq!(
            decide(&target, &sf('u', "https://urn.fi/URN:NBN:fi-fe123")),
            SubfieldDecision::Replace {
                index: 0,
                reason: ReplaceReason::SecureUrl
            }
        );
    }

    #[test]
    fn test_synonyms() {
        let target = Field::builder("020", ' ', ' ')
            .subfield('a', "951-9123-45-6")
            .subfield('q', "hardback")
            .build();
        assert_eq!(
            decide(&target, &sf('q', "sidottu")),
            SubfieldDecision::Replace {
                index: 1,
                reason: ReplaceReason::PreferredSynonym
            }
        );

        let target = Field::builder("020", ' ', ' ').subfield('q', "sidottu").build();
        assert_eq!(
            decide(&target, &sf('q', "inbunden")),
            SubfieldDecision::Skip(SkipReason::Synonym)
        );
        assert_eq!(decide(&target, &sf('q', "nidottu")), SubfieldDecision::Append);
    }

    #[test]
    fn test_existing_placeholder_replaced() {
        let target = Field::builder("264", ' ', '1')
            .subfield('a', "[S.l.] :")
            .subfield('b', "Otava,")
            .build();
        assert_eq!(
            decide(&target, &sf('a', "Helsinki :")),
            SubfieldDecision::Replace {
                index: 0,
                reason: ReplaceReason::Placeholder
            }
        );
    }

    #[test]
    fn test_append_rules() {
        let target = Field::builder("264", ' ', '1')
            .subfield('a', "Helsinki :")
            .subfield('b', "Otava,")
            .build();
        assert_eq!(decide(&target, &sf('c', "2020.")), SubfieldDecision::Append);
        assert_eq!(
            decide(&target, &sf('a', "Tampere :")),
            SubfieldDecision::Skip(SkipReason::NoDuplicateCodes)
        );

        let target = Field::builder("650", ' ', '7')
            .subfield('a', "kissat")
            .subfield('x', "historia")
            .build();
        assert_eq!(decide(&target, &sf('x', "hoito")), SubfieldDecision::Append);
        assert_eq!(
            decide(&target, &sf('a', "koirat")),
            SubfieldDecision::Skip(SkipReason::NonRepeatable)
        );
    }

    #[test]
    fn test_alternate_script_uses_linked_tag_rules() {
        let target = Field::builder("880", '1', ' ')
            .subfield('6', "100-01/(N")
            .subfield('a', "Толстой, Лев,")
            .build();
        assert_eq!(
            decide(&target, &sf('a', "Толстой, Л.")),
            SubfieldDecision::Skip(SkipReason::NonRepeatable)
        );
    }

    #[test]
    fn test_insert_positions() {
        let mut target = Field::builder("650", ' ', '7')
            .subfield('a', "kissat")
            .subfield('2', "yso/fin")
            .subfield('0', "http://www.yso.fi/onto/yso/p1")
            .build();

        merge_or_add_subfield(&mut target, &sf('x', "historia"));
        merge_or_add_subfield(&mut target, &sf('6', "880-01"));
        merge_or_add_subfield(&mut target, &sf('8', r"1\c"));
        merge_or_add_subfield(&mut target, &sf('9', "FENNI<KEEP>"));

        let codes: String = target.subfields.iter().map(|sf| sf.code).collect();
        assert_eq!(codes, "68ax209");
    }

    #[test]
    fn test_merge_applies_nothing_on_skip() {
        let mut target = name("1984-");
        let before = target.clone();
        let decision = merge_or_add_subfield(&mut target, &sf('a', "Virtanen, Matti."));
        assert!(!decision.changes_field());
        assert_eq!(target, before);
    }
}
